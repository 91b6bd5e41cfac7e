use clap::{Parser, Subcommand, ValueEnum};

use crate::session::model::Role;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RoleCli {
    User,
    Coach,
}

#[derive(Debug, Parser)]
#[clap(name = "coachbook", version, about = "Coaching session booking operator tool")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database schema.
    Migrate,

    /// Check whether a coach is free for a window.
    Availability {
        #[clap(long)]
        coach_id: i64,

        /// Start time (RFC3339)
        #[clap(long)]
        at: String,

        /// Length in minutes
        #[clap(long, default_value = "60")]
        duration: i64,
    },

    /// Print an actor's sessions as JSON.
    Sessions {
        #[clap(long)]
        actor: i64,

        #[clap(long, value_enum)]
        role: RoleCli,

        #[clap(long)]
        status: Option<String>,

        /// `upcoming` or `past`
        #[clap(long)]
        timeframe: Option<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::Availability { .. } => "availability",
            Command::Sessions { .. } => "sessions",
        }
    }
}

pub fn cli_to_role(r: RoleCli) -> Role {
    match r {
        RoleCli::User => Role::User,
        RoleCli::Coach => Role::Coach,
    }
}
