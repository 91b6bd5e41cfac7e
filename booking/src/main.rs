use anyhow::Context;
use clap::Parser;
use tracing::Instrument;

use booking::{
    cli::{Cli, Command, cli_to_role},
    config::AppConfig,
    db::Db,
    engine::BookingEngine,
    requests::{ListSessionsQuery, parse_rfc3339},
};
use common::logger::{TraceId, annotate_span, child_span, init_logger, root_span};

async fn run(cli: Cli, cfg: AppConfig) -> anyhow::Result<()> {
    let db = Db::connect(&cfg)
        .instrument(child_span("db_connect"))
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::Migrate => {
            db.migrate().await.context("migration failed")?;
            tracing::info!("schema up to date");
        }

        Command::Availability {
            coach_id,
            at,
            duration,
        } => {
            let engine = BookingEngine::from_config(db, &cfg);
            let at = parse_rfc3339(&at)?;
            let free = engine.check_availability(coach_id, at, duration).await?;

            println!(
                "{}",
                serde_json::json!({
                    "coach_id": coach_id,
                    "scheduled_at": at,
                    "duration_minutes": duration,
                    "available": free,
                })
            );
        }

        Command::Sessions {
            actor,
            role,
            status,
            timeframe,
        } => {
            annotate_span(actor, None);
            let engine = BookingEngine::from_config(db, &cfg);
            let filter = ListSessionsQuery { status, timeframe }.into_filter()?;
            let sessions = engine.list_sessions(actor, cli_to_role(role), filter).await?;

            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    init_logger("coachbook", cfg.app_env.is_production());

    let span = root_span(cli.command.name(), &TraceId::default());

    tokio::select! {
        res = run(cli, cfg).instrument(span) => res,
        _ = tokio::signal::ctrl_c() => {
            // Dropping `run` rolls back whatever transaction it had open.
            tracing::warn!("interrupted");
            Ok(())
        }
    }
}
