use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::model::{SessionId, UserId};

pub type PaymentId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Charge recorded but not captured.
    Placeholder,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Placeholder => "placeholder",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placeholder" => Ok(PaymentStatus::Placeholder),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("invalid payment status '{other}'")),
        }
    }
}

/// The charge attached 1:1 to a session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub coach_id: UserId,
    /// Minor units (cents).
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Amount in major currency units.
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }
}

#[derive(Clone, Debug)]
pub struct NewPayment {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub coach_id: UserId,
    pub amount_cents: i64,
    pub status: PaymentStatus,
}

/// `hourly_rate * duration_minutes / 60`, in cents, rounded half away from zero.
pub fn session_amount_cents(hourly_rate: f64, duration_minutes: i64) -> i64 {
    (hourly_rate * 100.0 * duration_minutes as f64 / 60.0).round() as i64
}
