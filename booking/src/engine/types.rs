use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::payment::model::Payment;
use crate::session::model::{Session, UserId};

/// Validated booking request, as handed to `BookingEngine::book_session`.
#[derive(Clone, Debug)]
pub struct BookSessionInput {
    pub actor_id: UserId,
    pub coach_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

/// A session together with its payment, if one exists.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

impl SessionDetail {
    pub fn new(session: Session, payment: Option<Payment>) -> Self {
        Self { session, payment }
    }
}
