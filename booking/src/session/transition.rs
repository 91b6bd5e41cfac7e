//! Per-role session status transition table.
//!
//! | actor | from                 | to        | extra guard                |
//! |-------|----------------------|-----------|----------------------------|
//! | user  | pending, confirmed   | cancelled |                            |
//! | coach | pending              | confirmed | payment already `paid`     |
//! | coach | confirmed            | completed | session end time has passed|
//! | coach | pending, confirmed   | cancelled |                            |
//!
//! The payment guard on `confirmed` is checked by the engine, which owns
//! the payment lookup.

use chrono::{DateTime, Utc};

use super::model::{Role, Session, SessionStatus, UserId};
use crate::error::BookingError;

/// Map a free-text status token onto the canonical status set.
pub fn normalize_requested_status(token: &str) -> Result<SessionStatus, BookingError> {
    match token.trim().to_lowercase().as_str() {
        "confirm" | "confirmed" => Ok(SessionStatus::Confirmed),
        "complete" | "completed" => Ok(SessionStatus::Completed),
        "cancel" | "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
        _ => Err(BookingError::InvalidStatus(token.to_string())),
    }
}

/// Check that `actor` (acting as `role`) may move `session` to `next` at `now`.
pub fn validate_transition(
    role: Role,
    actor: UserId,
    session: &Session,
    next: SessionStatus,
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    if !session.is_participant(role, actor) {
        return Err(BookingError::Forbidden);
    }

    let from = session.status;
    let reject = || {
        Err(BookingError::invalid_transition(format!(
            "{role} cannot move session from {from} to {next}"
        )))
    };

    match (role, next) {
        (Role::User, SessionStatus::Cancelled) | (Role::Coach, SessionStatus::Cancelled) => {
            if from.is_terminal() {
                return reject();
            }
        }
        (Role::User, _) => return Err(BookingError::Forbidden),
        (Role::Coach, SessionStatus::Confirmed) => {
            if from != SessionStatus::Pending {
                return reject();
            }
        }
        (Role::Coach, SessionStatus::Completed) => {
            if from != SessionStatus::Confirmed {
                return reject();
            }
            if session.ends_at() > now {
                return Err(BookingError::invalid_transition(
                    "session cannot be completed before it ends",
                ));
            }
        }
        (Role::Coach, SessionStatus::Pending) => return reject(),
    }

    Ok(())
}
