//! Wire shapes the HTTP layer deserialises, and their conversion into
//! engine inputs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::BookSessionInput;
use crate::error::BookingError;
use crate::session::model::{
    MAX_SESSION_MINUTES, SessionId, SessionListFilter, SessionStatus, Timeframe, UserId,
};

#[derive(Clone, Debug, Deserialize)]
pub struct BookSessionRequest {
    pub coach_id: i64,
    pub scheduled_at: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookSessionRequest {
    pub fn into_input(self, actor_id: UserId) -> Result<BookSessionInput, BookingError> {
        if self.coach_id <= 0 {
            return Err(BookingError::invalid_input("coach_id must be positive"));
        }

        let scheduled_at = parse_rfc3339(&self.scheduled_at)?;

        if self.duration_minutes <= 0 {
            return Err(BookingError::invalid_input("duration_minutes must be positive"));
        }
        if self.duration_minutes > MAX_SESSION_MINUTES {
            return Err(BookingError::invalid_input(format!(
                "duration_minutes must not exceed {MAX_SESSION_MINUTES}"
            )));
        }

        let notes = match self.notes {
            Some(n) if n.trim().is_empty() => {
                return Err(BookingError::invalid_input("notes must not be empty"));
            }
            other => other,
        };

        Ok(BookSessionInput {
            actor_id,
            coach_id: self.coach_id,
            scheduled_at,
            duration_minutes: self.duration_minutes,
            notes,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Free-text token, normalised by the engine.
    pub status: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
}

impl ListSessionsQuery {
    pub fn into_filter(self) -> Result<SessionListFilter, BookingError> {
        let status = non_blank(self.status)
            .map(|s| s.parse::<SessionStatus>())
            .transpose()?;
        let timeframe = non_blank(self.timeframe)
            .map(|t| t.parse::<Timeframe>())
            .transpose()?;

        Ok(SessionListFilter { status, timeframe })
    }
}

/// Path parameter → session id.
pub fn parse_session_id(raw: &str) -> Result<SessionId, BookingError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(BookingError::invalid_input("invalid session id")),
    }
}

pub fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, BookingError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| BookingError::invalid_input("scheduled_at must be RFC3339"))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
