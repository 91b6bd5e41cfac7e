use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BookingError;
use crate::time::add_minutes;

pub type SessionId = i64;
pub type UserId = i64;

/// Which side of a session the caller acts for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Coach,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Coach => "coach",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BookingError;

    /// Any role other than `user` / `coach` has no business with sessions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "coach" => Ok(Role::Coach),
            _ => Err(BookingError::Forbidden),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = BookingError;

    /// Canonical names only; see `transition::normalize_requested_status`
    /// for the lenient tokens accepted from callers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "confirmed" => Ok(SessionStatus::Confirmed),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(BookingError::InvalidStatus(other.to_string())),
        }
    }
}

/// A booked consultation between a user and a coach.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub coach_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Longest bookable session, one day.
pub const MAX_SESSION_MINUTES: i64 = 24 * 60;

impl Session {
    pub fn ends_at(&self) -> DateTime<Utc> {
        add_minutes(self.scheduled_at, self.duration_minutes)
    }

    /// True if `actor` is this session's participant on the `role` side.
    pub fn is_participant(&self, role: Role, actor: UserId) -> bool {
        match role {
            Role::User => self.user_id == actor,
            Role::Coach => self.coach_id == actor,
        }
    }
}

/// Half-open windows `[start, start + duration)` intersect.
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_minutes: i64,
    b_start: DateTime<Utc>,
    b_minutes: i64,
) -> bool {
    let a_end = add_minutes(a_start, a_minutes);
    let b_end = add_minutes(b_start, b_minutes);
    a_start < b_end && b_start < a_end
}

/// Insert payload; status always starts at `pending`.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub user_id: UserId,
    pub coach_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeframe {
    /// End time still in the future.
    Upcoming,
    Past,
}

impl FromStr for Timeframe {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Timeframe::Upcoming),
            "past" => Ok(Timeframe::Past),
            _ => Err(BookingError::invalid_input("timeframe must be upcoming or past")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionListFilter {
    pub status: Option<SessionStatus>,
    pub timeframe: Option<Timeframe>,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]
        #[test]
        fn overlap_is_symmetric_and_matches_minute_sets(
            a_off in 0i64..=600,
            a_len in 1i64..=240,
            b_off in 0i64..=600,
            b_len in 1i64..=240,
        ) {
            let base = DateTime::<Utc>::from_timestamp(1_900_000_000, 0).unwrap();
            let a = base + Duration::minutes(a_off);
            let b = base + Duration::minutes(b_off);

            let ab = windows_overlap(a, a_len, b, b_len);
            prop_assert_eq!(ab, windows_overlap(b, b_len, a, a_len));

            // Brute force: do the minute slots share any element?
            let a_slots = a_off..a_off + a_len;
            let shares_minute = (b_off..b_off + b_len).any(|m| a_slots.contains(&m));
            prop_assert_eq!(ab, shares_minute);
        }
    }
}
