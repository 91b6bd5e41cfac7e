//! Read-only lookups into the account and profile tables.
//!
//! Both tables belong to other subsystems; the booking engine only needs a
//! user's role and a coach's onboarding state and rate.

pub mod sqlx_directory;

use async_trait::async_trait;

use crate::db::StoreError;
use crate::session::model::UserId;

pub use sqlx_directory::{SqlxCoachProfileDirectory, SqlxUserDirectory};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    /// Raw role string; accounts may carry roles other than user/coach.
    pub role: String,
}

impl UserAccount {
    pub fn is_coach(&self) -> bool {
        self.role == "coach"
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoachProfile {
    pub user_id: UserId,
    pub onboarding_complete: bool,
    pub hourly_rate: Option<f64>,
}

impl CoachProfile {
    /// Rate usable for pricing: present and strictly positive.
    pub fn billable_rate(&self) -> Option<f64> {
        self.hourly_rate.filter(|r| r.is_finite() && *r > 0.0)
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `StoreError::NotFound("user")` when no such account exists.
    async fn get_by_id(&self, id: UserId) -> Result<UserAccount, StoreError>;
}

#[async_trait]
pub trait CoachProfileDirectory: Send + Sync {
    /// `StoreError::NotFound("coach profile")` when the user has no profile.
    async fn get_by_user_id(&self, user_id: UserId) -> Result<CoachProfile, StoreError>;
}
