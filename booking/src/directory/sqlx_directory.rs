use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use super::{CoachProfile, CoachProfileDirectory, UserAccount, UserDirectory};
use crate::db::StoreError;
use crate::session::model::UserId;

#[derive(Clone)]
pub struct SqlxUserDirectory {
    pool: AnyPool,
}

impl SqlxUserDirectory {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqlxUserDirectory {
    async fn get_by_id(&self, id: UserId) -> Result<UserAccount, StoreError> {
        let row = sqlx::query("SELECT id, role FROM users WHERE id = $1;")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        Ok(UserAccount {
            id: row.try_get("id")?,
            role: row.try_get("role")?,
        })
    }
}

#[derive(Clone)]
pub struct SqlxCoachProfileDirectory {
    pool: AnyPool,
}

impl SqlxCoachProfileDirectory {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoachProfileDirectory for SqlxCoachProfileDirectory {
    async fn get_by_user_id(&self, user_id: UserId) -> Result<CoachProfile, StoreError> {
        // BOOLEAN decodes differently per backend; project it to an integer.
        let row = sqlx::query(
            r#"
SELECT
  user_id,
  hourly_rate,
  CAST(CASE WHEN onboarding_complete THEN 1 ELSE 0 END AS BIGINT) AS onboarding_i64
FROM coach_profiles
WHERE user_id = $1;
"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("coach profile"))?;

        let onboarding: i64 = row.try_get("onboarding_i64")?;

        Ok(CoachProfile {
            user_id: row.try_get("user_id")?,
            onboarding_complete: onboarding != 0,
            hourly_rate: row.try_get("hourly_rate")?,
        })
    }
}
