use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::any::AnyRow;

use crate::db::lock::{LockKey, for_update_clause, prepare_row_lock};
use crate::db::{Backend, Conn, StoreError};
use crate::session::model::{
    NewSession, Role, Session, SessionId, SessionListFilter, SessionStatus, Timeframe, UserId,
};
use crate::time::{add_minutes, from_ms, now_ms, to_ms};

const SESSION_COLUMNS: &str = "id, user_id, coach_id, scheduled_at_ms, duration_min, status, \
                               notes, created_at_ms, updated_at_ms";

/// Session end expressed in SQL over the stored columns.
const SESSION_END_MS: &str = "(scheduled_at_ms + duration_min * 60000)";

/// SQLx-backed persistence for sessions (`bookings` table).
///
/// Every operation runs on the connection it is handed, so the caller
/// decides whether it is part of a transaction.
#[derive(Clone, Copy, Debug)]
pub struct SqlxSessionRepository {
    backend: Backend,
}

impl SqlxSessionRepository {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn create(&self, conn: &mut Conn, input: &NewSession) -> Result<Session, StoreError> {
        let now = now_ms();
        let sql = format!(
            r#"
INSERT INTO bookings (user_id, coach_id, scheduled_at_ms, duration_min, status, notes, created_at_ms, updated_at_ms)
VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
RETURNING {SESSION_COLUMNS};
"#
        );

        let row = sqlx::query(&sql)
            .bind(input.user_id)
            .bind(input.coach_id)
            .bind(to_ms(input.scheduled_at))
            .bind(input.duration_minutes)
            .bind(SessionStatus::Pending.as_str())
            .bind(input.notes.clone())
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;

        row_to_session(&row)
    }

    pub async fn get_by_id(&self, conn: &mut Conn, id: SessionId) -> Result<Session, StoreError> {
        self.fetch_one_by_id(conn, id, "").await
    }

    /// Read and lock the row until the enclosing transaction ends.
    pub async fn get_by_id_for_update(
        &self,
        conn: &mut Conn,
        id: SessionId,
    ) -> Result<Session, StoreError> {
        prepare_row_lock(conn, self.backend, LockKey::Session(id)).await?;
        self.fetch_one_by_id(conn, id, for_update_clause(self.backend))
            .await
    }

    async fn fetch_one_by_id(
        &self,
        conn: &mut Conn,
        id: SessionId,
        suffix: &str,
    ) -> Result<Session, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM bookings WHERE id = $1{suffix};");

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound("session"))?;

        row_to_session(&row)
    }

    /// Sessions where `actor_id` is the booking user (`Role::User`) or the
    /// coach (`Role::Coach`), ordered by start time then id.
    pub async fn list(
        &self,
        conn: &mut Conn,
        actor_id: UserId,
        role: Role,
        filter: &SessionListFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        let actor_column = match role {
            Role::User => "user_id",
            Role::Coach => "coach_id",
        };

        let mut where_parts = vec![format!("{actor_column} = $1")];
        let mut next_param = 2;

        if filter.status.is_some() {
            where_parts.push(format!("status = ${next_param}"));
            next_param += 1;
        }
        match filter.timeframe {
            Some(Timeframe::Upcoming) => {
                where_parts.push(format!("{SESSION_END_MS} > ${next_param}"))
            }
            Some(Timeframe::Past) => where_parts.push(format!("{SESSION_END_MS} <= ${next_param}")),
            None => {}
        }

        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM bookings WHERE {} ORDER BY scheduled_at_ms ASC, id ASC;",
            where_parts.join(" AND ")
        );

        let mut query = sqlx::query(&sql).bind(actor_id);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if filter.timeframe.is_some() {
            query = query.bind(to_ms(now));
        }

        let rows = query.fetch_all(&mut *conn).await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_session(&r) {
                Ok(s) => out.push(s),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the listing
                    tracing::warn!(error = %e, actor_id, %role, "skipping malformed session row");
                }
            }
        }

        Ok(out)
    }

    /// Unconditional status write.
    pub async fn update_status(
        &self,
        conn: &mut Conn,
        id: SessionId,
        status: SessionStatus,
    ) -> Result<Session, StoreError> {
        let sql = format!(
            r#"
UPDATE bookings
SET status = $2, updated_at_ms = $3
WHERE id = $1
RETURNING {SESSION_COLUMNS};
"#
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(now_ms())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound("session"))?;

        row_to_session(&row)
    }

    /// Compare-and-swap status write.
    ///
    /// Returns `None` when the row's status is no longer `expected` (or the
    /// row is gone): the caller lost a race and must not assume success.
    pub async fn update_status_if_current(
        &self,
        conn: &mut Conn,
        id: SessionId,
        expected: SessionStatus,
        next: SessionStatus,
    ) -> Result<Option<Session>, StoreError> {
        let sql = format!(
            r#"
UPDATE bookings
SET status = $3, updated_at_ms = $4
WHERE id = $1 AND status = $2
RETURNING {SESSION_COLUMNS};
"#
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .bind(now_ms())
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    /// True if a non-cancelled session of `coach_id` overlaps
    /// `[start, start + duration_minutes)`, ignoring `excluding` if given.
    pub async fn has_conflict(
        &self,
        conn: &mut Conn,
        coach_id: UserId,
        start: DateTime<Utc>,
        duration_minutes: i64,
        excluding: Option<SessionId>,
    ) -> Result<bool, StoreError> {
        let start_ms = to_ms(start);
        let end_ms = to_ms(add_minutes(start, duration_minutes));

        let exclusion = if excluding.is_some() { " AND id <> $4" } else { "" };
        let sql = format!(
            r#"
SELECT COUNT(*) AS conflicts
FROM bookings
WHERE coach_id = $1
  AND status <> 'cancelled'
  AND scheduled_at_ms < $3
  AND {SESSION_END_MS} > $2{exclusion};
"#
        );

        let mut query = sqlx::query(&sql).bind(coach_id).bind(start_ms).bind(end_ms);
        if let Some(id) = excluding {
            query = query.bind(id);
        }

        let row = query.fetch_one(&mut *conn).await?;
        let conflicts: i64 = row.try_get("conflicts")?;

        Ok(conflicts > 0)
    }
}

/* =========================
Row mapping
========================= */

fn row_to_session(r: &AnyRow) -> Result<Session, StoreError> {
    let status_str: String = r.try_get("status")?;
    let status = status_str
        .parse::<SessionStatus>()
        .map_err(|_| StoreError::Corrupt(format!("invalid session status '{status_str}'")))?;

    Ok(Session {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        coach_id: r.try_get("coach_id")?,
        scheduled_at: from_ms("scheduled_at_ms", r.try_get("scheduled_at_ms")?)?,
        duration_minutes: r.try_get("duration_min")?,
        status,
        notes: r.try_get("notes")?,
        created_at: from_ms("created_at_ms", r.try_get("created_at_ms")?)?,
        updated_at: from_ms("updated_at_ms", r.try_get("updated_at_ms")?)?,
    })
}
