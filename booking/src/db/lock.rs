//! Transaction-scoped lock primitives.
//!
//! PostgreSQL serialises bookings per coach with `pg_advisory_xact_lock` and
//! row reads with `FOR UPDATE`. SQLite has neither; there every lock is a
//! write to a named `booking_locks` row, which hands the transaction the
//! database writer lock until it commits or rolls back. Either way the lock
//! is released with the enclosing transaction, never explicitly.

use std::fmt;

use super::{Backend, Conn, StoreError};
use crate::time::now_ms;

/// Name of a lockable resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockKey {
    /// A coach's calendar: held across the conflict check and insert.
    Coach(i64),
    Session(i64),
    /// Payment row of the given session.
    Payment(i64),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Coach(id) => write!(f, "coach:{id}"),
            LockKey::Session(id) => write!(f, "session:{id}"),
            LockKey::Payment(id) => write!(f, "payment:{id}"),
        }
    }
}

/// Serialise every booking attempt for `coach_id` until the transaction ends.
pub async fn lock_coach_calendar(
    conn: &mut Conn,
    backend: Backend,
    coach_id: i64,
) -> Result<(), StoreError> {
    match backend {
        Backend::Postgres => {
            // Selecting from the function keeps the void result out of row decoding.
            sqlx::query("SELECT 1 AS locked FROM pg_advisory_xact_lock($1)")
                .bind(coach_id)
                .fetch_one(&mut *conn)
                .await?;
        }
        Backend::Sqlite => upsert_lock_row(conn, LockKey::Coach(coach_id)).await?,
    }

    tracing::debug!(coach_id, ?backend, "coach calendar locked");
    Ok(())
}

/// Row-lock suffix for `…ForUpdate` reads.
pub(crate) fn for_update_clause(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => " FOR UPDATE",
        Backend::Sqlite => "",
    }
}

/// Take whatever must precede a `…ForUpdate` read on this backend.
pub(crate) async fn prepare_row_lock(
    conn: &mut Conn,
    backend: Backend,
    key: LockKey,
) -> Result<(), StoreError> {
    match backend {
        Backend::Postgres => Ok(()),
        Backend::Sqlite => upsert_lock_row(conn, key).await,
    }
}

async fn upsert_lock_row(conn: &mut Conn, key: LockKey) -> Result<(), StoreError> {
    sqlx::query(
        r#"
INSERT INTO booking_locks (lock_key, acquired_at_ms)
VALUES ($1, $2)
ON CONFLICT (lock_key) DO UPDATE SET acquired_at_ms = excluded.acquired_at_ms;
"#,
    )
    .bind(key.to_string())
    .bind(now_ms())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
