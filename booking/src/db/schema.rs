use sqlx::AnyPool;

use super::{Backend, StoreError};

fn identity_column(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => "id BIGSERIAL PRIMARY KEY",
        Backend::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
    }
}

fn statements(backend: Backend) -> Vec<String> {
    let id = identity_column(backend);

    vec![
        // Users (owned by the auth/profile subsystems; read here for role checks)
        format!(
            r#"
CREATE TABLE IF NOT EXISTS users (
  {id},
  email TEXT NOT NULL UNIQUE,
  role TEXT NOT NULL,
  created_at_ms BIGINT NOT NULL
);
"#
        ),
        // Coach profiles
        format!(
            r#"
CREATE TABLE IF NOT EXISTS coach_profiles (
  {id},
  user_id BIGINT NOT NULL UNIQUE REFERENCES users(id),
  hourly_rate DOUBLE PRECISION,
  onboarding_complete BOOLEAN NOT NULL DEFAULT FALSE
);
"#
        ),
        // Sessions
        format!(
            r#"
CREATE TABLE IF NOT EXISTS bookings (
  {id},
  user_id BIGINT NOT NULL REFERENCES users(id),
  coach_id BIGINT NOT NULL REFERENCES users(id),
  scheduled_at_ms BIGINT NOT NULL,
  duration_min BIGINT NOT NULL CHECK (duration_min > 0),
  status TEXT NOT NULL DEFAULT 'pending'
    CHECK (status IN ('pending', 'confirmed', 'completed', 'cancelled')),
  notes TEXT,
  created_at_ms BIGINT NOT NULL,
  updated_at_ms BIGINT NOT NULL
);
"#
        ),
        // Payments
        format!(
            r#"
CREATE TABLE IF NOT EXISTS payments (
  {id},
  booking_id BIGINT NOT NULL REFERENCES bookings(id),
  user_id BIGINT NOT NULL REFERENCES users(id),
  coach_id BIGINT NOT NULL REFERENCES users(id),
  amount_cents BIGINT NOT NULL CHECK (amount_cents >= 0),
  status TEXT NOT NULL CHECK (status IN ('placeholder', 'paid')),
  created_at_ms BIGINT NOT NULL
);
"#
        ),
        // Named lock rows (SQLite stand-in for advisory / row locks)
        r#"
CREATE TABLE IF NOT EXISTS booking_locks (
  lock_key TEXT PRIMARY KEY,
  acquired_at_ms BIGINT NOT NULL
);
"#
        .to_string(),
        r#"CREATE INDEX IF NOT EXISTS idx_bookings_coach_time ON bookings(coach_id, scheduled_at_ms);"#
            .to_string(),
        r#"CREATE INDEX IF NOT EXISTS idx_bookings_user ON bookings(user_id);"#.to_string(),
        r#"CREATE INDEX IF NOT EXISTS idx_payments_booking ON payments(booking_id);"#.to_string(),
    ]
}

pub async fn migrate(pool: &AnyPool, backend: Backend) -> Result<(), StoreError> {
    for stmt in statements(backend) {
        sqlx::query(&stmt).execute(pool).await?;
    }

    tracing::debug!(?backend, "schema migrated");
    Ok(())
}
