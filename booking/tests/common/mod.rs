#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use booking::db::{Backend, Db};
use booking::engine::{BookSessionInput, BookingEngine};
use booking::session::model::{NewSession, Session, UserId};
use booking::session::repository_sqlx::SqlxSessionRepository;

/// Isolated, uniquely named in-memory SQLite database with the schema applied.
/// The shared cache lets every pooled connection see the same data.
pub async fn setup_db() -> Db {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await
        .unwrap();

    let db = Db::from_pool(pool, Backend::Sqlite);
    db.migrate().await.unwrap();
    db
}

pub async fn insert_user(db: &Db, role: &str) -> UserId {
    let email = format!("{}@example.test", Uuid::new_v4());
    let row = sqlx::query(
        "INSERT INTO users (email, role, created_at_ms) VALUES ($1, $2, $3) RETURNING id;",
    )
    .bind(email)
    .bind(role.to_string())
    .bind(Utc::now().timestamp_millis())
    .fetch_one(&db.pool)
    .await
    .unwrap();

    row.try_get("id").unwrap()
}

pub async fn insert_coach_profile(
    db: &Db,
    user_id: UserId,
    hourly_rate: Option<f64>,
    onboarding_complete: bool,
) {
    sqlx::query(
        "INSERT INTO coach_profiles (user_id, hourly_rate, onboarding_complete) VALUES ($1, $2, $3);",
    )
    .bind(user_id)
    .bind(hourly_rate)
    .bind(onboarding_complete)
    .execute(&db.pool)
    .await
    .unwrap();
}

/// Fully onboarded coach charging `hourly_rate`.
pub async fn seed_coach(db: &Db, hourly_rate: f64) -> UserId {
    let id = insert_user(db, "coach").await;
    insert_coach_profile(db, id, Some(hourly_rate), true).await;
    id
}

pub async fn seed_user(db: &Db) -> UserId {
    insert_user(db, "user").await
}

pub fn engine(db: &Db) -> BookingEngine {
    BookingEngine::with_sql_directories(db.clone())
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// 2030-03-15 at `h:mi` UTC.
pub fn slot(h: u32, mi: u32) -> DateTime<Utc> {
    at(2030, 3, 15, h, mi)
}

pub fn book_input(actor_id: UserId, coach_id: UserId, start: DateTime<Utc>, minutes: i64) -> BookSessionInput {
    BookSessionInput {
        actor_id,
        coach_id,
        scheduled_at: start,
        duration_minutes: minutes,
        notes: None,
    }
}

/// Insert a session straight through the store, bypassing booking rules
/// (used for sessions in the past).
pub async fn insert_session(
    db: &Db,
    user_id: UserId,
    coach_id: UserId,
    start: DateTime<Utc>,
    minutes: i64,
) -> Session {
    let repo = SqlxSessionRepository::new(db.backend);
    let mut conn = db.acquire().await.unwrap();
    repo.create(
        &mut conn,
        &NewSession {
            user_id,
            coach_id,
            scheduled_at: start,
            duration_minutes: minutes,
            notes: None,
        },
    )
    .await
    .unwrap()
}

pub async fn count_rows(db: &Db, table: &str) -> i64 {
    let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table};"))
        .fetch_one(&db.pool)
        .await
        .unwrap();
    row.try_get("n").unwrap()
}
