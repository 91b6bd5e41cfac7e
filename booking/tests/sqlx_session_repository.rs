mod common;

use chrono::{Duration, Utc};

use booking::db::StoreError;
use booking::session::model::{Role, SessionListFilter, SessionStatus, Timeframe};
use booking::session::repository_sqlx::SqlxSessionRepository;
use common::{insert_session, seed_coach, seed_user, setup_db, slot};

#[tokio::test]
async fn create_then_fetch_round_trip() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;

    let created = insert_session(&db, user, coach, slot(9, 0), 90).await;
    assert_eq!(created.status, SessionStatus::Pending);
    assert_eq!(created.created_at, created.updated_at);

    let mut conn = db.acquire().await.unwrap();
    let fetched = repo.get_by_id(&mut conn, created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.scheduled_at, slot(9, 0));
    assert_eq!(fetched.duration_minutes, 90);
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let mut conn = db.acquire().await.unwrap();

    let err = repo.get_by_id(&mut conn, 404).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound("session")));

    let err = repo
        .update_status(&mut conn, 404, SessionStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound("session")));
}

#[tokio::test]
async fn locked_read_inside_transaction() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;
    let s = insert_session(&db, user, coach, slot(9, 0), 60).await;

    let mut tx = db.begin().await.unwrap();
    let locked = repo.get_by_id_for_update(&mut tx, s.id).await.unwrap();
    assert_eq!(locked.id, s.id);
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn conditional_update_detects_stale_expectation() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;
    let s = insert_session(&db, user, coach, slot(9, 0), 60).await;

    let mut conn = db.acquire().await.unwrap();

    let won = repo
        .update_status_if_current(&mut conn, s.id, SessionStatus::Pending, SessionStatus::Cancelled)
        .await
        .unwrap()
        .expect("first swap applies");
    assert_eq!(won.status, SessionStatus::Cancelled);

    let lost = repo
        .update_status_if_current(&mut conn, s.id, SessionStatus::Pending, SessionStatus::Confirmed)
        .await
        .unwrap();
    assert!(lost.is_none());

    let current = repo.get_by_id(&mut conn, s.id).await.unwrap();
    assert_eq!(current.status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn unconditional_update_overwrites_status() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;
    let s = insert_session(&db, user, coach, slot(9, 0), 60).await;

    let mut conn = db.acquire().await.unwrap();
    let updated = repo
        .update_status(&mut conn, s.id, SessionStatus::Completed)
        .await
        .unwrap();

    assert_eq!(updated.status, SessionStatus::Completed);
    assert!(updated.updated_at >= s.updated_at);
}

#[tokio::test]
async fn conflict_window_is_half_open() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;
    let other_coach = seed_coach(&db, 100.0).await;

    // 09:00-10:30
    let s = insert_session(&db, user, coach, slot(9, 0), 90).await;
    let mut conn = db.acquire().await.unwrap();

    assert!(repo.has_conflict(&mut conn, coach, slot(9, 30), 45, None).await.unwrap());
    assert!(repo.has_conflict(&mut conn, coach, slot(8, 0), 61, None).await.unwrap());
    // touching edges do not overlap
    assert!(!repo.has_conflict(&mut conn, coach, slot(10, 30), 30, None).await.unwrap());
    assert!(!repo.has_conflict(&mut conn, coach, slot(8, 0), 60, None).await.unwrap());
    // other coaches are independent
    assert!(!repo.has_conflict(&mut conn, other_coach, slot(9, 30), 45, None).await.unwrap());
    // a session never conflicts with itself
    assert!(!repo.has_conflict(&mut conn, coach, slot(9, 30), 45, Some(s.id)).await.unwrap());
}

#[tokio::test]
async fn cancelled_sessions_do_not_block_the_slot() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;
    let s = insert_session(&db, user, coach, slot(9, 0), 90).await;

    let mut conn = db.acquire().await.unwrap();
    repo.update_status(&mut conn, s.id, SessionStatus::Cancelled)
        .await
        .unwrap();

    assert!(!repo.has_conflict(&mut conn, coach, slot(9, 30), 45, None).await.unwrap());
}

#[tokio::test]
async fn list_scopes_by_role_and_orders_by_start() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let alice = seed_user(&db).await;
    let bob = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;

    let late = insert_session(&db, alice, coach, slot(15, 0), 60).await;
    let early = insert_session(&db, alice, coach, slot(9, 0), 60).await;
    let bobs = insert_session(&db, bob, coach, slot(12, 0), 60).await;

    let mut conn = db.acquire().await.unwrap();
    let now = Utc::now();

    let as_alice = repo
        .list(&mut conn, alice, Role::User, &SessionListFilter::default(), now)
        .await
        .unwrap();
    let ids: Vec<_> = as_alice.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let as_coach = repo
        .list(&mut conn, coach, Role::Coach, &SessionListFilter::default(), now)
        .await
        .unwrap();
    let ids: Vec<_> = as_coach.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![early.id, bobs.id, late.id]);

    // a coach id used as a user sees nothing
    let none = repo
        .list(&mut conn, coach, Role::User, &SessionListFilter::default(), now)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_filters_status_and_timeframe() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;

    let now = Utc::now();
    let past = insert_session(&db, user, coach, now - Duration::days(2), 60).await;
    let upcoming = insert_session(&db, user, coach, now + Duration::days(2), 60).await;
    // started ten minutes ago, still running: counts as upcoming
    let running = insert_session(&db, user, coach, now - Duration::minutes(10), 60).await;

    let mut conn = db.acquire().await.unwrap();
    repo.update_status(&mut conn, upcoming.id, SessionStatus::Confirmed)
        .await
        .unwrap();

    let filter = |status, timeframe| SessionListFilter { status, timeframe };

    let past_only = repo
        .list(&mut conn, user, Role::User, &filter(None, Some(Timeframe::Past)), now)
        .await
        .unwrap();
    assert_eq!(past_only.iter().map(|s| s.id).collect::<Vec<_>>(), vec![past.id]);

    let upcoming_only = repo
        .list(&mut conn, user, Role::User, &filter(None, Some(Timeframe::Upcoming)), now)
        .await
        .unwrap();
    assert_eq!(
        upcoming_only.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![running.id, upcoming.id]
    );

    let confirmed = repo
        .list(
            &mut conn,
            user,
            Role::User,
            &filter(Some(SessionStatus::Confirmed), Some(Timeframe::Upcoming)),
            now,
        )
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, upcoming.id);
}

#[tokio::test]
async fn notes_are_persisted() {
    let db = setup_db().await;
    let repo = SqlxSessionRepository::new(db.backend);
    let user = seed_user(&db).await;
    let coach = seed_coach(&db, 100.0).await;

    let mut conn = db.acquire().await.unwrap();
    let s = repo
        .create(
            &mut conn,
            &booking::session::model::NewSession {
                user_id: user,
                coach_id: coach,
                scheduled_at: slot(9, 0),
                duration_minutes: 30,
                notes: Some("bring your training log".into()),
            },
        )
        .await
        .unwrap();

    let fetched = repo.get_by_id(&mut conn, s.id).await.unwrap();
    assert_eq!(fetched.notes.as_deref(), Some("bring your training log"));
}
