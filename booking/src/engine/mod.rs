//! Booking and payment lifecycle orchestration.
//!
//! All coordination lives in the database: bookings for one coach are
//! serialised by a transaction-scoped calendar lock, payment capture by row
//! locks on the session and its payment, and plain status edits by
//! compare-and-swap updates. Nothing here holds in-process shared state, so
//! any number of engines may run against the same database.
//!
//! Every operation is cancel-safe. Dropping the future drops its open
//! transaction, which rolls back and releases whatever locks it held.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::logger::warn_if_slow;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::db::lock::lock_coach_calendar;
use crate::db::{Conn, Db, StoreError};
use crate::directory::{
    CoachProfileDirectory, SqlxCoachProfileDirectory, SqlxUserDirectory, UserDirectory,
};
use crate::error::BookingError;
use crate::payment::model::{NewPayment, Payment, PaymentStatus, session_amount_cents};
use crate::payment::repository_sqlx::SqlxPaymentRepository;
use crate::session::model::{
    MAX_SESSION_MINUTES, NewSession, Role, SessionId, SessionListFilter, SessionStatus, UserId,
};
use crate::session::repository_sqlx::SqlxSessionRepository;
use crate::session::transition::{normalize_requested_status, validate_transition};
use crate::time::{now_ms, to_ms};

pub use types::{BookSessionInput, SessionDetail};

pub struct BookingEngine {
    db: Db,
    sessions: SqlxSessionRepository,
    payments: SqlxPaymentRepository,
    users: Arc<dyn UserDirectory>,
    coaches: Arc<dyn CoachProfileDirectory>,
    past_grace: Duration,
    slow_warn: Duration,
}

impl BookingEngine {
    pub fn new(
        db: Db,
        users: Arc<dyn UserDirectory>,
        coaches: Arc<dyn CoachProfileDirectory>,
    ) -> Self {
        Self {
            sessions: SqlxSessionRepository::new(db.backend),
            payments: SqlxPaymentRepository::new(db.backend),
            db,
            users,
            coaches,
            past_grace: Duration::from_secs(60),
            slow_warn: Duration::from_millis(200),
        }
    }

    /// Engine backed by the `users` / `coach_profiles` tables of `db`.
    pub fn with_sql_directories(db: Db) -> Self {
        let users = Arc::new(SqlxUserDirectory::new(db.pool.clone()));
        let coaches = Arc::new(SqlxCoachProfileDirectory::new(db.pool.clone()));
        Self::new(db, users, coaches)
    }

    pub fn from_config(db: Db, cfg: &AppConfig) -> Self {
        Self::with_sql_directories(db)
            .with_past_grace(cfg.booking_past_grace)
            .with_slow_query_warn(cfg.slow_query_warn)
    }

    pub fn with_past_grace(mut self, grace: Duration) -> Self {
        self.past_grace = grace;
        self
    }

    pub fn with_slow_query_warn(mut self, threshold: Duration) -> Self {
        self.slow_warn = threshold;
        self
    }

    /* =========================
    BookSession
    ========================= */

    /// Reserve a slot with a coach and attach a placeholder payment.
    #[instrument(
        skip_all,
        target = "booking",
        fields(actor_id = input.actor_id, coach_id = input.coach_id, duration = input.duration_minutes)
    )]
    pub async fn book_session(&self, input: BookSessionInput) -> Result<SessionDetail, BookingError> {
        self.validate_booking(&input)?;

        let rate = self.billable_rate(input.coach_id).await?;
        let amount_cents = session_amount_cents(rate, input.duration_minutes);

        let mut tx = self.db.begin().await?;

        warn_if_slow(
            "lock_coach_calendar",
            self.slow_warn,
            lock_coach_calendar(&mut tx, self.db.backend, input.coach_id),
        )
        .await?;

        let conflict = self
            .sessions
            .has_conflict(&mut tx, input.coach_id, input.scheduled_at, input.duration_minutes, None)
            .await?;
        if conflict {
            warn!(scheduled_at = %input.scheduled_at, "requested slot overlaps an existing booking");
            return Err(BookingError::Conflict);
        }

        let session = self
            .sessions
            .create(
                &mut tx,
                &NewSession {
                    user_id: input.actor_id,
                    coach_id: input.coach_id,
                    scheduled_at: input.scheduled_at,
                    duration_minutes: input.duration_minutes,
                    notes: input.notes,
                },
            )
            .await?;

        let payment = self
            .payments
            .create(
                &mut tx,
                &NewPayment {
                    session_id: session.id,
                    user_id: session.user_id,
                    coach_id: session.coach_id,
                    amount_cents,
                    status: PaymentStatus::Placeholder,
                },
            )
            .await?;

        warn_if_slow("commit_booking", self.slow_warn, tx.commit())
            .await
            .map_err(StoreError::from)?;

        info!(session_id = session.id, amount_cents, "session booked");
        Ok(SessionDetail::new(session, Some(payment)))
    }

    fn validate_booking(&self, input: &BookSessionInput) -> Result<(), BookingError> {
        if input.coach_id <= 0 {
            return Err(BookingError::invalid_input("coach_id must be positive"));
        }
        if input.duration_minutes <= 0 {
            return Err(BookingError::invalid_input("duration_minutes must be positive"));
        }
        if input.duration_minutes > MAX_SESSION_MINUTES {
            return Err(BookingError::invalid_input(format!(
                "duration_minutes must not exceed {MAX_SESSION_MINUTES}"
            )));
        }
        if input.actor_id == input.coach_id {
            return Err(BookingError::invalid_input("cannot book a session with yourself"));
        }

        let grace_ms = i64::try_from(self.past_grace.as_millis()).unwrap_or(i64::MAX);
        if to_ms(input.scheduled_at) < now_ms().saturating_sub(grace_ms) {
            return Err(BookingError::invalid_input("scheduled_at must be in the future"));
        }

        Ok(())
    }

    /// Resolve the coach and return the hourly rate a booking is priced at.
    async fn billable_rate(&self, coach_id: UserId) -> Result<f64, BookingError> {
        let account = match self.users.get_by_id(coach_id).await {
            Ok(a) => a,
            Err(StoreError::NotFound(_)) => return Err(BookingError::CoachNotFound),
            Err(e) => return Err(e.into()),
        };
        if !account.is_coach() {
            return Err(BookingError::invalid_input("requested user is not a coach"));
        }

        let profile = match self.coaches.get_by_user_id(coach_id).await {
            Ok(p) => p,
            Err(StoreError::NotFound(_)) => return Err(BookingError::CoachNotFound),
            Err(e) => return Err(e.into()),
        };
        if !profile.onboarding_complete {
            return Err(BookingError::invalid_input("coach has not completed onboarding"));
        }

        profile
            .billable_rate()
            .ok_or_else(|| BookingError::invalid_input("coach hourly rate is not set"))
    }

    /* =========================
    Reads
    ========================= */

    /// Sessions of `actor_id` on the `role` side, each with its payment.
    #[instrument(skip(self), target = "booking")]
    pub async fn list_sessions(
        &self,
        actor_id: UserId,
        role: Role,
        filter: SessionListFilter,
    ) -> Result<Vec<SessionDetail>, BookingError> {
        let mut conn = self.db.acquire().await?;

        let sessions = warn_if_slow(
            "list_sessions",
            self.slow_warn,
            self.sessions.list(&mut conn, actor_id, role, &filter, Utc::now()),
        )
        .await?;

        let ids: Vec<SessionId> = sessions.iter().map(|s| s.id).collect();
        let mut payments = self.payments.list_by_session_ids(&mut conn, &ids).await?;

        debug!(count = sessions.len(), payments = payments.len(), "sessions listed");

        Ok(sessions
            .into_iter()
            .map(|s| {
                let payment = payments.remove(&s.id);
                SessionDetail::new(s, payment)
            })
            .collect())
    }

    #[instrument(skip(self), target = "booking")]
    pub async fn get_session(
        &self,
        actor_id: UserId,
        role: Role,
        session_id: SessionId,
    ) -> Result<SessionDetail, BookingError> {
        let mut conn = self.db.acquire().await?;

        let session = self.sessions.get_by_id(&mut conn, session_id).await?;
        if !session.is_participant(role, actor_id) {
            warn!("actor is not a participant of the session");
            return Err(BookingError::Forbidden);
        }

        let payment = self.optional_payment(&mut conn, session_id).await?;
        Ok(SessionDetail::new(session, payment))
    }

    /// Read-only check: is the window free for `coach_id` right now?
    /// Takes no lock, so the answer may be stale by the time it is acted on.
    #[instrument(skip(self), target = "booking")]
    pub async fn check_availability(
        &self,
        coach_id: UserId,
        at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<bool, BookingError> {
        if coach_id <= 0 {
            return Err(BookingError::invalid_input("coach_id must be positive"));
        }
        if duration_minutes <= 0 {
            return Err(BookingError::invalid_input("duration_minutes must be positive"));
        }
        if duration_minutes > MAX_SESSION_MINUTES {
            return Err(BookingError::invalid_input(format!(
                "duration_minutes must not exceed {MAX_SESSION_MINUTES}"
            )));
        }

        let mut conn = self.db.acquire().await?;
        let conflict = self
            .sessions
            .has_conflict(&mut conn, coach_id, at, duration_minutes, None)
            .await?;

        Ok(!conflict)
    }

    /* =========================
    Transitions
    ========================= */

    /// Move a session to the status named by `requested` (free-text token).
    #[instrument(skip(self), target = "booking")]
    pub async fn update_status(
        &self,
        actor_id: UserId,
        role: Role,
        session_id: SessionId,
        requested: &str,
    ) -> Result<SessionDetail, BookingError> {
        let next = normalize_requested_status(requested)?;

        let mut conn = self.db.acquire().await?;
        let session = self.sessions.get_by_id(&mut conn, session_id).await?;

        if let Err(e) = validate_transition(role, actor_id, &session, next, Utc::now()) {
            info!(from = %session.status, to = %next, error = %e, "status change rejected");
            return Err(e);
        }

        if next == SessionStatus::Confirmed {
            // NOTE: pay_for_session confirms and captures in one step, so no
            // pending session normally carries a paid payment. Kept as a guard.
            let paid = self
                .optional_payment(&mut conn, session_id)
                .await?
                .is_some_and(|p| p.status == PaymentStatus::Paid);
            if !paid {
                info!("confirm rejected: payment not captured");
                return Err(BookingError::invalid_transition(
                    "session cannot be confirmed before it is paid",
                ));
            }
        }

        let updated = self
            .sessions
            .update_status_if_current(&mut conn, session_id, session.status, next)
            .await?
            .ok_or_else(|| {
                warn!(expected = %session.status, "status changed concurrently");
                BookingError::invalid_transition("session status changed concurrently")
            })?;

        info!(from = %session.status, to = %next, "session status updated");

        let payment = self.optional_payment(&mut conn, session_id).await?;
        Ok(SessionDetail::new(updated, payment))
    }

    /// Capture the payment and confirm the session in one transaction.
    ///
    /// Idempotent: a session whose payment is already `paid` is returned as
    /// is, without writes.
    #[instrument(skip(self), target = "booking")]
    pub async fn pay_for_session(
        &self,
        actor_id: UserId,
        role: Role,
        session_id: SessionId,
    ) -> Result<SessionDetail, BookingError> {
        if role != Role::User {
            return Err(BookingError::Forbidden);
        }

        let mut tx = self.db.begin().await?;

        let session = warn_if_slow(
            "lock_session",
            self.slow_warn,
            self.sessions.get_by_id_for_update(&mut tx, session_id),
        )
        .await?;
        if session.user_id != actor_id {
            warn!("payment attempted by a non-owner");
            return Err(BookingError::Forbidden);
        }

        let payment = self
            .payments
            .get_by_session_id_for_update(&mut tx, session_id)
            .await?;

        if payment.status == PaymentStatus::Paid {
            tx.rollback().await.map_err(StoreError::from)?;
            debug!("payment already captured");
            return Ok(SessionDetail::new(session, Some(payment)));
        }

        if session.status != SessionStatus::Pending {
            return Err(BookingError::invalid_transition(format!(
                "cannot pay for a {} session",
                session.status
            )));
        }
        if session.scheduled_at <= Utc::now() {
            return Err(BookingError::invalid_transition(
                "cannot pay for a session that has already started",
            ));
        }

        let paid = self
            .payments
            .update_status_if_current(&mut tx, payment.id, PaymentStatus::Placeholder, PaymentStatus::Paid)
            .await?
            .ok_or_else(|| BookingError::invalid_transition("payment status changed concurrently"))?;

        let confirmed = self
            .sessions
            .update_status_if_current(&mut tx, session_id, SessionStatus::Pending, SessionStatus::Confirmed)
            .await?
            .ok_or_else(|| BookingError::invalid_transition("session status changed concurrently"))?;

        warn_if_slow("commit_payment", self.slow_warn, tx.commit())
            .await
            .map_err(StoreError::from)?;

        info!(amount_cents = paid.amount_cents, "payment captured, session confirmed");
        Ok(SessionDetail::new(confirmed, Some(paid)))
    }

    async fn optional_payment(
        &self,
        conn: &mut Conn,
        session_id: SessionId,
    ) -> Result<Option<Payment>, StoreError> {
        match self.payments.get_by_session_id(conn, session_id).await {
            Ok(p) => Ok(Some(p)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
