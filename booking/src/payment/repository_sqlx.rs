use std::collections::HashMap;

use sqlx::Row;
use sqlx::any::AnyRow;

use crate::db::lock::{LockKey, for_update_clause, prepare_row_lock};
use crate::db::{Backend, Conn, StoreError, placeholders};
use crate::payment::model::{NewPayment, Payment, PaymentId, PaymentStatus};
use crate::session::model::SessionId;
use crate::time::{from_ms, now_ms};

/// Session ids bound per `IN (...)` lookup.
pub const LOOKUP_BATCH: usize = 500;

const PAYMENT_COLUMNS: &str =
    "id, booking_id, user_id, coach_id, amount_cents, status, created_at_ms";

/// SQLx-backed persistence for payments.
#[derive(Clone, Copy, Debug)]
pub struct SqlxPaymentRepository {
    backend: Backend,
}

impl SqlxPaymentRepository {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn create(&self, conn: &mut Conn, input: &NewPayment) -> Result<Payment, StoreError> {
        let sql = format!(
            r#"
INSERT INTO payments (booking_id, user_id, coach_id, amount_cents, status, created_at_ms)
VALUES ($1, $2, $3, $4, $5, $6)
RETURNING {PAYMENT_COLUMNS};
"#
        );

        let row = sqlx::query(&sql)
            .bind(input.session_id)
            .bind(input.user_id)
            .bind(input.coach_id)
            .bind(input.amount_cents)
            .bind(input.status.as_str())
            .bind(now_ms())
            .fetch_one(&mut *conn)
            .await?;

        row_to_payment(&row)
    }

    /// Latest payment recorded for `session_id`.
    pub async fn get_by_session_id(
        &self,
        conn: &mut Conn,
        session_id: SessionId,
    ) -> Result<Payment, StoreError> {
        self.fetch_latest(conn, session_id, "").await
    }

    pub async fn get_by_session_id_for_update(
        &self,
        conn: &mut Conn,
        session_id: SessionId,
    ) -> Result<Payment, StoreError> {
        prepare_row_lock(conn, self.backend, LockKey::Payment(session_id)).await?;
        self.fetch_latest(conn, session_id, for_update_clause(self.backend))
            .await
    }

    async fn fetch_latest(
        &self,
        conn: &mut Conn,
        session_id: SessionId,
        suffix: &str,
    ) -> Result<Payment, StoreError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1 \
             ORDER BY id DESC LIMIT 1{suffix};"
        );

        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound("payment"))?;

        row_to_payment(&row)
    }

    /// Payments keyed by session. Sessions without a payment are absent from
    /// the map; if a session has several, the most recent one wins.
    ///
    /// Ids are sent in batches of [`LOOKUP_BATCH`] so long listings stay under
    /// the backend's bind-parameter limit. Malformed rows are skipped.
    pub async fn list_by_session_ids(
        &self,
        conn: &mut Conn,
        session_ids: &[SessionId],
    ) -> Result<HashMap<SessionId, Payment>, StoreError> {
        let mut out = HashMap::with_capacity(session_ids.len());

        for batch in session_ids.chunks(LOOKUP_BATCH) {
            let sql = format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id IN ({}) ORDER BY id ASC;",
                placeholders(1, batch.len())
            );

            let mut query = sqlx::query(&sql);
            for id in batch {
                query = query.bind(*id);
            }

            for r in query.fetch_all(&mut *conn).await? {
                match row_to_payment(&r) {
                    Ok(p) => {
                        out.insert(p.session_id, p);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed payment row");
                    }
                }
            }
        }

        Ok(out)
    }

    pub async fn update_status(
        &self,
        conn: &mut Conn,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let sql = format!(
            "UPDATE payments SET status = $2 WHERE id = $1 RETURNING {PAYMENT_COLUMNS};"
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound("payment"))?;

        row_to_payment(&row)
    }

    /// Compare-and-swap status write; `None` when the status moved under us.
    pub async fn update_status_if_current(
        &self,
        conn: &mut Conn,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Option<Payment>, StoreError> {
        let sql = format!(
            "UPDATE payments SET status = $3 WHERE id = $1 AND status = $2 \
             RETURNING {PAYMENT_COLUMNS};"
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(row_to_payment).transpose()
    }
}

fn row_to_payment(r: &AnyRow) -> Result<Payment, StoreError> {
    let status_str: String = r.try_get("status")?;
    let status = status_str.parse::<PaymentStatus>().map_err(StoreError::Corrupt)?;

    Ok(Payment {
        id: r.try_get("id")?,
        session_id: r.try_get("booking_id")?,
        user_id: r.try_get("user_id")?,
        coach_id: r.try_get("coach_id")?,
        amount_cents: r.try_get("amount_cents")?,
        status,
        created_at: from_ms("created_at_ms", r.try_get("created_at_ms")?)?,
    })
}
