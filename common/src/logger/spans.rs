use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Create a root span for a request / command / job.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        actor_id = field::Empty,
        session_id = field::Empty
    )
}

/// Create a child span (inherits trace_id from its parent).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!(
        "child",
        name = %name,
        actor_id = field::Empty,
        session_id = field::Empty
    )
}

/// Record actor / session identity on the current span.
pub fn annotate_span(actor_id: i64, session_id: Option<i64>) {
    let span = Span::current();
    span.record("actor_id", field::display(actor_id));
    if let Some(sid) = session_id {
        span.record("session_id", field::display(sid));
    }
}

/// Await `fut`, emitting a `performance` warning when it takes longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
