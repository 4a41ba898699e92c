//! Metrics collection for `Attune`.
//!
//! Prometheus-compatible counters and gauges for session activity. Every
//! label value comes from a closed set (event kinds, phases, outcomes), so
//! no cardinality protection is needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::AttuneError;
use crate::protocol::Phase;
use crate::session::EventKind;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// All three phases ran to the end
    Completed,
    /// `stop()` was called while running
    Stopped,
    /// `start()` failed because the engine refused playback
    Failed,
}

impl SessionOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `AttuneError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), AttuneError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| AttuneError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!("attune_events_total", "Session events emitted, by kind");
    describe_counter!("attune_sessions_total", "Sessions ended, by outcome");
    describe_gauge!(
        "attune_current_phase",
        "Currently active phase (1 = active)"
    );
    describe_histogram!(
        "attune_session_duration_seconds",
        "Wall time from session start to completion or stop"
    );
}

/// Records an emitted session event.
pub fn record_event(kind: EventKind) {
    counter!("attune_events_total", "kind" => kind.as_str()).increment(1);
}

/// Records the end of a session.
pub fn record_session(outcome: SessionOutcome, ran_for: Duration) {
    counter!("attune_sessions_total", "outcome" => outcome.as_str()).increment(1);
    if outcome != SessionOutcome::Failed {
        histogram!("attune_session_duration_seconds").record(ran_for.as_secs_f64());
    }
}

/// Sets the currently active phase gauge; `None` clears every phase.
pub fn set_current_phase(phase: Option<Phase>) {
    for candidate in Phase::ALL {
        let active = if Some(candidate) == phase { 1.0 } else { 0.0 };
        gauge!("attune_current_phase", "phase" => candidate.to_string()).set(active);
    }
}
