//! Structured session event log.
//!
//! Writes one JSON object per line (JSONL) with a monotonic `sequence`
//! number and a wall-clock timestamp. Lines are flushed as they are written
//! so a log tailed during a session is always complete up to the last event.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::SessionEvent;

// ============================================================================
// Entries
// ============================================================================

/// Why a session ended before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user interrupted the session
    Interrupted,
    /// The sound engine failed
    EngineFailure,
}

/// One record in the session log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LogEntry {
    /// A session was started.
    SessionStarted {
        /// Store id of the session, when ratings are tracked
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        /// RNG seed, when the session is reproducible
        #[serde(skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
        /// Total protocol length in milliseconds
        total_duration_ms: u64,
    },
    /// An event fired on the session timeline.
    Event(SessionEvent),
    /// A session ended early.
    SessionStopped {
        /// Why it ended
        reason: StopReason,
        /// Milliseconds since session start
        elapsed_ms: u64,
    },
}

/// Wraps an entry with ordering metadata.
#[derive(Debug, Serialize)]
struct Envelope {
    sequence: u64,
    wall_time: DateTime<Utc>,
    #[serde(flatten)]
    entry: LogEntry,
}

// ============================================================================
// EventLog
// ============================================================================

/// Thread-safe JSONL writer for session log entries.
pub struct EventLog {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Creates a log that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates a log that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates a log that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a log that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates a log that writes to a file at `path`, truncating it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Writes an entry as a single JSONL line.
    ///
    /// Write failures are dropped; logging never interrupts a session.
    pub fn write(&self, entry: LogEntry) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            sequence,
            wall_time: Utc::now(),
            entry,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Writes a session timeline event.
    pub fn emit(&self, event: &SessionEvent) {
        self.write(LogEntry::Event(event.clone()));
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}
