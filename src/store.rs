//! Session record store
//!
//! Persists before/after self-attention ratings so sessions can be compared
//! over time. Records live in a single JSON document holding every session
//! and a pointer to the session currently in progress.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// File name used when no store path is given.
pub const DEFAULT_STORE_FILE: &str = "attune-sessions.json";

// ============================================================================
// Records
// ============================================================================

/// Self-reported attention focus, from -3 (self-focused) to 3 (externally
/// focused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SelfRating(i8);

impl SelfRating {
    /// Lowest rating.
    pub const MIN: i8 = -3;
    /// Highest rating.
    pub const MAX: i8 = 3;

    /// Creates a rating.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRating` outside `-3..=3`.
    pub fn new(value: i64) -> Result<Self, StoreError> {
        i8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(StoreError::InvalidRating(value))
    }

    /// The rating as an integer.
    #[must_use]
    pub const fn value(self) -> i8 {
        self.0
    }
}

impl TryFrom<i64> for SelfRating {
    type Error = StoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SelfRating> for i64 {
    fn from(rating: SelfRating) -> Self {
        Self::from(rating.0)
    }
}

/// A rating and when it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Rating value
    pub value: SelfRating,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
}

impl RatingEntry {
    fn now(value: SelfRating) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
        }
    }
}

/// One session's ratings and timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique id
    pub id: String,
    /// When the pre-session rating was given
    pub started_at: DateTime<Utc>,
    /// When the post-session rating was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Rating before the session
    pub pre_rating: RatingEntry,
    /// Rating after the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_rating: Option<RatingEntry>,
    /// Whether the post rating was recorded
    pub completed: bool,
}

impl SessionRecord {
    /// Time between start and end, for completed sessions.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::TimeDelta> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// `post - pre`, for completed sessions.
    #[must_use]
    pub fn rating_change(&self) -> Option<i8> {
        self.post_rating
            .map(|post| post.value.value() - self.pre_rating.value.value())
    }
}

/// Aggregate statistics over completed sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionStats {
    /// Number of completed sessions
    pub total_sessions: usize,
    /// Mean pre rating, one decimal
    pub average_pre: f64,
    /// Mean post rating, one decimal
    pub average_post: f64,
    /// Mean post minus mean pre, one decimal
    pub average_change: f64,
    /// Percentage of sessions whose post rating beat the pre rating
    pub improvement_rate: u32,
}

impl SessionStats {
    /// Computes statistics from a set of records, ignoring incomplete ones.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_records(records: &[SessionRecord]) -> Self {
        let completed: Vec<&SessionRecord> = records.iter().filter(|r| r.completed).collect();
        if completed.is_empty() {
            return Self {
                total_sessions: 0,
                average_pre: 0.0,
                average_post: 0.0,
                average_change: 0.0,
                improvement_rate: 0,
            };
        }

        let pre: Vec<f64> = completed
            .iter()
            .map(|r| f64::from(r.pre_rating.value.value()))
            .collect();
        let post: Vec<f64> = completed
            .iter()
            .filter_map(|r| r.post_rating.map(|p| f64::from(p.value.value())))
            .collect();
        let avg_pre = mean(&pre);
        let avg_post = mean(&post);
        let improved = completed
            .iter()
            .filter(|r| r.rating_change().is_some_and(|c| c > 0))
            .count();
        let rate = improved as f64 / completed.len() as f64 * 100.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let improvement_rate = rate.round() as u32;

        Self {
            total_sessions: completed.len(),
            average_pre: round1(avg_pre),
            average_post: round1(avg_post),
            average_change: round1(avg_post - avg_pre),
            improvement_rate,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<String>,
}

/// Session store backed by one JSON file.
///
/// Every operation reads the file, applies the change and writes it back
/// through a temporary file and rename. A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    /// Opens a store at `path`. The file is created on the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts a record, replacing any record with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read or written.
    pub fn save(&self, record: SessionRecord) -> Result<(), StoreError> {
        self.update(|file| {
            match file.sessions.iter_mut().find(|s| s.id == record.id) {
                Some(existing) => *existing = record,
                None => file.sessions.push(record),
            }
            Ok(())
        })
    }

    /// Looks up a record by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read.
    pub fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.read()?.sessions.into_iter().find(|s| s.id == id))
    }

    /// Every record, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read.
    pub fn all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.read()?.sessions)
    }

    /// The record with the latest start time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read.
    pub fn latest(&self) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .read()?
            .sessions
            .into_iter()
            .reduce(|latest, s| if s.started_at > latest.started_at { s } else { latest }))
    }

    /// Completed records, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read.
    pub fn completed(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .read()?
            .sessions
            .into_iter()
            .filter(|s| s.completed)
            .collect())
    }

    /// Removes a record. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read or written.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.update(|file| {
            let before = file.sessions.len();
            file.sessions.retain(|s| s.id != id);
            removed = file.sessions.len() != before;
            if file.current.as_deref() == Some(id) {
                file.current = None;
            }
            Ok(())
        })?;
        Ok(removed)
    }

    /// Removes every record and the current-session pointer.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.write(&StoreFile::default())
    }

    /// Marks a stored session as the one in progress.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has that id.
    pub fn set_current(&self, id: &str) -> Result<(), StoreError> {
        self.update(|file| {
            if !file.sessions.iter().any(|s| s.id == id) {
                return Err(StoreError::NotFound(id.to_string()));
            }
            file.current = Some(id.to_string());
            Ok(())
        })
    }

    /// The session in progress, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read.
    pub fn current(&self) -> Result<Option<SessionRecord>, StoreError> {
        let file = self.read()?;
        let Some(id) = file.current else {
            return Ok(None);
        };
        Ok(file.sessions.into_iter().find(|s| s.id == id))
    }

    /// Forgets the session in progress without deleting its record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read or written.
    pub fn clear_current(&self) -> Result<(), StoreError> {
        self.update(|file| {
            file.current = None;
            Ok(())
        })
    }

    /// Records a pre-session rating as a new session and makes it current.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read or written.
    pub fn create_session(&self, pre: SelfRating) -> Result<SessionRecord, StoreError> {
        let pre_rating = RatingEntry::now(pre);
        let record = SessionRecord {
            id: format!("session_{}", uuid::Uuid::new_v4().simple()),
            started_at: pre_rating.timestamp,
            ended_at: None,
            pre_rating,
            post_rating: None,
            completed: false,
        };
        let stored = record.clone();
        self.update(move |file| {
            file.current = Some(stored.id.clone());
            file.sessions.push(stored);
            Ok(())
        })?;
        debug!(id = %record.id, pre = pre.value(), "session record created");
        Ok(record)
    }

    /// Records the post-session rating and marks the session completed.
    /// Clears the current-session pointer if it pointed at this session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has that id.
    pub fn complete_session(
        &self,
        id: &str,
        post: SelfRating,
    ) -> Result<SessionRecord, StoreError> {
        let mut completed = None;
        self.update(|file| {
            let record = file
                .sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let post_rating = RatingEntry::now(post);
            record.ended_at = Some(post_rating.timestamp);
            record.post_rating = Some(post_rating);
            record.completed = true;
            completed = Some(record.clone());
            if file.current.as_deref() == Some(id) {
                file.current = None;
            }
            Ok(())
        })?;
        completed.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Statistics over completed sessions.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file cannot be read.
    pub fn stats(&self) -> Result<SessionStats, StoreError> {
        Ok(SessionStats::from_records(&self.read()?.sessions))
    }

    fn read(&self) -> Result<StoreFile, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(StoreFile::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &StoreFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreFile) -> Result<(), StoreError>,
    {
        let mut file = self.read()?;
        f(&mut file)?;
        self.write(&file)
    }
}
