//! Error types for `Attune`
//!
//! Errors are layered the same way the session runs: configuration problems
//! are caught before a session exists, engine problems surface from
//! `start()`, and store problems belong to the rating/results front-end.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `attune` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Sound engine could not start playback
    pub const ENGINE_ERROR: i32 = 4;

    /// Session record store error
    pub const STORE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Attune` operations.
///
/// Aggregates the domain errors and maps each one to a process exit code.
#[derive(Debug, Error)]
pub enum AttuneError {
    /// Protocol or catalog configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Sound engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Session record store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AttuneError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Store(_) => ExitCode::STORE_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Protocol and catalog configuration errors.
///
/// Every variant is fatal to session creation. Offsets and ranges are never
/// clamped to make a configuration fit.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Protocol validation failed
    #[error("validation failed for {source_name}: {}", summarize(.errors))]
    ValidationError {
        /// File path or `"<builtin>"` for in-code protocols
        source_name: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration file {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the configuration file
        path: PathBuf,
        /// Actual size in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during protocol validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "phases.selective.instructions[2].at")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents the protocol from being used
    Error,
    /// Warning - potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Sound Engine Errors
// ============================================================================

/// Sound engine errors.
///
/// Only failures that make playback impossible are errors. Unknown sound ids
/// are logged no-ops inside the engine and never reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Playback was requested before `initialize` completed
    #[error("sound engine not initialized")]
    NotInitialized,

    /// The platform refused to start playback (e.g. no audio permission)
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),

    /// Loading a sound failed during initialization
    #[error("failed to load sound '{id}': {reason}")]
    LoadFailed {
        /// Sound id that failed to load
        id: String,
        /// Underlying failure
        reason: String,
    },
}

// ============================================================================
// Store Errors
// ============================================================================

/// Session record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the store file
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file is not valid JSON
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced session does not exist
    #[error("session not found: {0}")]
    NotFound(String),

    /// No session is currently in progress
    #[error("no session in progress; submit a pre-session rating first")]
    NoCurrentSession,

    /// Rating value outside [-3, 3]
    #[error("rating {0} is out of range (expected -3..=3)")]
    InvalidRating(i64),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `Attune` operations.
pub type Result<T> = std::result::Result<T, AttuneError>;

// ============================================================================
// Tests
// ============================================================================
