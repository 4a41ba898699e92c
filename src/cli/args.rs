//! CLI argument definitions
//!
//! All Clap derive structs for `attune` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;
use crate::store::DEFAULT_STORE_FILE;

// ============================================================================
// Root CLI
// ============================================================================

/// Guided attention-training sessions with spatial sound.
#[derive(Parser, Debug)]
#[command(name = "attune", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "ATTUNE_COLOR")]
    pub color: ColorChoice,

    /// Log output format on stderr.
    #[arg(long, default_value = "human", global = true, env = "ATTUNE_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full training session.
    Run(RunArgs),

    /// Print the session timeline without playing it.
    Plan(PlanArgs),

    /// Validate protocol files without running them.
    Validate(ValidateArgs),

    /// Record a self-rating before or after a session.
    Rate(RateCommand),

    /// Show the latest session and overall progress.
    Results(ResultsArgs),
}

// ============================================================================
// Session Commands
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a YAML protocol file (defaults to the reference protocol).
    #[arg(short, long, env = "ATTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for switching cue generation and position jitter.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write session events as JSONL to this file.
    #[arg(long, env = "ATTUNE_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Session record store; the open session record is linked to the event log.
    #[arg(long, env = "ATTUNE_STORE")]
    pub store: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "ATTUNE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to a YAML protocol file (defaults to the reference protocol).
    #[arg(short, long, env = "ATTUNE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for switching cue generation.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Protocol files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Rating Commands
// ============================================================================

/// Rating commands.
#[derive(Args, Debug)]
pub struct RateCommand {
    /// Which rating to record.
    #[command(subcommand)]
    pub subcommand: RateSubcommand,
}

/// Rating subcommands.
#[derive(Subcommand, Debug)]
pub enum RateSubcommand {
    /// Rate before a session; opens a new session record.
    Pre(RateArgs),

    /// Rate after a session; completes the open session record.
    Post(RateArgs),
}

/// Arguments for `rate pre` and `rate post`.
#[derive(Args, Debug)]
pub struct RateArgs {
    /// Rating from -3 (self-focused) to 3 (externally focused).
    #[arg(allow_negative_numbers = true)]
    pub value: i64,

    /// Session record store.
    #[arg(long, default_value = DEFAULT_STORE_FILE, env = "ATTUNE_STORE")]
    pub store: PathBuf,
}

/// Arguments for `results`.
#[derive(Args, Debug)]
pub struct ResultsArgs {
    /// Session record store.
    #[arg(long, default_value = DEFAULT_STORE_FILE, env = "ATTUNE_STORE")]
    pub store: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================
