//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod plan;
pub mod rate;
pub mod results;
pub mod run;
pub mod validate;

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, RateSubcommand};
use crate::config::{ConfigLoader, LoadResult};
use crate::error::{AttuneError, ConfigError};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `cancel` is triggered by the process signal handler; only `run` waits
/// long enough to observe it.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), AttuneError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Plan(args) => plan::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Rate(cmd) => match cmd.subcommand {
            RateSubcommand::Pre(args) => rate::pre(&args),
            RateSubcommand::Post(args) => rate::post(&args),
        },
        Commands::Results(args) => results::run(&args),
    }
}

/// Loads the protocol at `path`, or the reference protocol.
fn load_protocol(path: Option<&Path>) -> Result<LoadResult, ConfigError> {
    match path {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading protocol");
            ConfigLoader::with_defaults().load(path)
        }
        None => {
            tracing::debug!("using reference protocol");
            Ok(ConfigLoader::reference())
        }
    }
}
