//! `results` command handler

use crate::cli::args::{OutputFormat, ResultsArgs};
use crate::error::AttuneError;
use crate::report::ResultsReport;
use crate::store::JsonSessionStore;

/// Show the latest session and statistics over all completed sessions.
///
/// # Errors
///
/// Returns a store error if the store cannot be read.
pub fn run(args: &ResultsArgs) -> Result<(), AttuneError> {
    let store = JsonSessionStore::new(&args.store);

    let Some(latest) = store.latest()? else {
        match args.format {
            OutputFormat::Human => println!("No sessions recorded yet."),
            OutputFormat::Json => println!("null"),
        }
        return Ok(());
    };

    let report = ResultsReport::new(&latest, store.stats()?);
    match args.format {
        OutputFormat::Human => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
