//! `validate` command handler

use crate::cli::args::ValidateArgs;
use crate::config::ConfigLoader;
use crate::error::{AttuneError, ConfigError};

/// Validate protocol files without running them.
///
/// Every file is checked even after one fails; the first failure is
/// returned once all files have been reported.
///
/// # Errors
///
/// Returns the first config error found. With `--strict`, warnings count
/// as errors.
pub fn run(args: &ValidateArgs) -> Result<(), AttuneError> {
    let loader = ConfigLoader::with_defaults();
    let mut first_error: Option<ConfigError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating protocol");

        let outcome = loader.load(path).and_then(|loaded| {
            if args.strict && !loaded.warnings.is_empty() {
                Err(ConfigError::ValidationError {
                    source_name: path.display().to_string(),
                    errors: loaded.warnings,
                })
            } else {
                Ok(loaded)
            }
        });

        match outcome {
            Ok(loaded) => println!(
                "{}: ok ({} warnings, {} total)",
                path.display(),
                loaded.warnings.len(),
                crate::report::format_clock(loaded.protocol.total_duration())
            ),
            Err(e) => {
                if let ConfigError::ValidationError { errors, .. } = &e {
                    for issue in errors {
                        eprintln!("{}: {issue}", path.display());
                    }
                } else {
                    eprintln!("{}: {e}", path.display());
                }
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn file(yaml: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        f
    }

    fn args(files: Vec<PathBuf>, strict: bool) -> ValidateArgs {
        ValidateArgs { files, strict }
    }

    #[test]
    fn empty_file_is_the_reference_protocol() {
        let f = file("");
        assert!(run(&args(vec![f.path().to_path_buf()], false)).is_ok());
    }

    #[test]
    fn strict_turns_warnings_into_errors() {
        let f = file("jitter:\n  interval: 30s\n  amount: 1.5\n");
        let path = f.path().to_path_buf();
        assert!(run(&args(vec![path.clone()], false)).is_ok());

        let err = run(&args(vec![path], true)).unwrap_err();
        assert!(matches!(
            err,
            AttuneError::Config(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported_after_checking_the_rest() {
        let good = file("");
        let err = run(&args(
            vec![PathBuf::from("/nonexistent/protocol.yaml"), good.path().to_path_buf()],
            false,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            AttuneError::Config(ConfigError::MissingFile { .. })
        ));
    }
}
