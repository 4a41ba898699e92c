//! Protocol file loader
//!
//! Loading pipeline:
//! 1. Size check against [`ConfigLimits`]
//! 2. YAML parsing into [`ProtocolConfig`]
//! 3. Conversion to a [`Protocol`] and a [`SoundCatalog`]
//! 4. Validation

use std::path::Path;

use crate::catalog::SoundCatalog;
use crate::config::schema::ProtocolConfig;
use crate::config::validation::Validator;
use crate::error::{ConfigError, ValidationIssue};
use crate::protocol::Protocol;

// ============================================================================
// Public API
// ============================================================================

/// Limits applied while loading.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum protocol file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_config_size: env_or("ATTUNE_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// Result of loading a protocol file.
#[derive(Debug)]
pub struct LoadResult {
    /// The validated protocol.
    pub protocol: Protocol,

    /// The validated catalog the protocol plays.
    pub catalog: SoundCatalog,

    /// Warnings found during validation.
    pub warnings: Vec<ValidationIssue>,
}

/// Protocol file loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Creates a loader with default limits.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads and validates a protocol file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - YAML parsing fails
    /// - A duration does not parse
    /// - The catalog or protocol fails validation
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.limits.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let config: ProtocolConfig = if raw.trim().is_empty() {
            ProtocolConfig::default()
        } else {
            serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        self.build(&config, &path.display().to_string())
    }

    /// Builds and validates a protocol from an already parsed file.
    ///
    /// `source_name` labels validation errors.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparseable durations and
    /// `ConfigError::ValidationError` for catalog or protocol issues.
    pub fn build(
        &self,
        config: &ProtocolConfig,
        source_name: &str,
    ) -> Result<LoadResult, ConfigError> {
        let protocol = Protocol::from_config(config)?;

        let catalog = SoundCatalog::new(config.catalog_sources()).map_err(|e| match e {
            ConfigError::ValidationError { errors, .. } => ConfigError::ValidationError {
                source_name: source_name.to_string(),
                errors,
            },
            other => other,
        })?;

        let result = Validator::new().validate_protocol(&protocol, &catalog);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                source_name: source_name.to_string(),
                errors: result.errors,
            });
        }

        for warning in &result.warnings {
            tracing::warn!(source = source_name, "{warning}");
        }

        Ok(LoadResult {
            protocol,
            catalog,
            warnings: result.warnings,
        })
    }

    /// Returns the reference protocol and catalog.
    #[must_use]
    pub fn reference() -> LoadResult {
        LoadResult {
            protocol: Protocol::reference(),
            catalog: SoundCatalog::reference(),
            warnings: Vec::new(),
        }
    }
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
