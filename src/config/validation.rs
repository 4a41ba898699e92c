//! Protocol validation
//!
//! Semantic checks run on a fully built [`Protocol`] against the catalog it
//! will play. Validation collects every issue instead of stopping at the
//! first one, so a protocol file can be fixed in a single pass.

use std::time::Duration;

use crate::catalog::SoundCatalog;
use crate::error::{Severity, ValidationIssue};
use crate::protocol::{Phase, Protocol, blocks_span};

// ============================================================================
// Public API
// ============================================================================

/// Result of protocol validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent scheduling).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Protocol validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a protocol against a catalog and returns the result.
    pub fn validate_protocol(
        &mut self,
        protocol: &Protocol,
        catalog: &SoundCatalog,
    ) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_catalog(catalog);
        for phase in Phase::ALL {
            self.validate_phase(protocol, phase);
        }
        self.validate_cue_blocks(protocol);
        self.validate_selective_target(protocol, catalog);
        self.validate_jitter(protocol);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Checks
    // ========================================================================

    fn validate_catalog(&mut self, catalog: &SoundCatalog) {
        if catalog.len() == 1 {
            self.add_warning(
                "catalog",
                "Catalog has a single sound; switching cues will always target it",
            );
        }
    }

    fn validate_phase(&mut self, protocol: &Protocol, phase: Phase) {
        let config = protocol.phase_config(phase);
        let prefix = format!("phases.{phase}");

        if config.duration.is_zero() {
            self.add_error(&format!("{prefix}.duration"), "Phase duration must be positive");
        }

        for (idx, instruction) in config.overrunning_instructions() {
            self.add_error(
                &format!("{prefix}.instructions[{idx}].at"),
                &format!(
                    "Instruction offset {}ms exceeds phase duration {}ms",
                    millis(instruction.offset),
                    millis(config.duration)
                ),
            );
        }

        for (idx, instruction) in config.instructions.iter().enumerate() {
            let path = format!("{prefix}.instructions[{idx}]");
            if instruction.text.trim().is_empty() {
                self.add_warning(&format!("{path}.text"), "Instruction text is empty");
            }
            if instruction.display_for.is_zero() {
                self.add_warning(
                    &format!("{path}.display"),
                    "Instruction display time is zero; it will never be visible",
                );
            }
        }
    }

    fn validate_cue_blocks(&mut self, protocol: &Protocol) {
        if protocol.cue_blocks.is_empty() {
            self.add_error(
                "switching_blocks",
                "At least one switching block is required",
            );
            return;
        }

        let mut well_formed = true;
        for (idx, block) in protocol.cue_blocks.iter().enumerate() {
            if block.interval.is_zero() {
                self.add_error(
                    &format!("switching_blocks[{idx}].interval"),
                    "Cue interval must be positive",
                );
                well_formed = false;
            }
            if block.count == 0 {
                self.add_error(
                    &format!("switching_blocks[{idx}].count"),
                    "Cue count must be at least 1",
                );
                well_formed = false;
            }
        }

        let span = blocks_span(&protocol.cue_blocks);
        if well_formed && span != protocol.switching.duration {
            self.add_error(
                "switching_blocks",
                &format!(
                    "Switching blocks cover {}ms but the switching phase lasts {}ms",
                    millis(span),
                    millis(protocol.switching.duration)
                ),
            );
        }
    }

    fn validate_selective_target(&mut self, protocol: &Protocol, catalog: &SoundCatalog) {
        let target = protocol.selective_target();
        if catalog.contains(target) {
            return;
        }

        let message = match catalog.suggest(target.as_str()) {
            Some(suggestion) => format!(
                "Selective target '{target}' is not in the catalog. Did you mean '{suggestion}'?"
            ),
            None => format!("Selective target '{target}' is not in the catalog"),
        };
        self.add_error("selective_target", &message);
    }

    fn validate_jitter(&mut self, protocol: &Protocol) {
        let jitter = protocol.jitter;
        if jitter.interval.is_zero() {
            self.add_error("jitter.interval", "Jitter interval must be positive");
        }
        if !jitter.amount.is_finite() || jitter.amount < 0.0 {
            self.add_error("jitter.amount", "Jitter amount must be a non-negative number");
        } else if jitter.amount > 1.0 {
            self.add_warning(
                "jitter.amount",
                "Jitter amount above 1 can swing a sound across the whole stereo field",
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

fn millis(d: Duration) -> u128 {
    d.as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SoundCategory, SoundId, SoundSource, SpatialPosition};
    use crate::protocol::{CueBlock, DEFAULT_DISPLAY, Instruction};

    fn validate(protocol: &Protocol) -> ValidationResult {
        Validator::new().validate_protocol(protocol, &SoundCatalog::reference())
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_reference_is_clean() {
        let result = validate(&Protocol::reference());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_instruction_at_phase_end_is_allowed() {
        let mut protocol = Protocol::reference();
        protocol.divided.instructions.push(Instruction::new(
            Phase::Divided,
            "last call",
            protocol.divided.duration,
            DEFAULT_DISPLAY,
        ));
        assert!(validate(&protocol).is_valid());
    }

    #[test]
    fn test_instruction_past_phase_end() {
        let mut protocol = Protocol::reference();
        protocol.selective.duration = Duration::from_secs(100);
        let result = validate(&protocol);
        // offsets 120s, 180s and 240s no longer fit
        assert_eq!(
            paths(&result.errors),
            vec![
                "phases.selective.instructions[3].at",
                "phases.selective.instructions[4].at",
                "phases.selective.instructions[5].at",
            ]
        );
    }

    #[test]
    fn test_blocks_must_tile_switching_phase() {
        let mut protocol = Protocol::reference();
        protocol.cue_blocks.pop();
        let result = validate(&protocol);
        assert_eq!(paths(&result.errors), vec!["switching_blocks"]);
        assert!(result.errors[0].message.contains("240000ms"));
    }

    #[test]
    fn test_empty_and_degenerate_blocks() {
        let mut protocol = Protocol::reference();
        protocol.cue_blocks.clear();
        assert_eq!(paths(&validate(&protocol).errors), vec!["switching_blocks"]);

        protocol.cue_blocks = vec![CueBlock::new(Duration::ZERO, 5), CueBlock::new(Duration::from_secs(1), 0)];
        assert_eq!(
            paths(&validate(&protocol).errors),
            vec!["switching_blocks[0].interval", "switching_blocks[1].count"]
        );
    }

    #[test]
    fn test_unknown_target_suggests() {
        let mut protocol = Protocol::reference();
        protocol.selective_target = SoundId::new("clock-tic");
        let result = validate(&protocol);
        assert_eq!(paths(&result.errors), vec!["selective_target"]);
        assert!(result.errors[0].message.contains("Did you mean 'clock-tick'"));
    }

    #[test]
    fn test_jitter_checks() {
        let mut protocol = Protocol::reference();
        protocol.jitter.amount = 1.5;
        let result = validate(&protocol);
        assert!(result.is_valid());
        assert_eq!(paths(&result.warnings), vec!["jitter.amount"]);

        protocol.jitter.amount = -0.1;
        protocol.jitter.interval = Duration::ZERO;
        assert_eq!(
            paths(&validate(&protocol).errors),
            vec!["jitter.interval", "jitter.amount"]
        );
    }

    #[test]
    fn test_single_sound_catalog_warns() {
        let catalog = SoundCatalog::new(vec![SoundSource {
            id: SoundId::new("clock-tick"),
            name: "Clock".to_string(),
            position: SpatialPosition { pan: 0.0, distance: 0.5 },
            category: SoundCategory::Near,
            audio_path: String::new(),
            description: String::new(),
        }])
        .unwrap();
        let result = Validator::new().validate_protocol(&Protocol::reference(), &catalog);
        assert!(result.is_valid());
        assert_eq!(paths(&result.warnings), vec!["catalog"]);
    }
}
