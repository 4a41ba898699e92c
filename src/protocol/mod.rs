//! Protocol definition
//!
//! Pure description of a session: how long each phase lasts, which
//! instructions it shows and when, how the switching cues are laid out,
//! which sound the selective phase locks onto, and how often sound
//! positions are jittered.
//!
//! # Architecture
//!
//! - [`Phase`], [`PhaseConfig`], [`Instruction`]: per-phase scripts
//! - [`CueBlock`], [`SwitchingCue`], [`generate_switching_cues`]: switching timeline
//! - [`Protocol`]: the complete, validatable definition

pub mod cues;
pub mod phase;

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::catalog::{SoundCatalog, SoundId};
use crate::config::schema::ProtocolConfig;
use crate::config::validation::Validator;
use crate::error::{ConfigError, ValidationIssue};

pub use cues::{CueBlock, SwitchingCue, blocks_span, generate_switching_cues};
pub use phase::{DEFAULT_DISPLAY, Instruction, Phase, PhaseConfig};

const MINUTE: Duration = Duration::from_secs(60);

/// Periodic position variation applied to every sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterConfig {
    /// Time between two variations
    pub interval: Duration,
    /// Maximum pan offset per variation, as a fraction of the pan range
    pub amount: f32,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            amount: 0.15,
        }
    }
}

/// Complete session protocol.
///
/// Construction is unchecked; [`Protocol::validate`] must pass before the
/// protocol is scheduled. `SessionScheduler::new` and the config loader
/// both enforce this.
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    /// Phase 1 script
    pub selective: PhaseConfig,
    /// Phase 2 script (cues are generated separately)
    pub switching: PhaseConfig,
    /// Phase 3 script
    pub divided: PhaseConfig,
    /// Switching cue layout, in order
    pub cue_blocks: Vec<CueBlock>,
    /// Sound the selective phase targets in every session
    pub selective_target: SoundId,
    /// Habituation countermeasure
    pub jitter: JitterConfig,
}

impl Protocol {
    /// The reference 12-minute protocol (5 + 5 + 2 minutes).
    #[must_use]
    pub fn reference() -> Self {
        Self {
            selective: PhaseConfig {
                phase: Phase::Selective,
                duration: 5 * MINUTE,
                instructions: script(
                    Phase::Selective,
                    &[
                        ("Focus all your attention on the clock ticking.", 0, 5000),
                        ("No other sound matters. Only the clock.", 8_000, 4000),
                        (
                            "If your attention is captured by another sound, gently return it to the clock.",
                            60_000,
                            5000,
                        ),
                        ("Maintain focus only on the clock ticking.", 120_000, 4000),
                        (
                            "If you notice your mind wandering, simply bring your attention back.",
                            180_000,
                            5000,
                        ),
                        ("Continue focusing only on the clock.", 240_000, 4000),
                    ],
                ),
            },
            switching: PhaseConfig {
                phase: Phase::Switching,
                duration: 5 * MINUTE,
                instructions: script(
                    Phase::Switching,
                    &[
                        (
                            "Now you will switch your attention rapidly between different sounds.",
                            0,
                            5000,
                        ),
                        ("Listen carefully for the instruction to switch.", 6_000, 4000),
                        ("Switching will become faster. Stay alert.", 120_000, 4000),
                        ("Continue switching quickly between sounds.", 240_000, 4000),
                    ],
                ),
            },
            divided: PhaseConfig {
                phase: Phase::Divided,
                duration: 2 * MINUTE,
                instructions: script(
                    Phase::Divided,
                    &[
                        ("Now, try to absorb all sounds at the same time.", 0, 5000),
                        (
                            "Expand your awareness to encompass every sound simultaneously.",
                            7_000,
                            5000,
                        ),
                        (
                            "Do not focus on any single sound. Take in everything at once.",
                            60_000,
                            5000,
                        ),
                        ("How many sounds can you hear at the same time?", 90_000, 5000),
                    ],
                ),
            },
            cue_blocks: vec![
                CueBlock::new(Duration::from_secs(10), 12),
                CueBlock::new(Duration::from_secs(5), 24),
                CueBlock::new(Duration::from_secs(3), 20),
            ],
            selective_target: SoundId::new("clock-tick"),
            jitter: JitterConfig::default(),
        }
    }

    /// Builds a protocol from a parsed protocol file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a duration does not parse.
    pub fn from_config(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.to_protocol()
    }

    /// Returns the duration and instruction script of a phase.
    #[must_use]
    pub const fn phase_config(&self, phase: Phase) -> &PhaseConfig {
        match phase {
            Phase::Selective => &self.selective,
            Phase::Switching => &self.switching,
            Phase::Divided => &self.divided,
        }
    }

    /// Sum of the three phase durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Phase::ALL
            .iter()
            .map(|p| self.phase_config(*p).duration)
            .sum()
    }

    /// The sound the selective phase locks onto. Identical in every session.
    #[must_use]
    pub const fn selective_target(&self) -> &SoundId {
        &self.selective_target
    }

    /// Generates a fresh switching cue sequence for one session.
    pub fn generate_switching_cues<R: Rng + ?Sized>(
        &self,
        catalog: &SoundCatalog,
        rng: &mut R,
    ) -> Vec<SwitchingCue> {
        generate_switching_cues(&self.cue_blocks, catalog, rng)
    }

    /// Checks the protocol against a catalog.
    ///
    /// Returns the warnings on success.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if any instruction overruns its
    /// phase, the cue blocks do not tile the switching phase, or the
    /// selective target is not in the catalog.
    pub fn validate(&self, catalog: &SoundCatalog) -> Result<Vec<ValidationIssue>, ConfigError> {
        let result = Validator::new().validate_protocol(self, catalog);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                source_name: "<protocol>".to_string(),
                errors: result.errors,
            });
        }
        Ok(result.warnings)
    }

    /// Summary of the protocol for display.
    #[must_use]
    pub fn summary(&self, catalog: &SoundCatalog) -> ProtocolSummary {
        ProtocolSummary {
            total_duration: self.total_duration(),
            phases: Phase::ALL
                .iter()
                .map(|&phase| PhaseSummary {
                    phase,
                    name: phase.display_name(),
                    duration: self.phase_config(phase).duration,
                    description: phase.description(),
                    instructions: self.phase_config(phase).instructions.len(),
                })
                .collect(),
            total_sounds: catalog.len(),
        }
    }
}

/// Builds an instruction list from `(text, offset_ms, display_ms)` rows.
fn script(phase: Phase, rows: &[(&str, u64, u64)]) -> Vec<Instruction> {
    rows.iter()
        .map(|&(text, at, display)| {
            Instruction::new(
                phase,
                text,
                Duration::from_millis(at),
                Duration::from_millis(display),
            )
        })
        .collect()
}

/// Overview of a protocol.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolSummary {
    /// Length of a full session
    #[serde(rename = "total_duration_ms", serialize_with = "cues::serialize_ms")]
    pub total_duration: Duration,
    /// One entry per phase, in order
    pub phases: Vec<PhaseSummary>,
    /// Catalog size
    pub total_sounds: usize,
}

/// Overview of one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary {
    /// Phase identifier
    pub phase: Phase,
    /// Display name
    pub name: &'static str,
    /// Phase length
    #[serde(rename = "duration_ms", serialize_with = "cues::serialize_ms")]
    pub duration: Duration,
    /// What the listener does
    pub description: &'static str,
    /// Number of scripted instructions
    pub instructions: usize,
}
