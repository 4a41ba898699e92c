//! Protocol file schema
//!
//! YAML representation of a protocol. Every field is optional; anything
//! left out falls back to the reference protocol. Durations are written as
//! human strings (`"5m"`, `"8s"`, `"1500ms"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{SoundCatalog, SoundCategory, SoundId, SoundSource, SpatialPosition};
use crate::error::ConfigError;
use crate::protocol::{
    CueBlock, DEFAULT_DISPLAY, Instruction, JitterConfig, Phase, PhaseConfig, Protocol,
};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root of a protocol file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Sound catalog (reference catalog when omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Vec<SoundSourceConfig>>,

    /// Sound the selective phase targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selective_target: Option<String>,

    /// Per-phase durations and scripts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<PhasesConfig>,

    /// Switching cue layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switching_blocks: Option<Vec<CueBlockConfig>>,

    /// Position jitter settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<JitterSettings>,
}

/// The three phase sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhasesConfig {
    /// Selective attention phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selective: Option<PhaseSettings>,

    /// Switching phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switching: Option<PhaseSettings>,

    /// Divided attention phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divided: Option<PhaseSettings>,
}

/// Duration and script of one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseSettings {
    /// Phase length (e.g. `"5m"`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Replaces the reference script when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<InstructionConfig>>,
}

/// A scripted instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstructionConfig {
    /// Text shown to the listener
    pub text: String,

    /// Offset from the phase start
    pub at: String,

    /// Display time (5s when omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A block of evenly spaced switching cues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CueBlockConfig {
    /// Spacing between cues
    pub interval: String,

    /// Number of cues
    pub count: u32,
}

/// Position jitter settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JitterSettings {
    /// Time between variations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Maximum pan offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f32>,
}

/// A catalog entry as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoundSourceConfig {
    /// Unique id
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stereo pan in [-1, 1]
    #[serde(default)]
    pub pan: f32,

    /// Distance in [0, 1]
    #[serde(default)]
    pub distance: f32,

    /// Distance class
    pub category: SoundCategory,

    /// Audio asset path (defaults to `sounds/<id>.mp3`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Conversion
// ============================================================================

impl ProtocolConfig {
    /// Returns the catalog entries this file describes, or the reference
    /// catalog when it has none. Entries are not validated here.
    #[must_use]
    pub fn catalog_sources(&self) -> Vec<SoundSource> {
        let Some(entries) = &self.catalog else {
            return SoundCatalog::reference().iter().cloned().collect();
        };

        entries
            .iter()
            .map(|entry| SoundSource {
                id: SoundId::new(&entry.id),
                name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
                position: SpatialPosition {
                    pan: entry.pan,
                    distance: entry.distance,
                },
                category: entry.category,
                audio_path: entry
                    .audio_path
                    .clone()
                    .unwrap_or_else(|| format!("sounds/{}.mp3", entry.id)),
                description: entry.description.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Builds the protocol, overlaying this file on the reference protocol.
    ///
    /// The result is not validated against any catalog.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a duration string does not
    /// parse.
    pub fn to_protocol(&self) -> Result<Protocol, ConfigError> {
        let mut protocol = Protocol::reference();

        if let Some(phases) = &self.phases {
            for (phase, settings) in [
                (Phase::Selective, &phases.selective),
                (Phase::Switching, &phases.switching),
                (Phase::Divided, &phases.divided),
            ] {
                if let Some(settings) = settings {
                    let target = match phase {
                        Phase::Selective => &mut protocol.selective,
                        Phase::Switching => &mut protocol.switching,
                        Phase::Divided => &mut protocol.divided,
                    };
                    settings.apply(phase, target)?;
                }
            }
        }

        if let Some(blocks) = &self.switching_blocks {
            protocol.cue_blocks = blocks
                .iter()
                .enumerate()
                .map(|(idx, block)| {
                    let field = format!("switching_blocks[{idx}].interval");
                    Ok(CueBlock::new(parse_duration(&field, &block.interval)?, block.count))
                })
                .collect::<Result<_, ConfigError>>()?;
        }

        if let Some(target) = &self.selective_target {
            protocol.selective_target = SoundId::new(target);
        }

        if let Some(jitter) = &self.jitter {
            let defaults = JitterConfig::default();
            protocol.jitter = JitterConfig {
                interval: match &jitter.interval {
                    Some(s) => parse_duration("jitter.interval", s)?,
                    None => defaults.interval,
                },
                amount: jitter.amount.unwrap_or(defaults.amount),
            };
        }

        Ok(protocol)
    }
}

impl PhaseSettings {
    fn apply(&self, phase: Phase, target: &mut PhaseConfig) -> Result<(), ConfigError> {
        if let Some(duration) = &self.duration {
            target.duration = parse_duration(&format!("phases.{phase}.duration"), duration)?;
        }

        if let Some(instructions) = &self.instructions {
            target.instructions = instructions
                .iter()
                .enumerate()
                .map(|(idx, inst)| {
                    let path = format!("phases.{phase}.instructions[{idx}]");
                    let offset = parse_duration(&format!("{path}.at"), &inst.at)?;
                    let display = match &inst.display {
                        Some(s) => parse_duration(&format!("{path}.display"), s)?,
                        None => DEFAULT_DISPLAY,
                    };
                    Ok(Instruction::new(phase, inst.text.clone(), offset, display))
                })
                .collect::<Result<_, ConfigError>>()?;
        }

        Ok(())
    }
}

/// Parses a human duration string for `field`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` naming the field on failure.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("a duration such as \"30s\" or \"5m\" ({e})"),
    })
}
