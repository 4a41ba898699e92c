//! Phase identifiers and per-phase scripts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Display time used when an instruction does not specify one.
pub const DEFAULT_DISPLAY: Duration = Duration::from_millis(5000);

/// One of the three stages of a session, in session order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Focus on one sound, ignore all others
    Selective,
    /// Switch focus between sounds on cue, at decreasing intervals
    Switching,
    /// Take in every sound at once
    Divided,
}

impl Phase {
    /// All phases in session order.
    pub const ALL: [Self; 3] = [Self::Selective, Self::Switching, Self::Divided];

    /// The phase that follows this one, or `None` after the last phase.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Selective => Some(Self::Switching),
            Self::Switching => Some(Self::Divided),
            Self::Divided => None,
        }
    }

    /// Zero-based position in the session.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Selective => 0,
            Self::Switching => 1,
            Self::Divided => 2,
        }
    }

    /// Human-readable name shown in the phase banner.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Selective => "Selective Attention",
            Self::Switching => "Rapid Attention Switching",
            Self::Divided => "Divided Attention",
        }
    }

    /// One-line description of what the listener does.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Selective => "Focus on one sound, ignore all others",
            Self::Switching => {
                "Switch attention between sounds at decreasing intervals (10s → 5s → 3s)"
            }
            Self::Divided => "Absorb all sounds simultaneously",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Selective => "selective",
            Self::Switching => "switching",
            Self::Divided => "divided",
        };
        f.write_str(name)
    }
}

/// A timed instruction shown to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Phase the instruction belongs to
    pub phase: Phase,
    /// Text to display
    pub text: String,
    /// When to show it, relative to the phase start
    pub offset: Duration,
    /// How long to keep it on screen
    pub display_for: Duration,
}

impl Instruction {
    /// Creates an instruction.
    #[must_use]
    pub fn new(phase: Phase, text: impl Into<String>, offset: Duration, display_for: Duration) -> Self {
        Self {
            phase,
            text: text.into(),
            offset,
            display_for,
        }
    }
}

/// Duration and instruction script of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Which phase this configures
    pub phase: Phase,
    /// Total phase length
    pub duration: Duration,
    /// Instructions in script order
    pub instructions: Vec<Instruction>,
}

impl PhaseConfig {
    /// Returns instructions whose offset lies beyond the phase duration.
    pub fn overrunning_instructions(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, i)| i.offset > self.duration)
    }
}
