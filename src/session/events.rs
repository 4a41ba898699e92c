//! Session event types.
//!
//! Every action that fires on the session timeline produces at most one
//! [`SessionEvent`]. Events carry the time since session start at which
//! they were due, not the time the driver woke up.

use std::time::Duration;

use serde::Serialize;

use crate::catalog::SoundId;
use crate::protocol::Phase;

/// Kind of a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// A phase began
    PhaseStart,
    /// A phase reached its duration
    PhaseEnd,
    /// An instruction should be shown
    Instruction,
    /// Attention should move to another sound
    SwitchSound,
    /// The last phase ended
    SessionComplete,
}

impl EventKind {
    /// Wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PhaseStart => "phase-start",
            Self::PhaseEnd => "phase-end",
            Self::Instruction => "instruction",
            Self::SwitchSound => "switch-sound",
            Self::SessionComplete => "session-complete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Payload of `phase-start`
    PhaseStart {
        /// Display name of the phase
        phase_name: String,
        /// Phase length in milliseconds
        duration_ms: u64,
        /// Locked target, selective phase only
        #[serde(skip_serializing_if = "Option::is_none")]
        target_sound: Option<SoundId>,
    },
    /// Payload of `phase-end`
    PhaseEnd {
        /// Display name of the phase
        phase_name: String,
    },
    /// Payload of `instruction`
    Instruction {
        /// Text to show
        text: String,
        /// How long to show it, in milliseconds
        display_ms: u64,
    },
    /// Payload of `switch-sound`
    SwitchSound {
        /// New target
        sound_id: SoundId,
        /// Display name of the new target
        sound_name: String,
        /// Interval of the block this cue belongs to, in milliseconds
        interval_ms: u64,
        /// Zero-based cue position in the switching phase
        index: usize,
        /// Number of cues in the switching phase
        total: usize,
    },
    /// Payload of `session-complete`
    SessionComplete {
        /// Total protocol length in milliseconds
        total_duration_ms: u64,
    },
}

impl EventPayload {
    /// The event kind this payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PhaseStart { .. } => EventKind::PhaseStart,
            Self::PhaseEnd { .. } => EventKind::PhaseEnd,
            Self::Instruction { .. } => EventKind::Instruction,
            Self::SwitchSound { .. } => EventKind::SwitchSound,
            Self::SessionComplete { .. } => EventKind::SessionComplete,
        }
    }
}

/// An event emitted by the session scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    /// Event kind, always consistent with `payload`
    pub kind: EventKind,
    /// Phase the event belongs to
    pub phase: Phase,
    /// Kind-specific data
    pub payload: EventPayload,
    /// Milliseconds since session start
    pub timestamp_ms: u64,
}

impl SessionEvent {
    /// Creates an event, deriving the kind from the payload.
    #[must_use]
    pub const fn new(phase: Phase, payload: EventPayload, timestamp_ms: u64) -> Self {
        Self {
            kind: payload.kind(),
            phase,
            payload,
            timestamp_ms,
        }
    }

    /// Instruction text, for `instruction` events.
    #[must_use]
    pub fn instruction_text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Instruction { text, .. } => Some(text),
            _ => None,
        }
    }

    /// New target, for `switch-sound` events.
    #[must_use]
    pub const fn switch_target(&self) -> Option<&SoundId> {
        match &self.payload {
            EventPayload::SwitchSound { sound_id, .. } => Some(sound_id),
            _ => None,
        }
    }
}

/// Converts a duration to whole milliseconds, saturating.
pub(crate) fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
