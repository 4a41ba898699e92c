//! Protocol configuration
//!
//! Loads protocol files written in YAML, overlays them on the reference
//! protocol and validates the result against its catalog.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult};
pub use schema::{
    CueBlockConfig, InstructionConfig, JitterSettings, PhaseSettings, PhasesConfig,
    ProtocolConfig, SoundSourceConfig, parse_duration,
};
pub use validation::{ValidationResult, Validator};
