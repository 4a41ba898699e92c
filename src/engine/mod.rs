//! Sound engine abstraction
//!
//! Provides the [`SoundEngine`] trait the session scheduler drives, and
//! [`VirtualMixer`], a software model of a mixing graph (one gain and one
//! stereo panner per sound) used by the CLI and in tests.
//!
//! Per-sound commands never fail: an unknown id is logged and ignored.
//! Only operations that make playback impossible return [`EngineError`].

pub mod mixer;

pub use mixer::{VirtualMixer, VoiceSnapshot};

use std::time::Duration;

use crate::catalog::{SoundCatalog, SoundId};
use crate::error::EngineError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Default fade length.
pub const DEFAULT_FADE: Duration = Duration::from_millis(1000);

/// Playback capability required by the session scheduler.
///
/// Implementations use `&self` with interior mutability so one engine can be
/// shared between the scheduler and its driver task.
#[async_trait::async_trait]
pub trait SoundEngine: Send + Sync {
    /// Prepares every sound in the catalog. Calling it again on a ready
    /// engine is a no-op.
    async fn initialize(&self, catalog: &SoundCatalog) -> Result<()>;

    /// Starts every prepared sound.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotInitialized` before [`initialize`](Self::initialize),
    /// or `EngineError::PlaybackBlocked` when the platform refuses playback.
    async fn play_all(&self) -> Result<()>;

    /// Stops every sound and rewinds it.
    fn stop_all(&self);

    /// Starts one sound.
    fn play(&self, id: &SoundId);

    /// Stops one sound and rewinds it.
    fn stop(&self, id: &SoundId);

    /// Starts one sound from silence, ramping up to its current gain.
    fn fade_in(&self, id: &SoundId, duration: Duration);

    /// Ramps one sound down to silence, then stops it and restores its gain.
    fn fade_out(&self, id: &SoundId, duration: Duration);

    /// Sets the gain of one sound, clamped to `0..=1`.
    fn set_volume(&self, id: &SoundId, volume: f32);

    /// Moves one sound's pan by a random offset in `[-amount, amount]`,
    /// clamped to `[-1, 1]`.
    fn add_position_variation(&self, id: &SoundId, amount: f32);

    /// Re-activates playback after the platform suspended it.
    async fn resume(&self) -> Result<()>;

    /// Returns `true` once initialized and until disposed.
    fn is_ready(&self) -> bool;

    /// Stops everything and releases all sounds. Safe to call repeatedly;
    /// the engine may be initialized again afterwards.
    async fn dispose(&self);
}
