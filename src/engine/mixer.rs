//! In-process mixing graph model.
//!
//! Each catalog sound becomes a voice with a play state, a gain and a pan.
//! Fades are stored as linear ramps and resolved lazily against the tokio
//! clock, so a paused test clock drives them deterministically.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::catalog::{SoundCatalog, SoundId};
use crate::error::EngineError;

use super::{Result, SoundEngine};

/// Gain of a sound at zero distance.
const BASE_GAIN: f32 = 0.3;

/// Point-in-time view of one voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceSnapshot {
    /// Whether the voice is playing
    pub playing: bool,
    /// Current gain, including any fade in progress
    pub gain: f32,
    /// Current stereo pan
    pub pan: f32,
    /// Whether a fade is in progress
    pub fading: bool,
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
    /// Fade-out: stop the voice and restore `restore` when done
    stop_then_restore: Option<f32>,
}

impl Ramp {
    fn level_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        (self.to - self.from).mul_add(t, self.from)
    }

    fn is_done(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.duration
    }
}

#[derive(Debug, Clone)]
struct Voice {
    playing: bool,
    gain: f32,
    pan: f32,
    ramp: Option<Ramp>,
}

impl Voice {
    /// Applies a finished ramp.
    fn settle(&mut self, now: Instant) {
        let Some(ramp) = self.ramp else { return };
        if !ramp.is_done(now) {
            return;
        }
        self.ramp = None;
        match ramp.stop_then_restore {
            Some(restore) => {
                self.playing = false;
                self.gain = restore;
            }
            None => self.gain = ramp.to,
        }
    }

    fn level(&self, now: Instant) -> f32 {
        self.ramp.map_or(self.gain, |r| r.level_at(now))
    }
}

#[derive(Debug)]
struct MixerState {
    initialized: bool,
    suspended: bool,
    blocked: Option<String>,
    voices: BTreeMap<SoundId, Voice>,
    rng: StdRng,
}

impl MixerState {
    /// Settles and returns a voice, logging unknown ids.
    fn voice(&mut self, id: &SoundId, op: &str) -> Option<&mut Voice> {
        let voice = self.voices.get_mut(id);
        if voice.is_none() {
            warn!(sound = %id, op, "sound not found; ignoring");
        }
        let voice = voice?;
        voice.settle(Instant::now());
        Some(voice)
    }
}

/// Software sound engine holding one voice per catalog sound.
///
/// Base gain of a voice is `0.3 * (1 - distance)`; initial pan is the
/// catalog pan.
#[derive(Debug)]
pub struct VirtualMixer {
    state: Mutex<MixerState>,
}

impl VirtualMixer {
    /// Creates an uninitialized mixer with an OS-seeded jitter RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Creates an uninitialized mixer with a deterministic jitter RNG.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(MixerState {
                initialized: false,
                suspended: false,
                blocked: None,
                voices: BTreeMap::new(),
                rng,
            }),
        }
    }

    /// Makes subsequent `play_all` calls fail, as a platform without audio
    /// permission would. `None` lifts the block.
    pub fn block_playback(&self, reason: Option<String>) {
        self.lock().blocked = reason;
    }

    /// Marks the output as suspended until [`SoundEngine::resume`].
    pub fn suspend(&self) {
        self.lock().suspended = true;
    }

    /// Returns `true` while the output is suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    /// Returns the state of one voice, or `None` for unknown ids.
    #[must_use]
    pub fn snapshot(&self, id: &SoundId) -> Option<VoiceSnapshot> {
        let mut state = self.lock();
        let now = Instant::now();
        let voice = state.voices.get_mut(id)?;
        voice.settle(now);
        Some(VoiceSnapshot {
            playing: voice.playing,
            gain: voice.level(now),
            pan: voice.pan,
            fading: voice.ramp.is_some(),
        })
    }

    /// Ids of the voices currently playing, in id order.
    #[must_use]
    pub fn playing(&self) -> Vec<SoundId> {
        let mut state = self.lock();
        let now = Instant::now();
        state
            .voices
            .iter_mut()
            .filter_map(|(id, voice)| {
                voice.settle(now);
                voice.playing.then(|| id.clone())
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MixerState> {
        self.state.lock().expect("mixer lock poisoned")
    }
}

impl Default for VirtualMixer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SoundEngine for VirtualMixer {
    async fn initialize(&self, catalog: &SoundCatalog) -> Result<()> {
        let mut state = self.lock();
        if state.initialized {
            return Ok(());
        }
        state.voices = catalog
            .iter()
            .map(|source| {
                let voice = Voice {
                    playing: false,
                    gain: BASE_GAIN * (1.0 - source.position.distance),
                    pan: source.position.pan,
                    ramp: None,
                };
                (source.id.clone(), voice)
            })
            .collect();
        state.initialized = true;
        debug!(voices = state.voices.len(), "mixer initialized");
        Ok(())
    }

    async fn play_all(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.initialized {
            return Err(EngineError::NotInitialized);
        }
        if let Some(reason) = &state.blocked {
            return Err(EngineError::PlaybackBlocked(reason.clone()));
        }
        let now = Instant::now();
        for voice in state.voices.values_mut() {
            voice.settle(now);
            voice.playing = true;
        }
        Ok(())
    }

    fn stop_all(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        for voice in state.voices.values_mut() {
            voice.settle(now);
            if let Some(ramp) = voice.ramp.take() {
                voice.gain = ramp.stop_then_restore.unwrap_or(ramp.to);
            }
            voice.playing = false;
        }
    }

    fn play(&self, id: &SoundId) {
        if let Some(voice) = self.lock().voice(id, "play") {
            voice.playing = true;
        }
    }

    fn stop(&self, id: &SoundId) {
        if let Some(voice) = self.lock().voice(id, "stop") {
            if let Some(ramp) = voice.ramp.take() {
                voice.gain = ramp.stop_then_restore.unwrap_or(ramp.to);
            }
            voice.playing = false;
        }
    }

    fn fade_in(&self, id: &SoundId, duration: Duration) {
        if let Some(voice) = self.lock().voice(id, "fade_in") {
            let now = Instant::now();
            let target = match voice.ramp.take() {
                Some(ramp) => ramp.stop_then_restore.unwrap_or(ramp.to),
                None => voice.gain,
            };
            voice.gain = target;
            voice.playing = true;
            voice.ramp = Some(Ramp {
                from: 0.0,
                to: target,
                start: now,
                duration,
                stop_then_restore: None,
            });
        }
    }

    fn fade_out(&self, id: &SoundId, duration: Duration) {
        if let Some(voice) = self.lock().voice(id, "fade_out") {
            if !voice.playing {
                return;
            }
            let now = Instant::now();
            let current = voice.level(now);
            let restore = match voice.ramp.take() {
                Some(ramp) => ramp.stop_then_restore.unwrap_or(ramp.to),
                None => voice.gain,
            };
            voice.ramp = Some(Ramp {
                from: current,
                to: 0.0,
                start: now,
                duration,
                stop_then_restore: Some(restore),
            });
        }
    }

    fn set_volume(&self, id: &SoundId, volume: f32) {
        if let Some(voice) = self.lock().voice(id, "set_volume") {
            voice.ramp = None;
            voice.gain = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        }
    }

    fn add_position_variation(&self, id: &SoundId, amount: f32) {
        let mut state = self.lock();
        let amount = amount.abs();
        if !amount.is_finite() || amount == 0.0 {
            return;
        }
        let variation = state.rng.random_range(-amount..=amount);
        if let Some(voice) = state.voice(id, "add_position_variation") {
            voice.pan = (voice.pan + variation).clamp(-1.0, 1.0);
        }
    }

    async fn resume(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.initialized {
            return Err(EngineError::NotInitialized);
        }
        state.suspended = false;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.lock().initialized
    }

    async fn dispose(&self) {
        let mut state = self.lock();
        state.voices.clear();
        state.initialized = false;
        state.suspended = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SoundId {
        SoundId::new(s)
    }

    async fn ready_mixer() -> VirtualMixer {
        let mixer = VirtualMixer::with_seed(1);
        mixer.initialize(&SoundCatalog::reference()).await.unwrap();
        mixer
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[tokio::test]
    async fn test_play_all_before_initialize_fails() {
        let mixer = VirtualMixer::with_seed(0);
        assert!(!mixer.is_ready());
        assert!(matches!(mixer.play_all().await, Err(EngineError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_initialize_sets_gain_and_pan_from_catalog() {
        let mixer = ready_mixer().await;
        assert!(mixer.is_ready());

        let clock = mixer.snapshot(&id("clock-tick")).unwrap();
        assert!(!clock.playing);
        assert!(approx(clock.gain, 0.3 * 0.6));
        assert!(approx(clock.pan, -0.6));

        let breath = mixer.snapshot(&id("breath")).unwrap();
        assert!(approx(breath.gain, 0.3));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let mixer = ready_mixer().await;
        mixer.set_volume(&id("breath"), 0.9);
        mixer.initialize(&SoundCatalog::reference()).await.unwrap();
        assert!(approx(mixer.snapshot(&id("breath")).unwrap().gain, 0.9));
    }

    #[tokio::test]
    async fn test_play_all_and_stop_all() {
        let mixer = ready_mixer().await;
        mixer.play_all().await.unwrap();
        assert_eq!(mixer.playing().len(), 9);
        mixer.stop_all();
        assert!(mixer.playing().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_playback() {
        let mixer = ready_mixer().await;
        mixer.block_playback(Some("autoplay denied".to_string()));
        let err = mixer.play_all().await.unwrap_err();
        assert!(matches!(err, EngineError::PlaybackBlocked(ref r) if r == "autoplay denied"));
        assert!(mixer.playing().is_empty());

        mixer.block_playback(None);
        assert!(mixer.play_all().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop() {
        let mixer = ready_mixer().await;
        mixer.play(&id("gong"));
        mixer.fade_out(&id("gong"), Duration::from_secs(1));
        mixer.set_volume(&id("gong"), 1.0);
        mixer.add_position_variation(&id("gong"), 0.5);
        assert!(mixer.snapshot(&id("gong")).is_none());
        assert!(mixer.playing().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_ramps_linearly() {
        let mixer = ready_mixer().await;
        let breath = id("breath");
        mixer.fade_in(&breath, Duration::from_secs(2));

        let start = mixer.snapshot(&breath).unwrap();
        assert!(start.playing);
        assert!(start.fading);
        assert!(approx(start.gain, 0.0));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(approx(mixer.snapshot(&breath).unwrap().gain, 0.15));

        tokio::time::advance(Duration::from_secs(1)).await;
        let done = mixer.snapshot(&breath).unwrap();
        assert!(!done.fading);
        assert!(approx(done.gain, 0.3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_stops_and_restores_gain() {
        let mixer = ready_mixer().await;
        let breath = id("breath");
        mixer.play(&breath);
        mixer.fade_out(&breath, Duration::from_millis(1000));

        tokio::time::advance(Duration::from_millis(500)).await;
        let mid = mixer.snapshot(&breath).unwrap();
        assert!(mid.playing);
        assert!(approx(mid.gain, 0.15));

        tokio::time::advance(Duration::from_millis(500)).await;
        let done = mixer.snapshot(&breath).unwrap();
        assert!(!done.playing);
        assert!(approx(done.gain, 0.3));
    }

    #[tokio::test]
    async fn test_fade_out_of_stopped_voice_is_noop() {
        let mixer = ready_mixer().await;
        mixer.fade_out(&id("breath"), Duration::from_secs(1));
        assert!(!mixer.snapshot(&id("breath")).unwrap().fading);
    }

    #[tokio::test]
    async fn test_set_volume_clamps() {
        let mixer = ready_mixer().await;
        mixer.set_volume(&id("breath"), 4.0);
        assert!(approx(mixer.snapshot(&id("breath")).unwrap().gain, 1.0));
        mixer.set_volume(&id("breath"), -1.0);
        assert!(approx(mixer.snapshot(&id("breath")).unwrap().gain, 0.0));
    }

    #[tokio::test]
    async fn test_position_variation_stays_in_range() {
        let mixer = ready_mixer().await;
        let birds = id("bird-distant");
        let before = mixer.snapshot(&birds).unwrap().pan;
        mixer.add_position_variation(&birds, 0.15);
        let after = mixer.snapshot(&birds).unwrap().pan;
        assert!((after - before).abs() <= 0.15 + 1e-6);

        for _ in 0..200 {
            mixer.add_position_variation(&birds, 0.9);
            let pan = mixer.snapshot(&birds).unwrap().pan;
            assert!((-1.0..=1.0).contains(&pan));
        }
    }

    #[tokio::test]
    async fn test_resume_and_dispose() {
        let mixer = VirtualMixer::with_seed(0);
        assert!(matches!(mixer.resume().await, Err(EngineError::NotInitialized)));

        mixer.initialize(&SoundCatalog::reference()).await.unwrap();
        mixer.suspend();
        assert!(mixer.is_suspended());
        mixer.resume().await.unwrap();
        assert!(!mixer.is_suspended());

        mixer.dispose().await;
        mixer.dispose().await;
        assert!(!mixer.is_ready());
        assert!(mixer.snapshot(&id("breath")).is_none());
        assert!(matches!(mixer.play_all().await, Err(EngineError::NotInitialized)));
    }
}
