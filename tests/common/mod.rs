//! Shared integration-test helpers: a recording sound engine double and a
//! runner for the `attune` binary.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use attune::catalog::{SoundCatalog, SoundId};
use attune::engine::{self, SoundEngine};
use attune::error::EngineError;

/// A command received by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Initialize(usize),
    PlayAll,
    StopAll,
    Play(SoundId),
    Stop(SoundId),
    FadeIn(SoundId, Duration),
    FadeOut(SoundId, Duration),
    SetVolume(SoundId, f32),
    Jitter(SoundId, f32),
    Resume,
    Dispose,
}

/// Sound engine double that records every call.
///
/// `play_all` can be made to fail or to take time, which is how tests
/// reach the scheduler's failure and stop-while-starting paths.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    play_failure: Mutex<Option<String>>,
    play_delay: Option<Duration>,
    queued_delays: Mutex<VecDeque<Duration>>,
    ready: AtomicBool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose `play_all` is refused with `reason`.
    pub fn refusing(reason: &str) -> Self {
        let engine = Self::new();
        engine.refuse_playback(Some(reason));
        engine
    }

    /// An engine whose `play_all` takes `delay` to complete.
    pub fn slow(delay: Duration) -> Self {
        Self {
            play_delay: Some(delay),
            ..Self::default()
        }
    }

    /// An engine whose successive `play_all` calls take `delays` in turn.
    pub fn with_play_delays(delays: &[Duration]) -> Self {
        Self {
            queued_delays: Mutex::new(delays.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn refuse_playback(&self, reason: Option<&str>) {
        *self.play_failure.lock().unwrap() = reason.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn jitter_calls(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Jitter(..)))
    }

    pub fn stop_all_calls(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::StopAll))
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SoundEngine for RecordingEngine {
    async fn initialize(&self, catalog: &SoundCatalog) -> engine::Result<()> {
        self.record(EngineCall::Initialize(catalog.len()));
        if let Some(source) = catalog.iter().find(|s| s.audio_path.is_empty()) {
            return Err(EngineError::LoadFailed {
                id: source.id.to_string(),
                reason: "no audio path".to_string(),
            });
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn play_all(&self) -> engine::Result<()> {
        self.record(EngineCall::PlayAll);
        let queued = self.queued_delays.lock().unwrap().pop_front();
        if let Some(delay) = queued.or(self.play_delay) {
            tokio::time::sleep(delay).await;
        }
        match self.play_failure.lock().unwrap().clone() {
            Some(reason) => Err(EngineError::PlaybackBlocked(reason)),
            None => Ok(()),
        }
    }

    fn stop_all(&self) {
        self.record(EngineCall::StopAll);
    }

    fn play(&self, id: &SoundId) {
        self.record(EngineCall::Play(id.clone()));
    }

    fn stop(&self, id: &SoundId) {
        self.record(EngineCall::Stop(id.clone()));
    }

    fn fade_in(&self, id: &SoundId, duration: Duration) {
        self.record(EngineCall::FadeIn(id.clone(), duration));
    }

    fn fade_out(&self, id: &SoundId, duration: Duration) {
        self.record(EngineCall::FadeOut(id.clone(), duration));
    }

    fn set_volume(&self, id: &SoundId, volume: f32) {
        self.record(EngineCall::SetVolume(id.clone(), volume));
    }

    fn add_position_variation(&self, id: &SoundId, amount: f32) {
        self.record(EngineCall::Jitter(id.clone(), amount));
    }

    async fn resume(&self) -> engine::Result<()> {
        self.record(EngineCall::Resume);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn dispose(&self) {
        self.record(EngineCall::Dispose);
        self.ready.store(false, Ordering::SeqCst);
    }
}

/// Returns the path to a test fixture.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the `attune` binary to completion with `args`.
#[allow(clippy::missing_panics_doc)]
pub fn run_attune(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_attune"))
        .args(args)
        .env_remove("ATTUNE_CONFIG")
        .env_remove("ATTUNE_STORE")
        .env_remove("ATTUNE_LOG_LEVEL")
        .output()
        .expect("failed to run attune")
}
