//! Session scheduler.
//!
//! Runs one session at a time against a validated [`Protocol`]:
//!
//! ```text
//! idle ─start()─▶ starting ─▶ running(selective) ─▶ running(switching)
//!                    │                 ─▶ running(divided) ─▶ completed
//!                    └── play_all() fails ─▶ idle
//! running(*) ─stop()─▶ stopped
//! ```
//!
//! All timed work of a session lives in one [`TimerSet`] drained by one
//! driver task. The driver fires due actions under the state lock and
//! queues their events; listeners are called after the lock is released,
//! inside a delivery section that `stop()` waits for. No event is
//! delivered once `stop()` has returned, and a listener may call back into
//! the scheduler.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{SoundCatalog, SoundId};
use crate::engine::SoundEngine;
use crate::error::{ConfigError, EngineError};
use crate::observability::metrics::{self, SessionOutcome};
use crate::protocol::{Phase, Protocol, SwitchingCue};

use super::events::{EventPayload, SessionEvent, as_millis};
use super::timers::TimerSet;

/// Event listener callback.
///
/// Listeners run on the driver task with the session state unlocked, so a
/// listener may query or stop the scheduler.
pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Stream of session events for async consumers.
pub type EventStream = UnboundedReceiverStream<SessionEvent>;

/// Handle returned by [`SessionScheduler::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "phase", rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session has run yet
    Idle,
    /// `start()` is waiting for the engine
    Starting,
    /// A session is in the given phase
    Running(Phase),
    /// The last session ran to the end
    Completed,
    /// The last session was stopped early
    Stopped,
}

impl SessionStatus {
    /// Returns `true` for `Starting` and `Running`.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running(_))
    }
}

/// What a call to [`SessionScheduler::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The selective phase was entered
    Started,
    /// A session was already starting or running; nothing changed
    AlreadyActive,
    /// `stop()` ran while the engine was starting; no phase was entered
    Cancelled,
}

impl StartOutcome {
    /// Returns `true` if this call began a session.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Starting => f.write_str("starting"),
            Self::Running(phase) => write!(f, "running({phase})"),
            Self::Completed => f.write_str("completed"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Instruction { phase: Phase, index: usize },
    Cue(usize),
    PhaseEnd(Phase),
    Jitter,
}

/// Everything owned by one running session.
struct Run {
    generation: u64,
    started_at: Instant,
    phase_started_at: Instant,
    target: Option<SoundId>,
    cues: Vec<SwitchingCue>,
    timers: TimerSet<Action>,
    cancel: CancellationToken,
}

impl Run {
    fn timestamp(&self, due: Instant) -> u64 {
        as_millis(due.saturating_duration_since(self.started_at))
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        self.timers.clear();
        self.cancel.cancel();
    }
}

struct SessionState {
    status: SessionStatus,
    generation: u64,
    stops: u64,
    outbox: Vec<SessionEvent>,
    rng: StdRng,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    run: Option<Run>,
}

impl SessionState {
    /// Queues `event` for delivery once the state lock is released.
    fn emit(&mut self, event: SessionEvent) {
        debug!(
            kind = %event.kind,
            phase = %event.phase,
            timestamp_ms = event.timestamp_ms,
            "session event"
        );
        metrics::record_event(event.kind);
        self.outbox.push(event);
    }
}

/// Serializes listener calls against `stop()`.
///
/// The thread inside a delivery section is recorded so that a listener
/// calling `stop()` does not wait on its own section.
#[derive(Default)]
struct Delivery {
    section: Mutex<()>,
    owner: Mutex<Option<ThreadId>>,
}

struct DeliveryGuard<'a> {
    delivery: &'a Delivery,
    _section: MutexGuard<'a, ()>,
}

impl Delivery {
    fn owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().expect("delivery owner lock poisoned")
    }

    /// Enters the delivery section.
    fn enter(&self) -> DeliveryGuard<'_> {
        let section = self.section.lock().expect("delivery lock poisoned");
        *self.owner() = Some(thread::current().id());
        DeliveryGuard {
            delivery: self,
            _section: section,
        }
    }

    /// Waits for any delivery in progress on another thread. Returns `None`
    /// when called from inside a listener.
    fn wait(&self) -> Option<MutexGuard<'_, ()>> {
        if *self.owner() == Some(thread::current().id()) {
            return None;
        }
        Some(self.section.lock().expect("delivery lock poisoned"))
    }
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        *self.delivery.owner() = None;
    }
}

struct Inner {
    protocol: Protocol,
    catalog: Arc<SoundCatalog>,
    engine: Arc<dyn SoundEngine>,
    state: Mutex<SessionState>,
    delivery: Delivery,
}

/// Drives one session at a time through the three protocol phases.
pub struct SessionScheduler {
    inner: Arc<Inner>,
}

impl SessionScheduler {
    /// Creates an idle scheduler.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the protocol does not
    /// validate against the catalog.
    pub fn new(
        protocol: Protocol,
        catalog: Arc<SoundCatalog>,
        engine: Arc<dyn SoundEngine>,
    ) -> Result<Self, ConfigError> {
        protocol.validate(&catalog)?;
        Ok(Self {
            inner: Arc::new(Inner {
                protocol,
                catalog,
                engine,
                state: Mutex::new(SessionState {
                    status: SessionStatus::Idle,
                    generation: 0,
                    stops: 0,
                    outbox: Vec::new(),
                    rng: StdRng::from_os_rng(),
                    listeners: Vec::new(),
                    next_listener: 0,
                    run: None,
                }),
                delivery: Delivery::default(),
            }),
        })
    }

    /// Seeds the RNG used to generate switching cues.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        self.inner.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The protocol this scheduler runs.
    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.inner.protocol
    }

    /// The catalog this scheduler plays.
    #[must_use]
    pub fn catalog(&self) -> &Arc<SoundCatalog> {
        &self.inner.catalog
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts a session.
    ///
    /// Awaits `play_all()` on the engine, then schedules position jitter and
    /// enters the selective phase, delivering its `phase-start` before
    /// returning [`StartOutcome::Started`]. A call while a session is
    /// starting or running logs a warning and returns
    /// [`StartOutcome::AlreadyActive`]. If `stop()` runs while the engine is
    /// starting, no phase is entered and the result is
    /// [`StartOutcome::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns the engine error if playback cannot start. The scheduler is
    /// then idle with nothing scheduled. A refusal that arrives after
    /// `stop()` is only logged.
    pub async fn start(&self) -> Result<StartOutcome, EngineError> {
        let generation = {
            let mut state = self.inner.lock();
            if state.status.is_active() {
                warn!(status = %state.status, "session already running; ignoring start");
                return Ok(StartOutcome::AlreadyActive);
            }
            state.status = SessionStatus::Starting;
            state.generation += 1;
            state.generation
        };

        let played = self.inner.engine.play_all().await;

        let delivery = self.inner.delivery.enter();
        let mut state = self.inner.lock();
        if state.generation != generation {
            // stop() ran while the engine was starting. Silence what this
            // call started unless a newer session owns the engine by now.
            if !state.status.is_active() {
                self.inner.engine.stop_all();
            }
            drop(state);
            if let Err(e) = played {
                debug!(error = %e, "engine refused playback after stop");
            }
            debug!("session stopped during start");
            return Ok(StartOutcome::Cancelled);
        }

        if let Err(e) = played {
            state.status = SessionStatus::Idle;
            drop(state);
            warn!(error = %e, "sound engine refused playback");
            metrics::record_session(SessionOutcome::Failed, Duration::ZERO);
            return Err(e);
        }

        let now = Instant::now();
        let cancel = CancellationToken::new();
        let mut run = Run {
            generation,
            started_at: now,
            phase_started_at: now,
            target: None,
            cues: Vec::new(),
            timers: TimerSet::new(),
            cancel: cancel.clone(),
        };
        run.timers
            .schedule(now + self.inner.protocol.jitter.interval, Action::Jitter);
        state.run = Some(run);

        info!(
            total_ms = as_millis(self.inner.protocol.total_duration()),
            "session started"
        );
        self.inner.enter_phase(&mut state, Phase::Selective, now);
        self.inner.deliver(state);
        drop(delivery);

        tokio::spawn(drive(Arc::clone(&self.inner), generation, cancel));
        Ok(StartOutcome::Started)
    }

    /// Stops the running session.
    ///
    /// Cancels every pending instruction, cue, phase end and jitter action
    /// without firing it, and stops all sounds. Waits for listeners that are
    /// being called on another thread. Does nothing when no session is
    /// starting or running.
    pub fn stop(&self) {
        let _delivery = self.inner.delivery.wait();
        let mut state = self.inner.lock();
        if !state.status.is_active() {
            debug!(status = %state.status, "nothing to stop");
            return;
        }
        let ran_for = state
            .run
            .as_ref()
            .map_or(Duration::ZERO, |run| run.started_at.elapsed());
        state.generation += 1;
        state.stops += 1;
        state.outbox.clear();
        state.run = None;
        state.status = SessionStatus::Stopped;
        drop(state);

        self.inner.engine.stop_all();
        metrics::set_current_phase(None);
        metrics::record_session(SessionOutcome::Stopped, ran_for);
        info!(elapsed_ms = as_millis(ran_for), "session stopped");
    }

    /// Stops the session and disposes the engine.
    pub async fn teardown(&self) {
        self.stop();
        self.inner.engine.dispose().await;
    }

    /// Asks the engine to resume suspended playback.
    ///
    /// # Errors
    ///
    /// Returns the engine error. The session timeline is unaffected.
    pub async fn resume_audio(&self) -> Result<(), EngineError> {
        self.inner.engine.resume().await.inspect_err(|e| {
            warn!(error = %e, "failed to resume audio");
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Time since the session started; zero when not running.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner
            .lock()
            .run
            .as_ref()
            .map_or(Duration::ZERO, |run| run.started_at.elapsed())
    }

    /// Time since the current phase started; zero when not running.
    #[must_use]
    pub fn phase_elapsed(&self) -> Duration {
        self.inner
            .lock()
            .run
            .as_ref()
            .map_or(Duration::ZERO, |run| run.phase_started_at.elapsed())
    }

    /// The running phase, if any.
    #[must_use]
    pub fn current_phase(&self) -> Option<Phase> {
        match self.inner.lock().status {
            SessionStatus::Running(phase) => Some(phase),
            _ => None,
        }
    }

    /// The sound the listener should currently attend to: the locked target
    /// during selective, the latest cue's sound during switching.
    #[must_use]
    pub fn current_target(&self) -> Option<SoundId> {
        self.inner
            .lock()
            .run
            .as_ref()
            .and_then(|run| run.target.clone())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status
    }

    /// Returns `true` while a phase is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.inner.lock().status, SessionStatus::Running(_))
    }

    /// Number of actions still scheduled.
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.inner
            .lock()
            .run
            .as_ref()
            .map_or(0, |run| run.timers.len())
    }

    // ========================================================================
    // Event delivery
    // ========================================================================

    /// Registers a listener. Listeners are called in registration order.
    pub fn on_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.inner.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }

    /// Returns a stream receiving every event from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.on_event(move |event| {
            // a dropped receiver just stops listening
            let _ = tx.send(event.clone());
        });
        UnboundedReceiverStream::new(rx)
    }
}

impl Drop for SessionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SessionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("SessionScheduler")
            .field("status", &state.status)
            .field("listeners", &state.listeners.len())
            .field("pending", &state.run.as_ref().map_or(0, |r| r.timers.len()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Sleeps until the next due action and fires everything due, until the
/// session ends or is cancelled.
async fn drive(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    loop {
        let next = {
            let state = inner.lock();
            match &state.run {
                Some(run) if run.generation == generation => run.timers.next_due(),
                _ => None,
            }
        };
        let Some(due) = next else { break };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(due) => {}
        }

        inner.fire_due(generation);
    }
    debug!(generation, "session driver exited");
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }

    /// Fires every action due by now, in `(due, registration)` order, then
    /// delivers the resulting events.
    fn fire_due(&self, generation: u64) {
        let _delivery = self.delivery.enter();
        let mut guard = self.lock();
        let state = &mut *guard;
        let now = Instant::now();
        loop {
            let Some(run) = state.run.as_mut().filter(|r| r.generation == generation) else {
                break;
            };
            let Some((due, action)) = run.timers.pop_due(now) else {
                break;
            };
            self.fire(state, due, action);
        }
        self.deliver(guard);
    }

    /// Releases the state lock and calls every listener for the queued
    /// events. Delivery ends as soon as `stop()` runs, including from a
    /// listener.
    fn deliver(&self, mut state: MutexGuard<'_, SessionState>) {
        let events = std::mem::take(&mut state.outbox);
        if events.is_empty() {
            return;
        }
        let listeners: Vec<Listener> = state
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let stops = state.stops;
        drop(state);

        for event in &events {
            for listener in &listeners {
                if self.lock().stops != stops {
                    return;
                }
                listener(event);
            }
        }
    }

    fn fire(&self, state: &mut SessionState, due: Instant, action: Action) {
        let Some(run) = state.run.as_mut() else { return };
        let timestamp_ms = run.timestamp(due);

        match action {
            Action::Instruction { phase, index } => {
                let instruction = &self.protocol.phase_config(phase).instructions[index];
                state.emit(SessionEvent::new(
                    phase,
                    EventPayload::Instruction {
                        text: instruction.text.clone(),
                        display_ms: as_millis(instruction.display_for),
                    },
                    timestamp_ms,
                ));
            }
            Action::Cue(index) => {
                let total = run.cues.len();
                let cue = &run.cues[index];
                let Some(source) = self.catalog.get(&cue.target) else {
                    warn!(sound = %cue.target, index, "cue targets unknown sound; skipping");
                    return;
                };
                let event = SessionEvent::new(
                    Phase::Switching,
                    EventPayload::SwitchSound {
                        sound_id: source.id.clone(),
                        sound_name: source.name.clone(),
                        interval_ms: as_millis(cue.interval),
                        index,
                        total,
                    },
                    timestamp_ms,
                );
                run.target = Some(source.id.clone());
                state.emit(event);
            }
            Action::PhaseEnd(phase) => {
                state.emit(SessionEvent::new(
                    phase,
                    EventPayload::PhaseEnd {
                        phase_name: phase.display_name().to_string(),
                    },
                    timestamp_ms,
                ));
                match phase.next() {
                    Some(next) => self.enter_phase(state, next, due),
                    None => self.complete(state, timestamp_ms),
                }
            }
            Action::Jitter => {
                let amount = self.protocol.jitter.amount;
                for id in self.catalog.ids() {
                    self.engine.add_position_variation(id, amount);
                }
                run.timers
                    .schedule(due + self.protocol.jitter.interval, Action::Jitter);
            }
        }
    }

    /// Enters `phase` anchored at `anchor`: emits `phase-start` and schedules
    /// the phase's instructions, cues and end.
    fn enter_phase(&self, state: &mut SessionState, phase: Phase, anchor: Instant) {
        let SessionState {
            status, rng, run, ..
        } = &mut *state;
        let Some(run) = run.as_mut() else { return };

        let config = self.protocol.phase_config(phase);
        run.phase_started_at = anchor;
        run.target = match phase {
            Phase::Selective => Some(self.protocol.selective_target().clone()),
            Phase::Switching | Phase::Divided => None,
        };
        *status = SessionStatus::Running(phase);

        for (index, instruction) in config.instructions.iter().enumerate() {
            run.timers
                .schedule(anchor + instruction.offset, Action::Instruction { phase, index });
        }

        if phase == Phase::Switching {
            run.cues = self.protocol.generate_switching_cues(&self.catalog, rng);
            for (index, cue) in run.cues.iter().enumerate() {
                run.timers.schedule(anchor + cue.offset, Action::Cue(index));
            }
        } else {
            run.cues.clear();
        }

        run.timers
            .schedule(anchor + config.duration, Action::PhaseEnd(phase));

        let event = SessionEvent::new(
            phase,
            EventPayload::PhaseStart {
                phase_name: phase.display_name().to_string(),
                duration_ms: as_millis(config.duration),
                target_sound: run.target.clone(),
            },
            run.timestamp(anchor),
        );
        info!(phase = %phase, duration_ms = as_millis(config.duration), "phase started");
        metrics::set_current_phase(Some(phase));
        state.emit(event);
    }

    /// Ends a session that reached the end of its last phase.
    fn complete(&self, state: &mut SessionState, timestamp_ms: u64) {
        state.emit(SessionEvent::new(
            Phase::Divided,
            EventPayload::SessionComplete {
                total_duration_ms: as_millis(self.protocol.total_duration()),
            },
            timestamp_ms,
        ));

        state.generation += 1;
        state.run = None;
        state.status = SessionStatus::Completed;
        self.engine.stop_all();
        metrics::set_current_phase(None);
        metrics::record_session(
            SessionOutcome::Completed,
            Duration::from_millis(timestamp_ms),
        );
        info!(timestamp_ms, "session complete");
    }
}
