//! `run` command handler
//!
//! Plays a full session on the virtual mixer and renders its events to
//! stdout as they fire.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::SoundCatalog;
use crate::cli::args::RunArgs;
use crate::engine::{SoundEngine, VirtualMixer};
use crate::error::AttuneError;
use crate::observability::events::{EventLog, LogEntry, StopReason};
use crate::observability::init_metrics;
use crate::report::{format_clock, progress_percent};
use crate::session::{EventKind, EventPayload, SessionEvent, SessionScheduler};
use crate::store::JsonSessionStore;

use super::load_protocol;

/// Run a training session until it completes or `cancel` fires.
///
/// # Errors
///
/// Returns a config error if the protocol does not load, an I/O error if
/// the event log or metrics endpoint cannot be opened, or an engine error
/// if playback cannot start.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), AttuneError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let loaded = load_protocol(args.config.as_deref())?;
    let catalog = Arc::new(loaded.catalog);

    let mixer = Arc::new(args.seed.map_or_else(VirtualMixer::new, VirtualMixer::with_seed));
    mixer.initialize(&catalog).await?;

    let mut scheduler = SessionScheduler::new(loaded.protocol, Arc::clone(&catalog), mixer)?;
    if let Some(seed) = args.seed {
        scheduler = scheduler.with_seed(seed);
    }

    let log = match args.events_file.as_deref() {
        Some(path) => EventLog::from_file(path)?,
        None => EventLog::noop(),
    };

    let session_id = match &args.store {
        Some(path) => {
            let record = JsonSessionStore::new(path).current()?;
            if record.is_none() {
                warn!(
                    store = %path.display(),
                    "no open session record; rate first with `attune rate pre`"
                );
            }
            record.map(|r| r.id)
        }
        None => None,
    };

    let total = scheduler.protocol().total_duration();
    log.write(LogEntry::SessionStarted {
        session_id: session_id.clone(),
        seed: args.seed,
        total_duration_ms: u64::try_from(total.as_millis()).unwrap_or(u64::MAX),
    });

    let mut events = scheduler.subscribe();
    if let Err(e) = scheduler.start().await {
        log.write(LogEntry::SessionStopped {
            reason: StopReason::EngineFailure,
            elapsed_ms: 0,
        });
        scheduler.teardown().await;
        return Err(e.into());
    }

    println!("Session length {}. Press Ctrl+C to stop.", format_clock(total));

    let completed = loop {
        tokio::select! {
            () = cancel.cancelled() => break false,
            event = events.next() => {
                let Some(event) = event else { break false };
                log.emit(&event);
                render(&event, &catalog, total);
                if event.kind == EventKind::SessionComplete {
                    break true;
                }
            }
        }
    };

    if !completed {
        let elapsed = scheduler.elapsed();
        log.write(LogEntry::SessionStopped {
            reason: StopReason::Interrupted,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        println!("\nSession stopped at {}.", format_clock(elapsed));
    }
    scheduler.teardown().await;

    if completed && let Some(id) = session_id {
        println!("Rate how you feel now with `attune rate post <VALUE>` (session {id}).");
    }
    Ok(())
}

/// Prints one event the way a listener would see it.
fn render(event: &SessionEvent, catalog: &SoundCatalog, session_length: Duration) {
    let elapsed = Duration::from_millis(event.timestamp_ms);
    let at = format_clock(elapsed);
    match &event.payload {
        EventPayload::PhaseStart {
            phase_name,
            duration_ms,
            target_sound,
        } => {
            println!(
                "\n== {phase_name} ({}) ==",
                format_clock(Duration::from_millis(*duration_ms))
            );
            println!("{}", event.phase.description());
            if let Some(source) = target_sound.as_ref().and_then(|id| catalog.get(id)) {
                println!("Focus on: {}", source.name);
            }
        }
        EventPayload::Instruction { text, .. } => println!("[{at}] {text}"),
        EventPayload::SwitchSound {
            sound_name,
            index,
            total,
            ..
        } => println!("[{at}] Switch to {sound_name} ({}/{total})", index + 1),
        EventPayload::PhaseEnd { phase_name } => println!(
            "[{at}] {phase_name} done ({:.0}% of session)",
            progress_percent(elapsed, session_length)
        ),
        EventPayload::SessionComplete { .. } => println!("\nSession complete ({at})."),
    }
}
