mod common;

use std::sync::Arc;
use std::time::Duration;

use attune::config::ConfigLoader;
use attune::observability::{EventLog, LogEntry};
use attune::session::SessionScheduler;

use common::{RecordingEngine, fixture_path};

#[tokio::test(start_paused = true)]
async fn session_events_are_logged_as_sequenced_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let loaded = ConfigLoader::with_defaults()
        .load(&fixture_path("short_protocol.yaml"))
        .unwrap();
    let scheduler = SessionScheduler::new(
        loaded.protocol,
        Arc::new(loaded.catalog),
        Arc::new(RecordingEngine::new()),
    )
    .unwrap()
    .with_seed(9);

    let log = Arc::new(EventLog::from_file(&path).unwrap());
    log.write(LogEntry::SessionStarted {
        session_id: None,
        seed: Some(9),
        total_duration_ms: 40_000,
    });
    let sink = Arc::clone(&log);
    scheduler.on_event(move |event| sink.emit(event));

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(40_001)).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).expect("each line is JSON"))
        .collect();

    assert_eq!(lines[0]["record"], "session_started");
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["sequence"], i as u64);
    }

    let kinds: Vec<&str> = lines[1..]
        .iter()
        .map(|l| l["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.first(), Some(&"phase-start"));
    assert_eq!(kinds.last(), Some(&"session-complete"));
    assert_eq!(kinds.iter().filter(|k| **k == "switch-sound").count(), 4);
    assert_eq!(log.entry_count(), lines.len() as u64);
}
