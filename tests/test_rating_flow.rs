mod common;

use std::sync::Arc;
use std::time::Duration;

use attune::catalog::SoundCatalog;
use attune::protocol::Protocol;
use attune::report::{ResultsReport, rating_change};
use attune::session::{SessionScheduler, SessionStatus};
use attune::store::{JsonSessionStore, SelfRating};

use common::RecordingEngine;

#[tokio::test(start_paused = true)]
async fn pre_rating_session_post_rating() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonSessionStore::new(dir.path().join("sessions.json"));

    let pre = SelfRating::new(-2).unwrap();
    let opened = store.create_session(pre).unwrap();
    assert_eq!(store.current().unwrap().unwrap().id, opened.id);

    let scheduler = SessionScheduler::new(
        Protocol::reference(),
        Arc::new(SoundCatalog::reference()),
        Arc::new(RecordingEngine::new()),
    )
    .unwrap();
    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(720_001)).await;
    assert_eq!(scheduler.status(), SessionStatus::Completed);
    scheduler.teardown().await;

    let post = SelfRating::new(1).unwrap();
    let completed = store.complete_session(&opened.id, post).unwrap();
    assert!(completed.completed);
    assert!(store.current().unwrap().is_none());

    let change = rating_change(pre, post);
    assert_eq!(change.change, 3);
    assert_eq!(change.text, "Improved by 3 points");

    let report = ResultsReport::new(&completed, store.stats().unwrap());
    let text = report.to_string();
    assert!(text.contains("Before:  -2 (Very Self-Focused)"), "{text}");
    assert!(text.contains("After:   +1 (Somewhat Externally Focused)"), "{text}");
    assert!(text.contains("Improved in:    100%"), "{text}");
}
