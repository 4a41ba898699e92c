//! `rate` command handlers
//!
//! A session record opens with the pre-session rating and closes with the
//! post-session rating.

use tracing::warn;

use crate::cli::args::RateArgs;
use crate::error::{AttuneError, StoreError};
use crate::report::{ResultsReport, format_rating, rating_label};
use crate::store::{JsonSessionStore, SelfRating};

/// Record a pre-session rating as a new current session.
///
/// An unfinished session that was still current is left in the store,
/// incomplete.
///
/// # Errors
///
/// Returns a store error if the rating is out of range or the store cannot
/// be written.
pub fn pre(args: &RateArgs) -> Result<(), AttuneError> {
    let rating = SelfRating::new(args.value)?;
    let store = JsonSessionStore::new(&args.store);

    if let Some(open) = store.current()? {
        warn!(id = %open.id, "previous session was never rated afterwards");
    }

    let record = store.create_session(rating)?;
    println!(
        "Session {} opened. Before: {} ({})",
        record.id,
        format_rating(rating),
        rating_label(rating)
    );
    Ok(())
}

/// Record a post-session rating and complete the current session.
///
/// # Errors
///
/// Returns `StoreError::NoCurrentSession` if no pre-session rating was
/// recorded, or a store error if the rating is out of range or the store
/// cannot be written.
pub fn post(args: &RateArgs) -> Result<(), AttuneError> {
    let rating = SelfRating::new(args.value)?;
    let store = JsonSessionStore::new(&args.store);

    let open = store.current()?.ok_or(StoreError::NoCurrentSession)?;
    let record = store.complete_session(&open.id, rating)?;

    print!("{}", ResultsReport::new(&record, store.stats()?));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: i64, dir: &tempfile::TempDir) -> RateArgs {
        RateArgs {
            value,
            store: dir.path().join("sessions.json"),
        }
    }

    #[test]
    fn pre_then_post_completes_session() {
        let dir = tempfile::tempdir().unwrap();
        pre(&args(-2, &dir)).unwrap();
        post(&args(1, &dir)).unwrap();

        let store = JsonSessionStore::new(dir.path().join("sessions.json"));
        let latest = store.latest().unwrap().unwrap();
        assert!(latest.completed);
        assert_eq!(latest.rating_change(), Some(3));
        assert!(store.current().unwrap().is_none());
    }

    #[test]
    fn post_without_pre_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = post(&args(1, &dir)).unwrap_err();
        assert!(matches!(
            err,
            AttuneError::Store(StoreError::NoCurrentSession)
        ));
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = pre(&args(4, &dir)).unwrap_err();
        assert!(matches!(err, AttuneError::Store(StoreError::InvalidRating(4))));
        assert!(!dir.path().join("sessions.json").exists());
    }
}
