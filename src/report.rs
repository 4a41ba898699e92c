//! Display formatting for session progress and results.

use std::time::Duration;

use serde::Serialize;

use crate::store::{SelfRating, SessionRecord, SessionStats};

/// Formats a duration as `M:SS`, truncating to whole seconds.
#[must_use]
pub fn format_clock(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Formats a rating with an explicit sign for positive values.
#[must_use]
pub fn format_rating(rating: SelfRating) -> String {
    let value = rating.value();
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

/// Describes a rating in words.
#[must_use]
pub const fn rating_label(rating: SelfRating) -> &'static str {
    match rating.value() {
        ..=-3 => "Extremely Self-Focused",
        -2 => "Very Self-Focused",
        -1 => "Somewhat Self-Focused",
        0 => "Balanced",
        1 => "Somewhat Externally Focused",
        2 => "Very Externally Focused",
        3.. => "Extremely Externally Focused",
    }
}

/// Difference between two ratings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingChange {
    /// `post - pre`
    pub change: i8,
    /// Human description, e.g. "Improved by 3 points"
    pub text: String,
}

/// Compares a pre- and post-session rating.
#[must_use]
pub fn rating_change(pre: SelfRating, post: SelfRating) -> RatingChange {
    let change = post.value() - pre.value();
    let points = |n: i8| if n == 1 { "point" } else { "points" };
    let text = match change {
        0 => "No change".to_string(),
        c if c > 0 => format!("Improved by {c} {}", points(c)),
        c => format!("Decreased by {} {}", -c, points(-c)),
    };
    RatingChange { change, text }
}

/// Progress through a session as a percentage in `[0, 100]`.
#[must_use]
pub fn progress_percent(elapsed: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 100.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64() * 100.0).clamp(0.0, 100.0)
}

/// Results view of one session plus aggregate statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsReport {
    /// Session id
    pub id: String,
    /// Pre rating
    pub pre: SelfRating,
    /// Post rating, for completed sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<SelfRating>,
    /// Rating change, for completed sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<RatingChange>,
    /// Session length as `M:SS`, for completed sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Statistics over every completed session
    pub stats: SessionStats,
}

impl ResultsReport {
    /// Builds the report for `record`.
    #[must_use]
    pub fn new(record: &SessionRecord, stats: SessionStats) -> Self {
        let pre = record.pre_rating.value;
        let post = record.post_rating.map(|p| p.value);
        Self {
            id: record.id.clone(),
            pre,
            post,
            change: post.map(|post| rating_change(pre, post)),
            duration: record
                .duration()
                .and_then(|d| d.to_std().ok())
                .map(format_clock),
            stats,
        }
    }
}

impl std::fmt::Display for ResultsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Session {}", self.id)?;
        writeln!(
            f,
            "  Before:  {} ({})",
            format_rating(self.pre),
            rating_label(self.pre)
        )?;
        match self.post {
            Some(post) => writeln!(f, "  After:   {} ({})", format_rating(post), rating_label(post))?,
            None => writeln!(f, "  After:   not rated yet")?,
        }
        if let Some(change) = &self.change {
            writeln!(f, "  Change:  {}", change.text)?;
        }
        if let Some(duration) = &self.duration {
            writeln!(f, "  Length:  {duration}")?;
        }

        let stats = &self.stats;
        if stats.total_sessions > 0 {
            writeln!(f)?;
            writeln!(f, "Completed sessions: {}", stats.total_sessions)?;
            writeln!(f, "  Average before: {:+.1}", stats.average_pre)?;
            writeln!(f, "  Average after:  {:+.1}", stats.average_post)?;
            writeln!(f, "  Average change: {:+.1}", stats.average_change)?;
            writeln!(f, "  Improved in:    {}%", stats.improvement_rate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(v: i64) -> SelfRating {
        SelfRating::new(v).unwrap()
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::ZERO), "0:00");
        assert_eq!(format_clock(Duration::from_millis(65_999)), "1:05");
        assert_eq!(format_clock(Duration::from_secs(720)), "12:00");
    }

    #[test]
    fn test_format_rating() {
        assert_eq!(format_rating(rating(2)), "+2");
        assert_eq!(format_rating(rating(0)), "0");
        assert_eq!(format_rating(rating(-3)), "-3");
    }

    #[test]
    fn test_rating_labels() {
        assert_eq!(rating_label(rating(-3)), "Extremely Self-Focused");
        assert_eq!(rating_label(rating(0)), "Balanced");
        assert_eq!(rating_label(rating(1)), "Somewhat Externally Focused");
        assert_eq!(rating_label(rating(3)), "Extremely Externally Focused");
    }

    #[test]
    fn test_rating_change_text() {
        let improved = rating_change(rating(-2), rating(1));
        assert_eq!(improved.change, 3);
        assert_eq!(improved.text, "Improved by 3 points");

        assert_eq!(rating_change(rating(0), rating(1)).text, "Improved by 1 point");
        assert_eq!(rating_change(rating(1), rating(0)).text, "Decreased by 1 point");
        assert_eq!(rating_change(rating(3), rating(-3)).text, "Decreased by 6 points");
        assert_eq!(rating_change(rating(2), rating(2)).text, "No change");
    }

    #[test]
    fn test_progress_percent() {
        let total = Duration::from_secs(720);
        assert!((progress_percent(Duration::from_secs(360), total) - 50.0).abs() < 1e-9);
        assert!((progress_percent(Duration::from_secs(900), total) - 100.0).abs() < 1e-9);
        assert!((progress_percent(Duration::from_secs(1), Duration::ZERO) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_results_report_for_open_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::JsonSessionStore::new(dir.path().join("s.json"));
        let record = store.create_session(rating(-1)).unwrap();
        let report = ResultsReport::new(&record, store.stats().unwrap());
        assert!(report.change.is_none());
        let text = report.to_string();
        assert!(text.contains("-1 (Somewhat Self-Focused)"));
        assert!(text.contains("not rated yet"));
        assert!(!text.contains("Completed sessions"));
    }
}
