//! Sound catalog
//!
//! Static registry of the ambient sounds a session plays. The catalog is
//! immutable after construction and is shared read-only between the
//! scheduler, the sound engine and cue generation.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Severity, ValidationIssue};

/// Identifier of a sound in the catalog (e.g. `"clock-tick"`).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(pub String);

impl SoundId {
    /// Creates a new `SoundId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SoundId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Perceived distance class of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    /// Body-like sounds placed at the listener (breath, heartbeat)
    Internal,
    /// Sounds in the same room
    Near,
    /// Sounds outside, far away
    Far,
}

impl std::fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Internal => "internal",
            Self::Near => "near",
            Self::Far => "far",
        };
        f.write_str(name)
    }
}

/// Spatial placement of a sound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialPosition {
    /// Stereo pan: -1 (left) to 1 (right)
    pub pan: f32,
    /// Normalized distance: 0 (close) to 1 (far)
    pub distance: f32,
}

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundSource {
    /// Unique id
    pub id: SoundId,
    /// Display name shown to the listener
    pub name: String,
    /// Where the sound sits in the stereo field
    pub position: SpatialPosition,
    /// Distance class
    pub category: SoundCategory,
    /// Path of the loopable audio asset
    pub audio_path: String,
    /// Short human description
    pub description: String,
}

impl SoundSource {
    fn reference(
        id: &str,
        name: &str,
        pan: f32,
        distance: f32,
        category: SoundCategory,
        description: &str,
    ) -> Self {
        Self {
            id: SoundId::new(id),
            name: name.to_string(),
            position: SpatialPosition { pan, distance },
            category,
            audio_path: format!("sounds/{id}.mp3"),
            description: description.to_string(),
        }
    }
}

/// Immutable, validated collection of sound sources.
///
/// Guaranteed non-empty with unique ids and in-range positions.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundCatalog {
    sources: Vec<SoundSource>,
}

impl SoundCatalog {
    /// Builds a catalog, rejecting empty lists, duplicate ids and
    /// out-of-range positions.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` listing every problem found.
    pub fn new(sources: Vec<SoundSource>) -> Result<Self, ConfigError> {
        let errors = check_sources(&sources, "catalog");
        if !errors.is_empty() {
            return Err(ConfigError::ValidationError {
                source_name: "catalog".to_string(),
                errors,
            });
        }
        Ok(Self { sources })
    }

    /// The reference nine-sound catalog: three internal, three near and
    /// three far sounds spread across the stereo field.
    #[must_use]
    pub fn reference() -> Self {
        use SoundCategory::{Far, Internal, Near};

        Self {
            sources: vec![
                SoundSource::reference("breath", "Breathing", 0.0, 0.0, Internal, "Simulated breathing sound"),
                SoundSource::reference("heartbeat", "Heartbeat", -0.1, 0.1, Internal, "Simulated heartbeat"),
                SoundSource::reference("white-noise", "White Noise", 0.1, 0.15, Internal, "Gentle white noise"),
                SoundSource::reference("clock-tick", "Clock Ticking", -0.6, 0.4, Near, "Clock ticking to the left"),
                SoundSource::reference("water-drip", "Water Dripping", 0.7, 0.45, Near, "Water dripping to the right"),
                SoundSource::reference("fan-hum", "Fan Humming", 0.3, 0.5, Near, "Fan humming slightly to the right"),
                SoundSource::reference("bird-distant", "Distant Birds", -0.8, 0.8, Far, "Birds chirping in the distance"),
                SoundSource::reference("traffic-distant", "Distant Traffic", 0.5, 0.85, Far, "Faint traffic noise"),
                SoundSource::reference("wind-distant", "Distant Wind", -0.4, 0.9, Far, "Wind blowing in the distance"),
            ],
        }
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterates sources in catalog order.
    pub fn iter(&self) -> std::slice::Iter<'_, SoundSource> {
        self.sources.iter()
    }

    /// Iterates source ids in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = &SoundId> {
        self.sources.iter().map(|s| &s.id)
    }

    /// Looks up a source by id.
    #[must_use]
    pub fn get(&self, id: &SoundId) -> Option<&SoundSource> {
        self.sources.iter().find(|s| &s.id == id)
    }

    /// Returns `true` if the id is in the catalog.
    #[must_use]
    pub fn contains(&self, id: &SoundId) -> bool {
        self.get(id).is_some()
    }

    /// Returns the sources of one distance class, in catalog order.
    #[must_use]
    pub fn by_category(&self, category: SoundCategory) -> Vec<&SoundSource> {
        self.sources
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Picks a source uniformly at random.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &SoundSource {
        self.choose_excluding(rng, &[])
    }

    /// Picks a source uniformly at random among those not in `excluded`.
    ///
    /// Falls back to the first source when every source is excluded, so a
    /// single-sound catalog always yields that sound.
    pub fn choose_excluding<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        excluded: &[SoundId],
    ) -> &SoundSource {
        let available: Vec<&SoundSource> = self
            .sources
            .iter()
            .filter(|s| !excluded.contains(&s.id))
            .collect();

        if available.is_empty() {
            return &self.sources[0];
        }
        available[rng.random_range(0..available.len())]
    }

    /// Suggests the closest known id for a misspelled one.
    ///
    /// Returns the nearest id if its Damerau-Levenshtein distance is at
    /// most 3.
    #[must_use]
    pub fn suggest(&self, input: &str) -> Option<&SoundId> {
        self.sources
            .iter()
            .map(|s| (&s.id, strsim::damerau_levenshtein(input, s.id.as_str())))
            .filter(|(_, dist)| *dist <= 3)
            .min_by_key(|(_, dist)| *dist)
            .map(|(id, _)| id)
    }
}

impl<'a> IntoIterator for &'a SoundCatalog {
    type Item = &'a SoundSource;
    type IntoIter = std::slice::Iter<'a, SoundSource>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

/// Checks a raw source list, reporting issues under `prefix`.
pub(crate) fn check_sources(sources: &[SoundSource], prefix: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut error = |path: String, message: String| {
        issues.push(ValidationIssue {
            path,
            message,
            severity: Severity::Error,
        });
    };

    if sources.is_empty() {
        error(
            prefix.to_string(),
            "Sound catalog must contain at least one sound".to_string(),
        );
        return issues;
    }

    let mut seen = HashSet::new();
    for (idx, source) in sources.iter().enumerate() {
        let path = format!("{prefix}[{idx}]");
        if source.id.as_str().is_empty() {
            error(format!("{path}.id"), "Sound id cannot be empty".to_string());
        } else if !seen.insert(&source.id) {
            error(
                format!("{path}.id"),
                format!("Duplicate sound id: '{}'", source.id),
            );
        }
        if !(-1.0..=1.0).contains(&source.position.pan) {
            error(
                format!("{path}.pan"),
                format!("Pan {} is outside [-1, 1]", source.position.pan),
            );
        }
        if !(0.0..=1.0).contains(&source.position.distance) {
            error(
                format!("{path}.distance"),
                format!("Distance {} is outside [0, 1]", source.position.distance),
            );
        }
    }

    issues
}
