//! Switching-phase cue generation.
//!
//! The switching phase is a sequence of blocks with shrinking intervals.
//! Block structure is fixed; the target of every cue is drawn at random for
//! each session, never repeating the previous cue's target.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::catalog::{SoundCatalog, SoundId};

/// A run of `count` cues spaced `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueBlock {
    /// Time between consecutive cues in this block
    pub interval: Duration,
    /// Number of cues in this block
    pub count: u32,
}

impl CueBlock {
    /// Creates a block.
    #[must_use]
    pub const fn new(interval: Duration, count: u32) -> Self {
        Self { interval, count }
    }

    /// Total time covered by this block.
    #[must_use]
    pub fn span(&self) -> Duration {
        self.interval * self.count
    }
}

/// Instruction to move attention to a specific sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchingCue {
    /// Sound to focus on
    pub target: SoundId,
    /// When the cue fires, relative to the switching phase start
    #[serde(rename = "offset_ms", serialize_with = "serialize_ms")]
    pub offset: Duration,
    /// Interval of the block that produced this cue
    #[serde(rename = "interval_ms", serialize_with = "serialize_ms")]
    pub interval: Duration,
}

impl SwitchingCue {
    /// End of the window this cue owns.
    #[must_use]
    pub fn ends_at(&self) -> Duration {
        self.offset + self.interval
    }
}

/// Total time covered by a list of blocks.
#[must_use]
pub fn blocks_span(blocks: &[CueBlock]) -> Duration {
    blocks.iter().map(CueBlock::span).sum()
}

/// Generates the cue sequence for one switching phase.
///
/// Blocks are laid end to end starting at offset zero. Each cue picks a
/// sound uniformly from the catalog, excluding only the sound of the cue
/// right before it; sounds further back may repeat.
pub fn generate_switching_cues<R: Rng + ?Sized>(
    blocks: &[CueBlock],
    catalog: &SoundCatalog,
    rng: &mut R,
) -> Vec<SwitchingCue> {
    let total: usize = blocks.iter().map(|b| b.count as usize).sum();
    let mut cues = Vec::with_capacity(total);
    let mut offset = Duration::ZERO;
    let mut previous: Option<SoundId> = None;

    for block in blocks {
        for _ in 0..block.count {
            let target = catalog.choose_excluding(rng, previous.as_slice()).id.clone();
            previous = Some(target.clone());
            cues.push(SwitchingCue {
                target,
                offset,
                interval: block.interval,
            });
            offset += block.interval;
        }
    }

    cues
}

pub(crate) fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SoundCategory, SoundSource, SpatialPosition};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reference_blocks() -> Vec<CueBlock> {
        vec![
            CueBlock::new(Duration::from_secs(10), 12),
            CueBlock::new(Duration::from_secs(5), 24),
            CueBlock::new(Duration::from_secs(3), 20),
        ]
    }

    fn single_sound_catalog() -> SoundCatalog {
        SoundCatalog::new(vec![SoundSource {
            id: SoundId::new("solo"),
            name: "Solo".to_string(),
            position: SpatialPosition { pan: 0.0, distance: 0.5 },
            category: SoundCategory::Near,
            audio_path: String::new(),
            description: String::new(),
        }])
        .unwrap()
    }

    #[test]
    fn test_reference_blocks_cover_five_minutes() {
        assert_eq!(blocks_span(&reference_blocks()), Duration::from_secs(300));
    }

    #[test]
    fn test_block_structure_is_preserved() {
        let mut rng = StdRng::seed_from_u64(3);
        let cues = generate_switching_cues(&reference_blocks(), &SoundCatalog::reference(), &mut rng);
        assert_eq!(cues.len(), 56);
        assert!(cues[..12].iter().all(|c| c.interval == Duration::from_secs(10)));
        assert!(cues[12..36].iter().all(|c| c.interval == Duration::from_secs(5)));
        assert!(cues[36..].iter().all(|c| c.interval == Duration::from_secs(3)));
        assert_eq!(cues[12].offset, Duration::from_secs(120));
        assert_eq!(cues[36].offset, Duration::from_secs(240));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let catalog = SoundCatalog::reference();
        let a = generate_switching_cues(&reference_blocks(), &catalog, &mut StdRng::seed_from_u64(42));
        let b = generate_switching_cues(&reference_blocks(), &catalog, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_sound_catalog_repeats() {
        let mut rng = StdRng::seed_from_u64(0);
        let cues = generate_switching_cues(&reference_blocks(), &single_sound_catalog(), &mut rng);
        assert!(cues.iter().all(|c| c.target.as_str() == "solo"));
    }

    #[test]
    fn test_empty_blocks_yield_no_cues() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(generate_switching_cues(&[], &SoundCatalog::reference(), &mut rng).is_empty());
    }

    #[test]
    fn test_cue_serializes_millis() {
        let cue = SwitchingCue {
            target: SoundId::new("breath"),
            offset: Duration::from_secs(120),
            interval: Duration::from_secs(5),
        };
        let json = serde_json::to_value(&cue).unwrap();
        assert_eq!(json["target"], "breath");
        assert_eq!(json["offset_ms"], 120_000);
        assert_eq!(json["interval_ms"], 5000);
    }
}
