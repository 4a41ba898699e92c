//! `plan` command handler
//!
//! Prints the full session timeline, including one generated switching cue
//! sequence, without playing anything.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::catalog::SoundCatalog;
use crate::cli::args::{OutputFormat, PlanArgs};
use crate::error::AttuneError;
use crate::protocol::{Phase, Protocol, ProtocolSummary, SwitchingCue};
use crate::report::format_clock;

use super::load_protocol;

/// What happens at a point on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TimelineItem {
    /// A phase begins
    PhaseStart {
        /// Display name
        name: String,
    },
    /// An instruction is shown
    Instruction {
        /// Text
        text: String,
    },
    /// Attention moves to another sound
    SwitchSound {
        /// Target display name
        sound: String,
    },
    /// The session ends
    SessionComplete,
}

/// One timeline row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Milliseconds since session start
    pub at_ms: u64,
    /// Phase the row belongs to
    pub phase: Phase,
    /// What happens
    #[serde(flatten)]
    pub item: TimelineItem,
}

#[derive(Debug, Serialize)]
struct Plan {
    summary: ProtocolSummary,
    timeline: Vec<TimelineEntry>,
}

/// Print the session timeline.
///
/// # Errors
///
/// Returns a config error if the protocol does not load.
pub fn run(args: &PlanArgs) -> Result<(), AttuneError> {
    let loaded = load_protocol(args.config.as_deref())?;
    let mut rng = args.seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let cues = loaded.protocol.generate_switching_cues(&loaded.catalog, &mut rng);

    let plan = Plan {
        summary: loaded.protocol.summary(&loaded.catalog),
        timeline: build_timeline(&loaded.protocol, &loaded.catalog, &cues),
    };

    match args.format {
        OutputFormat::Human => print_human(&plan),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

/// Lays out every phase start, instruction and cue on one session clock.
///
/// Rows sharing an instant keep the order the scheduler fires them in:
/// phase start, then instructions, then cues.
#[must_use]
pub fn build_timeline(
    protocol: &Protocol,
    catalog: &SoundCatalog,
    cues: &[SwitchingCue],
) -> Vec<TimelineEntry> {
    let mut timeline = Vec::new();
    let mut phase_start = Duration::ZERO;

    for phase in Phase::ALL {
        let config = protocol.phase_config(phase);
        let at = |offset: Duration| millis(phase_start + offset);

        timeline.push(TimelineEntry {
            at_ms: at(Duration::ZERO),
            phase,
            item: TimelineItem::PhaseStart {
                name: phase.display_name().to_string(),
            },
        });
        timeline.extend(config.instructions.iter().map(|i| TimelineEntry {
            at_ms: at(i.offset),
            phase,
            item: TimelineItem::Instruction {
                text: i.text.clone(),
            },
        }));
        if phase == Phase::Switching {
            timeline.extend(cues.iter().map(|cue| TimelineEntry {
                at_ms: at(cue.offset),
                phase,
                item: TimelineItem::SwitchSound {
                    sound: catalog
                        .get(&cue.target)
                        .map_or_else(|| cue.target.to_string(), |s| s.name.clone()),
                },
            }));
        }

        phase_start += config.duration;
    }

    timeline.push(TimelineEntry {
        at_ms: millis(phase_start),
        phase: Phase::Divided,
        item: TimelineItem::SessionComplete,
    });

    // stable: equal instants keep push order
    timeline.sort_by_key(|e| e.at_ms);
    timeline
}

fn print_human(plan: &Plan) {
    println!(
        "Session: {} ({} sounds)",
        format_clock(plan.summary.total_duration),
        plan.summary.total_sounds
    );
    for phase in &plan.summary.phases {
        println!(
            "  {}: {} ({} instructions)",
            phase.name,
            format_clock(phase.duration),
            phase.instructions
        );
    }
    println!();

    for entry in &plan.timeline {
        let at = format_clock(Duration::from_millis(entry.at_ms));
        match &entry.item {
            TimelineItem::PhaseStart { name } => println!("{at:>6}  == {name} =="),
            TimelineItem::Instruction { text } => println!("{at:>6}  {text}"),
            TimelineItem::SwitchSound { sound } => println!("{at:>6}    -> {sound}"),
            TimelineItem::SessionComplete => println!("{at:>6}  == Complete =="),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_timeline(seed: u64) -> Vec<TimelineEntry> {
        let protocol = Protocol::reference();
        let catalog = SoundCatalog::reference();
        let cues = protocol.generate_switching_cues(&catalog, &mut StdRng::seed_from_u64(seed));
        build_timeline(&protocol, &catalog, &cues)
    }

    #[test]
    fn timeline_is_sorted_and_bounded() {
        let timeline = reference_timeline(3);
        assert!(timeline.windows(2).all(|w| w[0].at_ms <= w[1].at_ms));
        let last = timeline.last().unwrap();
        assert_eq!(last.item, TimelineItem::SessionComplete);
        assert_eq!(last.at_ms, 720_000);
    }

    #[test]
    fn timeline_has_phase_starts_at_boundaries() {
        let starts: Vec<(u64, Phase)> = reference_timeline(3)
            .into_iter()
            .filter(|e| matches!(e.item, TimelineItem::PhaseStart { .. }))
            .map(|e| (e.at_ms, e.phase))
            .collect();
        assert_eq!(
            starts,
            vec![
                (0, Phase::Selective),
                (300_000, Phase::Switching),
                (600_000, Phase::Divided)
            ]
        );
    }

    #[test]
    fn timeline_lists_every_cue_in_switching() {
        let timeline = reference_timeline(9);
        let cues: Vec<&TimelineEntry> = timeline
            .iter()
            .filter(|e| matches!(e.item, TimelineItem::SwitchSound { .. }))
            .collect();
        assert_eq!(cues.len(), 56);
        assert!(cues.iter().all(|e| e.phase == Phase::Switching));
        assert_eq!(cues[0].at_ms, 300_000);
    }

    #[test]
    fn phase_start_precedes_instructions_at_same_instant() {
        let protocol = Protocol::reference();
        let catalog = SoundCatalog::reference();
        let timeline = build_timeline(&protocol, &catalog, &[]);
        let first_two: Vec<&TimelineItem> = timeline.iter().take(2).map(|e| &e.item).collect();
        assert!(matches!(first_two[0], TimelineItem::PhaseStart { .. }));
        assert_eq!(timeline[0].at_ms, 0);
    }

    #[test]
    fn timeline_json_shape() {
        let entry = TimelineEntry {
            at_ms: 300_000,
            phase: Phase::Switching,
            item: TimelineItem::SwitchSound {
                sound: "Rain".to_string(),
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "switch-sound");
        assert_eq!(json["sound"], "Rain");
        assert_eq!(json["phase"], "switching");
    }
}
