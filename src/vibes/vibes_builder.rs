//! Vibes table builder.
//!
//! Walks a normalized notes chart in timestamp order with a per-lane state
//! machine and emits the deduplicated, timestamp-sorted event list embedded
//! into firmware tables. Only the four p1 lanes exist on the target
//! hardware, so only the `single-*` chart family can be encoded.

use crate::normalize::{NormalizedChunk, NormalizedNoteEvent};
use crate::parser::csq_parser::{ChartType, ExtraMarker, NoteName};
use crate::vibes::vibes_event::VibesEvent;
use crate::vibes::RETRIGGER_GAP_MICROS;
use crate::ChartError;
use serde::Serialize;
use std::collections::BTreeMap;

const LANE_COUNT: usize = 4;

/// Vibes table: display title plus the sorted event list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VibesChart {
    pub title: String,
    pub events: Vec<VibesEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaneState {
    Off,
    Pressed,
    Held,
}

/// A press (true) or release (false) on one lane at one instant.
#[derive(Debug, Clone, Copy)]
struct LaneChange {
    lane: usize,
    pressed: bool,
}

pub struct VibesBuilder {
    /// Lane changes accumulated during build, keyed by microsecond timestamp
    changes: BTreeMap<i64, Vec<LaneChange>>,
    states: [LaneState; LANE_COUNT],
    state_timestamps: [i64; LANE_COUNT],
}

impl VibesBuilder {
    pub const fn new() -> Self {
        Self {
            changes: BTreeMap::new(),
            states: [LaneState::Off; LANE_COUNT],
            state_timestamps: [0; LANE_COUNT],
        }
    }

    /// Encode every notes chunk matching `target` into one vibes table.
    ///
    /// Lane state carries across matching chunks, events are processed in
    /// ascending timestamp order, and the output timestamps are rebased so
    /// the first event sits at zero.
    pub fn build_for_chart(
        mut self,
        chunks: &[NormalizedChunk],
        target: ChartType,
        title: &str,
    ) -> Result<VibesChart, ChartError> {
        let suffix =
            difficulty_suffix(target).ok_or(ChartError::UnsupportedVibesChart(target))?;

        for chunk in chunks {
            let NormalizedChunk::Notes(chart) = chunk else {
                continue;
            };
            if chart.chart_type != target {
                continue;
            }
            log::debug!("encoding {} events for {target}", chart.events.len());
            let mut events: Vec<&NormalizedNoteEvent> = chart.events.iter().collect();
            events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            for event in events {
                self.add_note_event(event)?;
            }
        }

        let mut out_events = Vec::with_capacity(self.changes.len());
        if let Some(&first) = self.changes.keys().next() {
            for (&timestamp, changes) in &self.changes {
                let mut active = 0u8;
                let mut pressed = 0u8;
                for change in changes {
                    pressed |= 1 << change.lane;
                    if change.pressed {
                        active |= 1 << change.lane;
                    }
                }
                out_events.push(VibesEvent {
                    timestamp: (timestamp - first) as u64,
                    note_bits: pressed << 4 | active,
                });
            }
        }

        Ok(VibesChart {
            title: vibes_title(title, suffix),
            events: out_events,
        })
    }

    fn add_note_event(&mut self, event: &NormalizedNoteEvent) -> Result<(), ChartError> {
        let now = micros(event.timestamp);
        let extra = event.extra.as_deref().unwrap_or(&[]);
        let is_release = extra.contains(&ExtraMarker::FreezeEnd);

        let lanes = event
            .notes
            .iter()
            .map(|&name| lane_index(name))
            .collect::<Result<Vec<usize>, ChartError>>()?;

        // every event claims its instant, even one with no lane changes
        self.changes.entry(now).or_default();
        for &lane in &lanes {
            self.changes.entry(now).or_default().push(LaneChange {
                lane,
                pressed: !is_release,
            });
        }

        if !is_release {
            // a lane hit while still active gets a synthetic release first,
            // at the midpoint but no later than the retrigger gap
            for &lane in &lanes {
                if self.states[lane] != LaneState::Off {
                    let prev = self.state_timestamps[lane];
                    let release_at = (prev + (now - prev) / 2).min(prev + RETRIGGER_GAP_MICROS);
                    log::debug!("lane {lane}: synthetic release at {release_at}us");
                    self.changes.entry(release_at).or_default().push(LaneChange {
                        lane,
                        pressed: false,
                    });
                }
            }
        }

        for &lane in &lanes {
            if extra.contains(&ExtraMarker::FreezeStart) {
                self.states[lane] = LaneState::Held;
            } else if is_release {
                self.states[lane] = LaneState::Off;
            } else if self.states[lane] == LaneState::Off {
                self.states[lane] = LaneState::Pressed;
            }
            self.state_timestamps[lane] = now;
        }
        Ok(())
    }
}

/// Millisecond timestamp to the integer microsecond key.
fn micros(timestamp_ms: f64) -> i64 {
    (timestamp_ms * 1000.0).round() as i64
}

const fn lane_index(name: NoteName) -> Result<usize, ChartError> {
    match name {
        NoteName::P1Left => Ok(0),
        NoteName::P1Down => Ok(1),
        NoteName::P1Up => Ok(2),
        NoteName::P1Right => Ok(3),
        name => Err(ChartError::UnsupportedLane(name)),
    }
}

/// 3-letter display suffix; only the 4-lane single-player family has one.
const fn difficulty_suffix(target: ChartType) -> Option<&'static str> {
    match target {
        ChartType::SingleBeginner => Some("BEG"),
        ChartType::SingleBasic => Some("BSC"),
        ChartType::SingleStandard => Some("STD"),
        ChartType::SingleHeavy => Some("HVY"),
        ChartType::SingleChallenge => Some("CHA"),
        _ => None,
    }
}

/// Title truncated to 16 characters plus the difficulty suffix.
fn vibes_title(title: &str, suffix: &str) -> String {
    let mut out: String = title.chars().take(16).collect();
    out.push(' ');
    out.push_str(suffix);
    out
}
