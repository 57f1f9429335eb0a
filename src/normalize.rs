//! Stable intermediate representation of a decoded chart.
//!
//! Normalizing strips the decoder's bookkeeping fields (raw offsets, per
//! event bpm) and keeps only what downstream consumers need. The types
//! serialize to the chunk-list JSON form and deserialize back, so a
//! previously exported JSON file can bypass the binary decoder entirely.
//! All timestamps are milliseconds.

use serde::{Deserialize, Serialize};

use crate::parser::csq_parser::{
    ChartType, DecodedChunk, EventCode, ExtraMarker, NoteName,
};
use crate::parser::timing::{measure_of, MeasureLocation};
use crate::ChartError;

/// One normalized chunk: `{"type": ..., "events": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "events", rename_all = "lowercase")]
pub enum NormalizedChunk {
    Tempo(NormalizedTempo),
    Events(Vec<NormalizedTimedEvent>),
    Notes(NormalizedChart),
    Lamps(Vec<NormalizedLampEvent>),
    Anim(Vec<NormalizedAnimEvent>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTempo {
    pub tick_rate: u16,
    /// One point per segment start, plus a terminal point for the last
    /// segment's end.
    pub events: Vec<TempoPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub measure: MeasureLocation,
    pub timestamp: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTimedEvent {
    pub timestamp: f64,
    pub measure: MeasureLocation,
    pub event: EventCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLampEvent {
    pub timestamp: f64,
    pub measure: MeasureLocation,
    pub event: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedChart {
    pub chart_type: ChartType,
    pub events: Vec<NormalizedNoteEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNoteEvent {
    pub timestamp: f64,
    pub measure: MeasureLocation,
    pub notes: Vec<NoteName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<ExtraMarker>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAnimEvent {
    pub timestamp: f64,
    pub measure: MeasureLocation,
    pub cmd: u8,
    pub param: u16,
    pub clip: String,
}

/// Normalize a decoded chunk sequence, preserving stream order.
pub fn normalize(chunks: &[DecodedChunk]) -> Vec<NormalizedChunk> {
    chunks.iter().map(normalize_chunk).collect()
}

fn normalize_chunk(chunk: &DecodedChunk) -> NormalizedChunk {
    match chunk {
        DecodedChunk::Tempo(table) => {
            let mut segments: Vec<_> = table.segments.iter().collect();
            segments.sort_by_key(|s| s.start_offset);
            let mut events: Vec<TempoPoint> = segments
                .iter()
                .map(|s| TempoPoint {
                    measure: measure_of(s.start_offset),
                    timestamp: s.start_timestamp * 1000.0,
                    bpm: s.bpm,
                })
                .collect();
            if let Some(last) = segments.last() {
                events.push(TempoPoint {
                    measure: measure_of(last.end_offset),
                    timestamp: last.end_timestamp * 1000.0,
                    bpm: last.bpm,
                });
            }
            NormalizedChunk::Tempo(NormalizedTempo {
                tick_rate: table.tick_rate,
                events,
            })
        }
        DecodedChunk::Events(events) => NormalizedChunk::Events(
            events
                .iter()
                .map(|e| NormalizedTimedEvent {
                    timestamp: e.timestamp_ms,
                    measure: e.measure,
                    event: e.event,
                })
                .collect(),
        ),
        DecodedChunk::Notes(chart) => NormalizedChunk::Notes(NormalizedChart {
            chart_type: chart.chart_type,
            events: chart
                .events
                .iter()
                .map(|e| NormalizedNoteEvent {
                    timestamp: e.timestamp_ms,
                    measure: e.measure,
                    notes: e.notes.clone(),
                    extra: if e.extra.is_empty() {
                        None
                    } else {
                        Some(e.extra.clone())
                    },
                })
                .collect(),
        }),
        DecodedChunk::Lamps(events) => NormalizedChunk::Lamps(
            events
                .iter()
                .map(|e| NormalizedLampEvent {
                    timestamp: e.timestamp_ms,
                    measure: e.measure,
                    event: e.state,
                })
                .collect(),
        ),
        DecodedChunk::Anim(events) => NormalizedChunk::Anim(
            events
                .iter()
                .map(|e| NormalizedAnimEvent {
                    timestamp: e.timestamp_ms,
                    measure: e.measure,
                    cmd: e.cmd,
                    param: e.param,
                    clip: e.clip.clone(),
                })
                .collect(),
        ),
    }
}

/// Read a previously exported normalized-JSON buffer.
pub fn parse_normalized_json(data: &[u8]) -> Result<Vec<NormalizedChunk>, ChartError> {
    serde_json::from_slice(data)
        .map_err(|err| ChartError::ParsingError(format!("invalid normalized JSON: {err}")))
}
