//! Piecewise-linear timing model for chart decoding.
//!
//! A chart's tempo chunk yields an ordered table of segments over which the
//! bpm is constant. Every other decoder converts its raw tick offsets into
//! timestamps through this table, so it is built once per file and passed by
//! reference into each decode call.

use serde::{Deserialize, Serialize};

use crate::ChartError;

/// Chart time units:
/// - 1 measure = 4096 ticks
/// - 1 beat (quarter of a measure) = 1024 ticks
///
/// Tempo entries pair a tick offset with a sample-tick data value; dividing
/// the data value by the chunk's tick rate gives seconds.
pub const TICKS_PER_MEASURE: i32 = 4096;
pub const TICKS_PER_BEAT: i32 = 1024;

/// A tick range over which the bpm is constant, derived from two consecutive
/// tempo-table entries.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoSegment {
    pub start_offset: i32,
    pub end_offset: i32,
    /// Raw sample-tick bounds, used for the inverse data-to-offset mapping
    pub start_data: i32,
    pub end_data: i32,
    /// Seconds
    pub start_timestamp: f64,
    /// Seconds
    pub end_timestamp: f64,
    pub bpm: f64,
}

/// Whole measures plus fractional remainder of a tick offset.
///
/// Serialized as the `[measure, fraction]` pair of the normalized JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i32, f64)", into = "(i32, f64)")]
pub struct MeasureLocation {
    pub measure: i32,
    pub fraction: f64,
}

impl From<(i32, f64)> for MeasureLocation {
    fn from((measure, fraction): (i32, f64)) -> Self {
        Self { measure, fraction }
    }
}

impl From<MeasureLocation> for (i32, f64) {
    fn from(location: MeasureLocation) -> Self {
        (location.measure, location.fraction)
    }
}

/// Decompose a tick offset into whole measures of 4096 ticks plus remainder.
///
/// Division truncates toward zero, so pre-roll offsets in (-4096, 0) land in
/// measure 0 with a negative fraction.
pub fn measure_of(offset: i32) -> MeasureLocation {
    let measure = offset / TICKS_PER_MEASURE;
    let fraction = f64::from(offset - measure * TICKS_PER_MEASURE) / f64::from(TICKS_PER_MEASURE);
    MeasureLocation { measure, fraction }
}

/// Ordered, contiguous tempo segments for one chart file.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoTable {
    pub tick_rate: u16,
    pub segments: Vec<TempoSegment>,
}

impl TempoTable {
    /// Build the table from `count` parallel (offset, data) entries.
    ///
    /// Each consecutive pair of entries becomes one segment; a zero offset
    /// delta records bpm 0 instead of dividing by zero. Such a degenerate
    /// segment spans no offsets, so lookups can never select it.
    pub fn from_points(tick_rate: u16, offsets: &[i32], data: &[i32]) -> Self {
        let mut segments = Vec::with_capacity(offsets.len().saturating_sub(1));
        for i in 1..offsets.len().min(data.len()) {
            let start_timestamp = f64::from(data[i - 1]) / f64::from(tick_rate);
            let end_timestamp = f64::from(data[i]) / f64::from(tick_rate);
            let time_delta = (end_timestamp - start_timestamp) * 1000.0;
            let offset_delta = offsets[i] - offsets[i - 1];
            let bpm = if offset_delta == 0 {
                0.0
            } else {
                60000.0 / (time_delta / (f64::from(offset_delta) / f64::from(TICKS_PER_BEAT)))
            };
            segments.push(TempoSegment {
                start_offset: offsets[i - 1],
                end_offset: offsets[i],
                start_data: data[i - 1],
                end_data: data[i],
                start_timestamp,
                end_timestamp,
                bpm,
            });
        }
        TempoTable {
            tick_rate,
            segments,
        }
    }

    fn segment_for_offset(&self, offset: i32) -> Result<&TempoSegment, ChartError> {
        self.segments
            .iter()
            .find(|s| offset >= s.start_offset && offset < s.end_offset)
            .ok_or(ChartError::OffsetOutOfRange(offset))
    }

    /// Millisecond timestamp of a tick offset.
    pub fn timestamp_ms(&self, offset: i32) -> Result<f64, ChartError> {
        let segment = self.segment_for_offset(offset)?;
        let beats = f64::from(offset - segment.start_offset) / f64::from(TICKS_PER_BEAT);
        let timestamp = segment.start_timestamp + beats / segment.bpm * 60.0;
        Ok(timestamp * 1000.0)
    }

    /// Tick offset of a raw sample-tick data value, by linear interpolation
    /// over the matching segment's data bounds.
    pub fn offset_for_data(&self, data: i32) -> Result<f64, ChartError> {
        let segment = self
            .segments
            .iter()
            .find(|s| data >= s.start_data && data < s.end_data)
            .ok_or(ChartError::DataOutOfRange(data))?;
        let span = f64::from(segment.end_offset - segment.start_offset);
        let progress = f64::from(data - segment.start_data)
            / f64::from(segment.end_data - segment.start_data);
        Ok(f64::from(segment.start_offset) + span * progress)
    }

    /// Bpm in force at a tick offset.
    pub fn bpm_at(&self, offset: i32) -> Result<f64, ChartError> {
        Ok(self.segment_for_offset(offset)?.bpm)
    }
}
