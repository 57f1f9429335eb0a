//! Error types for the stepvibes library

use std::io;

use crate::parser::csq_parser::{ChartType, NoteName};

/// Library error type for stepvibes operations.
///
/// Every fatal decode condition is its own variant carrying the offending
/// tag/offset/field, so callers can tell a malformed chunk from a chart that
/// simply cannot be encoded for 4 lanes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    /// Chunk tag outside the known 1..=5 range
    #[error("unknown chunk type {tag:#06x} at byte {offset}")]
    UnknownChunkType {
        /// The unrecognized 16-bit tag
        tag: u16,
        /// Byte position of the tag in the input buffer
        offset: usize,
    },

    /// No tempo chunk anywhere in the stream, so no timing reference exists
    #[error("no tempo chunk in stream")]
    MissingTempoChunk,

    /// Tick offset not covered by any tempo segment
    #[error("offset {0} outside tempo table bounds")]
    OffsetOutOfRange(i32),

    /// Sample-tick data value not covered by any tempo segment
    #[error("data value {0} outside tempo table bounds")]
    DataOutOfRange(i32),

    /// Note extra-flags byte with bits other than the freeze_end bit set
    #[error("unknown extra flags {flags:#04x} for note at offset {offset}")]
    UnknownExtraFlags {
        /// The raw flags byte
        flags: u8,
        /// Tick offset of the offending note event
        offset: i32,
    },

    /// Note bitfield bit with no lane mapping for the chart layout
    #[error("no lane for note bit {bit} in a solo chart at offset {offset}")]
    UnknownNoteBit {
        /// The set bit index
        bit: u8,
        /// Tick offset of the offending note event
        offset: i32,
    },

    /// CMS chart chunk without the 0xFFFFFFFF sentinel at byte 0x08
    #[error("expected chart header sentinel not found in chunk {0}")]
    MissingChartHeader(usize),

    /// CMS difficulty with no end-of-chart record
    #[error("no end-of-chart record in chunk {0}")]
    MissingEndMarker(usize),

    /// Vibes target chart outside the 4-lane single-player family
    #[error("chart type {0} cannot be encoded as a vibes table")]
    UnsupportedVibesChart(ChartType),

    /// Note that does not land on one of the four p1 lanes
    #[error("note {0:?} is not playable on 4 lanes")]
    UnsupportedLane(NoteName),

    /// Structurally malformed or truncated data
    #[error("parsing error: {0}")]
    ParsingError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<io::Error> for ChartError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error.to_string())
    }
}
