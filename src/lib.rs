//! Stepvibes - rhythm game chart decoder and vibes table converter
//!
//! This library provides:
//! - Parsing of CSQ/SSQ chart binaries into typed chunk sequences
//! - Transcoding of CMS charts into the CSQ layout
//! - A normalized, JSON-friendly intermediate representation
//! - Vibes event table generation for firmware embedding
//!
//! # Example
//!
//! ```no_run
//! use stepvibes::{normalize, parse_csq_data, ChartType, VibesBuilder};
//!
//! let file_data = std::fs::read("song.csq").unwrap();
//! let chunks = parse_csq_data(&file_data).unwrap();
//! let normalized = normalize(&chunks);
//! let vibes = VibesBuilder::new()
//!     .build_for_chart(&normalized, ChartType::SingleStandard, "song")
//!     .unwrap();
//! ```

pub mod error;
pub mod normalize;
pub mod parser;
pub mod vibes;

// Re-export main types for convenience
pub use error::ChartError;
pub use normalize::{normalize, parse_normalized_json, NormalizedChunk};
pub use parser::cms_parser::{parse_cms_data, transcode_cms_data};
pub use parser::csq_parser::{
    parse_csq_data, Chart, ChartType, ChunkKind, DecodedChunk, EventCode, ExtraMarker, NoteEvent,
    NoteName,
};
pub use parser::timing::{
    measure_of, MeasureLocation, TempoSegment, TempoTable, TICKS_PER_BEAT, TICKS_PER_MEASURE,
};
pub use vibes::{
    vibes_builder::{VibesBuilder, VibesChart},
    vibes_event::VibesEvent,
    RETRIGGER_GAP_MICROS,
};
