//! Integration tests for stepvibes library usage.
//!
//! These tests verify that the library can be used as a dependency
//! from external projects.

use stepvibes::{
    normalize, parse_cms_data, parse_csq_data, parse_normalized_json, ChartError, ChartType,
    DecodedChunk, NormalizedChunk, TempoTable, VibesBuilder, TICKS_PER_MEASURE,
};

/// Test that all major types are accessible from the library.
#[test]
fn test_types_accessible() {
    // This test verifies that the public API types compile and are usable.
    // If any re-export is missing, this test will fail to compile.

    fn _assert_types() {
        let _: fn(&[u8]) -> Result<Vec<DecodedChunk>, ChartError> = parse_csq_data;
        let _: fn(&[u8]) -> Result<Vec<DecodedChunk>, ChartError> = parse_cms_data;
        let _: i32 = TICKS_PER_MEASURE;
    }
}

fn synthetic_csq() -> Vec<u8> {
    let mut data = Vec::new();

    // tempo chunk: tick rate 100, 240 bpm over four measures
    let mut payload: Vec<u8> = vec![100, 0, 2, 0, 0, 0];
    for offset in [0i32, 16384] {
        payload.extend_from_slice(&offset.to_le_bytes());
    }
    for sample in [0i32, 400] {
        payload.extend_from_slice(&sample.to_le_bytes());
    }
    data.extend_from_slice(&((payload.len() + 6) as u32).to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&payload);

    // notes chunk: single-standard, taps on p1 left and down
    let mut payload: Vec<u8> = vec![0x14, 0x02, 2, 0, 0, 0];
    for offset in [0i32, 4096] {
        payload.extend_from_slice(&offset.to_le_bytes());
    }
    payload.extend_from_slice(&[0x01, 0x02]);
    data.extend_from_slice(&((payload.len() + 6) as u32).to_le_bytes());
    data.extend_from_slice(&3u16.to_le_bytes());
    data.extend_from_slice(&payload);

    data
}

/// Test decoding a synthetic chart through the public API.
#[test]
fn test_decode_synthetic_chart() {
    let decoded = parse_csq_data(&synthetic_csq()).expect("Failed to decode chart");
    assert_eq!(decoded.len(), 2);

    let DecodedChunk::Tempo(table) = &decoded[0] else {
        panic!("first chunk should be tempo");
    };
    let _: &TempoTable = table;
    assert_eq!(table.segments.len(), 1);
    assert_eq!(table.segments[0].bpm, 240.0);

    let DecodedChunk::Notes(chart) = &decoded[1] else {
        panic!("second chunk should be notes");
    };
    assert_eq!(chart.chart_type, ChartType::SingleStandard);
    assert_eq!(chart.events.len(), 2);
}

/// Test the full pipeline from bytes to a vibes table.
#[test]
fn test_vibes_generation() {
    let decoded = parse_csq_data(&synthetic_csq()).expect("Failed to decode chart");
    let normalized = normalize(&decoded);
    let vibes = VibesBuilder::new()
        .build_for_chart(&normalized, ChartType::SingleStandard, "integration")
        .expect("Failed to build vibes chart");

    assert_eq!(vibes.title, "integration STD");
    assert_eq!(vibes.events.len(), 2);
    assert_eq!(vibes.events[0].timestamp, 0);
    assert_eq!(vibes.events[0].note_bits, 0x11);
    assert_eq!(vibes.events[1].note_bits, 0x22);
    // one measure at 240 bpm is a second
    assert_eq!(vibes.events[1].timestamp, 1_000_000);
}

/// Test that the normalized JSON round-trip feeds the encoder unchanged.
#[test]
fn test_normalized_json_round_trip() {
    let decoded = parse_csq_data(&synthetic_csq()).unwrap();
    let normalized = normalize(&decoded);
    let json = serde_json::to_vec(&normalized).unwrap();
    let reparsed: Vec<NormalizedChunk> = parse_normalized_json(&json).unwrap();
    assert_eq!(reparsed, normalized);

    let from_bytes = VibesBuilder::new()
        .build_for_chart(&normalized, ChartType::SingleStandard, "x")
        .unwrap();
    let from_json = VibesBuilder::new()
        .build_for_chart(&reparsed, ChartType::SingleStandard, "x")
        .unwrap();
    assert_eq!(from_bytes, from_json);
}

/// Test error handling for invalid data.
#[test]
fn test_parse_error() {
    let invalid_data = vec![0xffu8; 32]; // not a valid chart stream
    let result = parse_csq_data(&invalid_data);

    assert!(result.is_err(), "Should return error for invalid data");
    let err = result.unwrap_err();
    assert!(
        matches!(err, ChartError::UnknownChunkType { .. }),
        "Should flag the unknown chunk tag"
    );
}
