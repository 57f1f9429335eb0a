//! CMS chart transcoder.
//!
//! CMS files carry the same musical content as CSQ in a different layout: a
//! raw tempo-pair chunk followed by per-difficulty note streams with 8-byte
//! event records. Instead of a second full decoder, the layout is re-emitted
//! as CSQ-shaped chunks and fed back through
//! [`parse_csq_data`](crate::parser::csq_parser::parse_csq_data), keeping one
//! source of truth for chunk semantics.

use crate::parser::csq_parser::{parse_csq_data, DecodedChunk};
use crate::parser::primitive_parser::slice_range;
use crate::ChartError;

/// Tick rate of the rebuilt tempo chunk; CMS files carry none of their own.
const CMS_TICK_RATE: u16 = 0x4b;

/// Marks both the chart header (at byte 0x08) and the end-of-chart record.
const END_SENTINEL: u32 = 0xffff_ffff;

/// Event records start here in every chart chunk.
const RECORDS_START: usize = 0x0c;

/// Pre-roll offset (-4096 ticks) used by the housekeeping events chunk.
const PREROLL_OFFSET: u32 = 0xffff_f000;

/// Decode a CMS buffer: transcode to CSQ bytes, then decode those.
pub fn parse_cms_data(data: &[u8]) -> Result<Vec<DecodedChunk>, ChartError> {
    let csq = transcode_cms_data(data)?;
    parse_csq_data(&csq)
}

/// Re-emit a CMS buffer as a CSQ chunk stream.
///
/// Output order: rebuilt tempo chunk, synthesized housekeeping events chunk,
/// one notes chunk per difficulty, lamp-off and video-reference fillers, and
/// a zero-length chunk closing the stream. All chunks are zero-padded to
/// 4-byte alignment.
pub fn transcode_cms_data(data: &[u8]) -> Result<Vec<u8>, ChartError> {
    let chunks = split_cms_chunks(data)?;
    if chunks.is_empty() || chunks[0].is_empty() {
        return Err(ChartError::MissingTempoChunk);
    }

    // every chart chunk must carry the header sentinel; any solo-class
    // chunk flags the whole file, changing the chart codes assigned below
    let mut solo_file = false;
    for (index, chunk) in chunks.iter().enumerate().skip(1) {
        if chunk.is_empty() {
            continue;
        }
        if read_u32(chunk, 0x08) != Some(END_SENTINEL) {
            return Err(ChartError::MissingChartHeader(index));
        }
        if chunk[0] == 1 {
            solo_file = true;
        }
    }
    log::debug!("transcoding cms: {} chunks, solo={solo_file}", chunks.len());

    let mut charts = Vec::new();
    let mut end_offset = None;
    for (index, chunk) in chunks.iter().enumerate().skip(1) {
        if chunk.is_empty() {
            continue;
        }
        let (bytes, end) = rebuild_notes_chunk(index, chunk, solo_file)?;
        charts.push(bytes);
        end_offset = Some(end);
    }
    let end_offset = end_offset
        .ok_or_else(|| ChartError::ParsingError("no chart chunks in cms stream".to_string()))?;

    let mut out_chunks = vec![rebuild_tempo_chunk(chunks[0]), build_events_chunk(end_offset)];
    out_chunks.extend(charts);
    out_chunks.push(build_lamp_chunk());
    out_chunks.push(build_video_chunk(end_offset));

    let mut output = Vec::new();
    for chunk in &out_chunks {
        output.extend_from_slice(&(chunk.len() as u32 + 4).to_le_bytes());
        output.extend_from_slice(chunk);
    }
    // explicit empty chunk terminates the stream
    output.extend_from_slice(&0u32.to_le_bytes());
    Ok(output)
}

/// Split a CMS buffer on its per-chunk length prefixes.
///
/// A zero length is an explicit empty chunk kept as a placeholder, not a
/// terminator. A trailing fragment shorter than a length word ends the
/// stream; lengths 1–3 cannot cover their own prefix and are malformed.
fn split_cms_chunks(data: &[u8]) -> Result<Vec<&[u8]>, ChartError> {
    let mut chunks = Vec::new();
    let mut cursor = 0usize;
    while data.len().saturating_sub(cursor) >= 4 {
        let size = u32::from_le_bytes([
            data[cursor],
            data[cursor + 1],
            data[cursor + 2],
            data[cursor + 3],
        ]) as usize;
        if size == 0 {
            chunks.push(&data[cursor..cursor]);
            cursor += 4;
        } else if size < 4 {
            return Err(ChartError::ParsingError(format!(
                "cms chunk size {size} at byte {cursor} too small"
            )));
        } else {
            chunks.push(slice_range(data, cursor + 4, cursor + size));
            cursor += size;
        }
    }
    Ok(chunks)
}

fn read_u32(chunk: &[u8], pos: usize) -> Option<u32> {
    let bytes = chunk.get(pos..pos + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Rebuild the raw (offset, data) pair chunk as a tagged CSQ tempo chunk.
///
/// CMS interleaves the pairs; CSQ wants all offsets then all data values.
/// The 4-byte groups are copied verbatim, only regrouped.
fn rebuild_tempo_chunk(chunk: &[u8]) -> Vec<u8> {
    let pair_count = chunk.len() / 8;
    let mut offsets = Vec::with_capacity(pair_count * 4);
    let mut data = Vec::with_capacity(pair_count * 4);
    for pair in chunk.chunks_exact(8) {
        offsets.extend_from_slice(&pair[0..4]);
        data.extend_from_slice(&pair[4..8]);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&CMS_TICK_RATE.to_le_bytes());
    out.extend_from_slice(&(pair_count as u32).to_le_bytes());
    out.extend_from_slice(&offsets);
    out.extend_from_slice(&data);
    pad_to_alignment(&mut out);
    out
}

/// Reassemble one 4-byte record mask into the 8-bit note field
/// (p1 LDUR in the low nibble, p2 in the high nibble).
fn pack_note_mask(mask: &[u8]) -> u8 {
    let lane = |byte: u8, bit: u8| u8::from(byte & bit != 0);
    let p1 = lane(mask[1], 0x10) << 3 // right
        | lane(mask[1], 0x01) << 2 // up
        | lane(mask[0], 0x10) << 1 // down
        | lane(mask[0], 0x01); // left
    let p2 = lane(mask[3], 0x10) << 3
        | lane(mask[3], 0x01) << 2
        | lane(mask[2], 0x10) << 1
        | lane(mask[2], 0x01);
    p2 << 4 | p1
}

/// Convert one difficulty's record stream into a CSQ notes chunk.
///
/// Returns the chunk bytes and the difficulty's end offset, taken from the
/// record whose mask is all ones. A difficulty with no such record would
/// have no defined end.
fn rebuild_notes_chunk(
    index: usize,
    chunk: &[u8],
    solo_file: bool,
) -> Result<(Vec<u8>, u32), ChartError> {
    let class = chunk[0];
    let difficulty = chunk[1];

    let mut offsets = Vec::new();
    let mut notes = Vec::new();
    let mut end_offset = None;
    for record in chunk[RECORDS_START.min(chunk.len())..].chunks_exact(8) {
        let offset = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let mask = &record[4..8];
        if read_u32(record, 4) == Some(END_SENTINEL) {
            end_offset = Some(offset);
            break;
        }
        offsets.push(offset);
        notes.push(pack_note_mask(mask));
    }
    let end_offset = end_offset.ok_or(ChartError::MissingEndMarker(index))?;

    let (layout, difficulty) = match (solo_file, class) {
        (false, 0..=2) => (0x14 + class * 2, difficulty),
        (true, 0) => (0x16, difficulty), // 6 panel
        (true, 1) => (0x14, difficulty), // 4 panel
        // 3 panel, pushed into the edit-chart range
        (true, 2) => (0x16, difficulty.wrapping_add(0xf0)),
        (_, class) => {
            return Err(ChartError::ParsingError(format!(
                "unknown chart class {class} in chunk {index}"
            )))
        }
    };

    let mut out = Vec::new();
    out.extend_from_slice(&3u16.to_le_bytes());
    out.push(layout);
    out.push(difficulty.wrapping_add(1));
    out.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
    for offset in &offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&notes);
    pad_to_alignment(&mut out);
    Ok((out, end_offset))
}

/// Synthesize the 5-event housekeeping chunk: two pre-roll markers, the
/// start event at offset zero, end one measure early, and clear at the end.
fn build_events_chunk(end_offset: u32) -> Vec<u8> {
    let offsets = [
        PREROLL_OFFSET,
        PREROLL_OFFSET,
        0,
        end_offset.wrapping_sub(4096),
        end_offset,
    ];
    let codes: [u16; 5] = [0x0401, 0x0102, 0x0202, 0x0302, 0x0402];

    let mut out = Vec::new();
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    for code in codes {
        out.extend_from_slice(&code.to_le_bytes());
    }
    pad_to_alignment(&mut out);
    out
}

/// Filler chunk switching the cabinet lamps off at offset zero.
fn build_lamp_chunk() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.push(0x80);
    pad_to_alignment(&mut out);
    out
}

/// Filler chunk referencing a single background video over the whole chart.
fn build_video_chunk(end_offset: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&5u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&end_offset.to_le_bytes());
    out.extend_from_slice(&0x0006_1d45u32.to_le_bytes());
    out.extend_from_slice(&0x0006_1d45u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0x00b5_2649u32.to_le_bytes());
    pad_to_alignment(&mut out);
    out
}

fn pad_to_alignment(chunk: &mut Vec<u8>) {
    while chunk.len() % 4 != 0 {
        chunk.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::csq_parser::{split_chunks, ChartType, ChunkKind, EventCode, NoteName};

    fn cms_chunk(body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 4) as u32).to_le_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    /// Tempo pairs (-4096, 0), (0, 75), (8192, 675): one second of pre-roll
    /// at 240 bpm, then 60 bpm.
    fn tempo_body() -> Vec<u8> {
        let mut body = Vec::new();
        for (offset, data) in [(-4096i32, 0i32), (0, 75), (8192, 675)] {
            body.extend_from_slice(&offset.to_le_bytes());
            body.extend_from_slice(&data.to_le_bytes());
        }
        body
    }

    /// One tap (p1 left at offset 0) ending at offset 3072.
    fn chart_body(class: u8, difficulty: u8) -> Vec<u8> {
        let mut body = vec![class, difficulty, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        body.extend_from_slice(&3072u32.to_le_bytes());
        body.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        body
    }

    fn sample_cms() -> Vec<u8> {
        let mut data = cms_chunk(&tempo_body());
        data.extend_from_slice(&cms_chunk(&chart_body(0, 1)));
        data
    }

    #[test]
    fn test_transcoded_stream_layout() {
        let csq = transcode_cms_data(&sample_cms()).unwrap();
        let chunks = split_chunks(&csq).unwrap();
        let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Tempo,
                ChunkKind::Events,
                ChunkKind::Notes,
                ChunkKind::Lamps,
                ChunkKind::Anim,
            ]
        );
        // stream closes with a zero length word
        assert_eq!(&csq[csq.len() - 4..], &[0, 0, 0, 0]);
        // every chunk (prefix + tag + payload) is 4-byte aligned
        for chunk in &chunks {
            assert_eq!((chunk.payload.len() + 6) % 4, 0);
        }
    }

    #[test]
    fn test_rebuilt_tempo_chunk_bytes() {
        let csq = transcode_cms_data(&sample_cms()).unwrap();
        let chunks = split_chunks(&csq).unwrap();
        let payload = chunks[0].payload;
        // tick rate 0x4b, 3 entries, reserved zero
        assert_eq!(&payload[0..6], &[0x4b, 0x00, 0x03, 0x00, 0x00, 0x00]);
        // offsets regrouped ahead of data values
        assert_eq!(&payload[6..10], &(-4096i32).to_le_bytes());
        assert_eq!(&payload[10..14], &0i32.to_le_bytes());
        assert_eq!(&payload[14..18], &8192i32.to_le_bytes());
        assert_eq!(&payload[18..22], &0i32.to_le_bytes());
        assert_eq!(&payload[22..26], &75i32.to_le_bytes());
        assert_eq!(&payload[26..30], &675i32.to_le_bytes());
    }

    #[test]
    fn test_cms_decodes_end_to_end() {
        let decoded = parse_cms_data(&sample_cms()).unwrap();
        assert_eq!(decoded.len(), 5);

        let DecodedChunk::Tempo(table) = &decoded[0] else {
            panic!("expected tempo chunk");
        };
        assert_eq!(table.tick_rate, 0x4b);
        assert_eq!(table.segments.len(), 2);
        assert_eq!(table.segments[0].bpm, 240.0);
        assert_eq!(table.segments[1].bpm, 60.0);

        let DecodedChunk::Events(events) = &decoded[1] else {
            panic!("expected events chunk");
        };
        let codes: Vec<EventCode> = events.iter().map(|e| e.event).collect();
        assert_eq!(
            codes,
            vec![
                EventCode::Unknown(0x0401),
                EventCode::Unknown(0x0102),
                EventCode::Start,
                EventCode::End,
                EventCode::Clear,
            ]
        );
        let offsets: Vec<i32> = events.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![-4096, -4096, 0, -1024, 3072]);

        let DecodedChunk::Notes(chart) = &decoded[2] else {
            panic!("expected notes chunk");
        };
        assert_eq!(chart.chart_type, ChartType::SingleStandard);
        assert_eq!(chart.events.len(), 1);
        assert_eq!(chart.events[0].notes, vec![NoteName::P1Left]);
        assert_eq!(chart.events[0].timestamp_ms, 1000.0);

        let DecodedChunk::Lamps(lamps) = &decoded[3] else {
            panic!("expected lamp chunk");
        };
        assert_eq!(lamps.len(), 1);
        assert_eq!(lamps[0].state, 0x80);

        let DecodedChunk::Anim(anim) = &decoded[4] else {
            panic!("expected anim chunk");
        };
        assert_eq!(anim.len(), 2);
        assert_eq!(anim[0].clip, "ccsaca");
        assert_eq!(anim[0].cmd, 0x45);
        assert_eq!(anim[0].param, 0x0006);
        assert_eq!(anim[1].offset, 3072);
    }

    #[test]
    fn test_record_masks_for_both_players() {
        assert_eq!(pack_note_mask(&[0x01, 0x00, 0x00, 0x00]), 0x01); // p1 left
        assert_eq!(pack_note_mask(&[0x10, 0x00, 0x00, 0x00]), 0x02); // p1 down
        assert_eq!(pack_note_mask(&[0x00, 0x01, 0x00, 0x00]), 0x04); // p1 up
        assert_eq!(pack_note_mask(&[0x00, 0x10, 0x00, 0x00]), 0x08); // p1 right
        assert_eq!(pack_note_mask(&[0x00, 0x00, 0x01, 0x00]), 0x10); // p2 left
        assert_eq!(pack_note_mask(&[0x00, 0x00, 0x10, 0x10]), 0xa0); // p2 down+right
        assert_eq!(pack_note_mask(&[0x11, 0x11, 0x11, 0x11]), 0xff);
    }

    #[test]
    fn test_solo_file_chart_codes() {
        // class 2 chunk flags the file solo; 3-panel charts route as edit
        let mut data = cms_chunk(&tempo_body());
        data.extend_from_slice(&cms_chunk(&chart_body(1, 1)));
        data.extend_from_slice(&cms_chunk(&chart_body(2, 0)));
        let decoded = parse_cms_data(&data).unwrap();

        let charts: Vec<ChartType> = decoded
            .iter()
            .filter_map(|chunk| match chunk {
                DecodedChunk::Notes(chart) => Some(chart.chart_type),
                _ => None,
            })
            .collect();
        assert_eq!(
            charts,
            vec![ChartType::SingleStandard, ChartType::Solo3Basic]
        );
    }

    #[test]
    fn test_empty_placeholder_chunk_is_skipped() {
        let mut data = cms_chunk(&tempo_body());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&cms_chunk(&chart_body(0, 1)));
        let decoded = parse_cms_data(&data).unwrap();
        assert_eq!(decoded.len(), 5);
    }

    #[test]
    fn test_missing_header_sentinel_is_fatal() {
        let mut chart = chart_body(0, 1);
        chart[0x08] = 0x00;
        let mut data = cms_chunk(&tempo_body());
        data.extend_from_slice(&cms_chunk(&chart));
        assert_eq!(
            transcode_cms_data(&data),
            Err(ChartError::MissingChartHeader(1))
        );
    }

    #[test]
    fn test_missing_end_record_is_fatal() {
        // drop the terminating record entirely
        let chart = &chart_body(0, 1)[..20];
        let mut data = cms_chunk(&tempo_body());
        data.extend_from_slice(&cms_chunk(chart));
        assert_eq!(
            transcode_cms_data(&data),
            Err(ChartError::MissingEndMarker(1))
        );
    }
}
