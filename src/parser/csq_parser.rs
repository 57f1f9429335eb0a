//! CSQ/SSQ chart decoder.
//!
//! A chart file is a stream of length-prefixed, type-tagged chunks. The
//! tempo chunk is decoded first to build the [`TempoTable`]; every other
//! chunk decoder receives the table and annotates its events with measure
//! position, millisecond timestamp and bpm.

use crate::parser::primitive_parser::{
    parse_int, parse_reserved, parse_u8, parse_u16, parse_u32, slice_from, slice_range,
};
use crate::parser::timing::{measure_of, MeasureLocation, TempoTable};
use crate::ChartError;
use nom::bytes::complete::take;
use nom::multi::count;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chunk type tags of the CSQ stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Tempo,
    Events,
    Notes,
    Lamps,
    Anim,
}

impl ChunkKind {
    /// Map a 16-bit chunk tag; anything outside 1..=5 is unknown.
    pub const fn from_tag(tag: u16) -> Option<ChunkKind> {
        match tag {
            0x01 => Some(ChunkKind::Tempo),
            0x02 => Some(ChunkKind::Events),
            0x03 => Some(ChunkKind::Notes),
            0x04 => Some(ChunkKind::Lamps),
            0x05 => Some(ChunkKind::Anim),
            _ => None,
        }
    }
}

/// A raw chunk: type tag plus payload bytes, consumed immediately by its
/// decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk<'a> {
    pub kind: ChunkKind,
    pub payload: &'a [u8],
}

/// Difficulty + layout combination of a notes chunk.
///
/// The `0xfX16` range is not an official chart range; it routes 3-panel
/// charts through the edit-chart slots. Codes with no known name pass
/// through as [`ChartType::Unknown`] so newer files keep decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ChartTypeRepr", into = "ChartTypeRepr")]
pub enum ChartType {
    SingleBasic,
    SingleStandard,
    SingleHeavy,
    SingleBeginner,
    SingleChallenge,
    SoloBasic,
    SoloStandard,
    SoloHeavy,
    SoloBeginner,
    SoloChallenge,
    DoubleBasic,
    DoubleStandard,
    DoubleHeavy,
    DoubleBeginner,
    DoubleChallenge,
    DoubleBattle,
    Solo3Basic,
    Solo3Standard,
    Solo3Heavy,
    Solo3Beginner,
    Solo3Challenge,
    Unknown(u16),
}

impl ChartType {
    pub const fn from_code(code: u16) -> ChartType {
        match code {
            0x0114 => ChartType::SingleBasic,
            0x0214 => ChartType::SingleStandard,
            0x0314 => ChartType::SingleHeavy,
            0x0414 => ChartType::SingleBeginner,
            0x0614 => ChartType::SingleChallenge,
            0x0116 => ChartType::SoloBasic,
            0x0216 => ChartType::SoloStandard,
            0x0316 => ChartType::SoloHeavy,
            0x0416 => ChartType::SoloBeginner,
            0x0616 => ChartType::SoloChallenge,
            0x0118 => ChartType::DoubleBasic,
            0x0218 => ChartType::DoubleStandard,
            0x0318 => ChartType::DoubleHeavy,
            0x0418 => ChartType::DoubleBeginner,
            0x0618 => ChartType::DoubleChallenge,
            0x1024 => ChartType::DoubleBattle,
            0xf116 => ChartType::Solo3Basic,
            0xf216 => ChartType::Solo3Standard,
            0xf316 => ChartType::Solo3Heavy,
            0xf416 => ChartType::Solo3Beginner,
            0xf616 => ChartType::Solo3Challenge,
            code => ChartType::Unknown(code),
        }
    }

    /// Stable name, `None` for passthrough codes.
    pub const fn name(&self) -> Option<&'static str> {
        match self {
            ChartType::SingleBasic => Some("single-basic"),
            ChartType::SingleStandard => Some("single-standard"),
            ChartType::SingleHeavy => Some("single-heavy"),
            ChartType::SingleBeginner => Some("single-beginner"),
            ChartType::SingleChallenge => Some("single-challenge"),
            ChartType::SoloBasic => Some("solo-basic"),
            ChartType::SoloStandard => Some("solo-standard"),
            ChartType::SoloHeavy => Some("solo-heavy"),
            ChartType::SoloBeginner => Some("solo-beginner"),
            ChartType::SoloChallenge => Some("solo-challenge"),
            ChartType::DoubleBasic => Some("double-basic"),
            ChartType::DoubleStandard => Some("double-standard"),
            ChartType::DoubleHeavy => Some("double-heavy"),
            ChartType::DoubleBeginner => Some("double-beginner"),
            ChartType::DoubleChallenge => Some("double-challenge"),
            ChartType::DoubleBattle => Some("double-battle"),
            ChartType::Solo3Basic => Some("solo3-basic"),
            ChartType::Solo3Standard => Some("solo3-standard"),
            ChartType::Solo3Heavy => Some("solo3-heavy"),
            ChartType::Solo3Beginner => Some("solo3-beginner"),
            ChartType::Solo3Challenge => Some("solo3-challenge"),
            ChartType::Unknown(_) => None,
        }
    }

    pub fn from_name(name: &str) -> Option<ChartType> {
        match name {
            "single-basic" => Some(ChartType::SingleBasic),
            "single-standard" => Some(ChartType::SingleStandard),
            "single-heavy" => Some(ChartType::SingleHeavy),
            "single-beginner" => Some(ChartType::SingleBeginner),
            "single-challenge" => Some(ChartType::SingleChallenge),
            "solo-basic" => Some(ChartType::SoloBasic),
            "solo-standard" => Some(ChartType::SoloStandard),
            "solo-heavy" => Some(ChartType::SoloHeavy),
            "solo-beginner" => Some(ChartType::SoloBeginner),
            "solo-challenge" => Some(ChartType::SoloChallenge),
            "double-basic" => Some(ChartType::DoubleBasic),
            "double-standard" => Some(ChartType::DoubleStandard),
            "double-heavy" => Some(ChartType::DoubleHeavy),
            "double-beginner" => Some(ChartType::DoubleBeginner),
            "double-challenge" => Some(ChartType::DoubleChallenge),
            "double-battle" => Some(ChartType::DoubleBattle),
            "solo3-basic" => Some(ChartType::Solo3Basic),
            "solo3-standard" => Some(ChartType::Solo3Standard),
            "solo3-heavy" => Some(ChartType::Solo3Heavy),
            "solo3-beginner" => Some(ChartType::Solo3Beginner),
            "solo3-challenge" => Some(ChartType::Solo3Challenge),
            _ => None,
        }
    }

    /// Solo layouts use the 6-arrow bit mapping instead of the p1/p2 split.
    pub const fn is_solo(&self) -> bool {
        matches!(
            self,
            ChartType::SoloBasic
                | ChartType::SoloStandard
                | ChartType::SoloHeavy
                | ChartType::SoloBeginner
                | ChartType::SoloChallenge
                | ChartType::Solo3Basic
                | ChartType::Solo3Standard
                | ChartType::Solo3Heavy
                | ChartType::Solo3Beginner
                | ChartType::Solo3Challenge
        )
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChartType::Unknown(code) => write!(f, "{code:#06x}"),
            named => write!(f, "{}", named.name().unwrap_or("unnamed")),
        }
    }
}

/// JSON form of a chart type: known name or passthrough integer.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChartTypeRepr {
    Name(String),
    Code(u16),
}

impl TryFrom<ChartTypeRepr> for ChartType {
    type Error = String;

    fn try_from(repr: ChartTypeRepr) -> Result<ChartType, String> {
        match repr {
            ChartTypeRepr::Name(name) => {
                ChartType::from_name(&name).ok_or_else(|| format!("unknown chart type `{name}`"))
            }
            ChartTypeRepr::Code(code) => Ok(ChartType::from_code(code)),
        }
    }
}

impl From<ChartType> for ChartTypeRepr {
    fn from(chart_type: ChartType) -> ChartTypeRepr {
        match chart_type {
            ChartType::Unknown(code) => ChartTypeRepr::Code(code),
            named => ChartTypeRepr::Name(named.name().unwrap_or("unnamed").to_string()),
        }
    }
}

/// A single playable lane (or the all-lanes shock marker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    #[serde(rename = "p1_l")]
    P1Left,
    #[serde(rename = "p1_d")]
    P1Down,
    #[serde(rename = "p1_u")]
    P1Up,
    #[serde(rename = "p1_r")]
    P1Right,
    #[serde(rename = "p2_l")]
    P2Left,
    #[serde(rename = "p2_d")]
    P2Down,
    #[serde(rename = "p2_u")]
    P2Up,
    #[serde(rename = "p2_r")]
    P2Right,
    #[serde(rename = "solo_l")]
    SoloLeft,
    #[serde(rename = "solo_d")]
    SoloDown,
    #[serde(rename = "solo_u")]
    SoloUp,
    #[serde(rename = "solo_r")]
    SoloRight,
    #[serde(rename = "solo_ul")]
    SoloUpLeft,
    #[serde(rename = "solo_ur")]
    SoloUpRight,
    #[serde(rename = "shock")]
    Shock,
}

/// Special markers attached to a note event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraMarker {
    #[serde(rename = "freeze_start")]
    FreezeStart,
    #[serde(rename = "freeze_end")]
    FreezeEnd,
}

/// Chart housekeeping event code. Unrecognized codes pass through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventCodeRepr", into = "EventCodeRepr")]
pub enum EventCode {
    /// Display "Ready?"
    Start,
    /// End of chart
    End,
    /// End of stage, move to the result screen
    Clear,
    Unknown(u16),
}

impl EventCode {
    pub const fn from_code(code: u16) -> EventCode {
        match code {
            0x0202 => EventCode::Start,
            0x0302 => EventCode::End,
            0x0402 => EventCode::Clear,
            code => EventCode::Unknown(code),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EventCodeRepr {
    Name(String),
    Code(u16),
}

impl TryFrom<EventCodeRepr> for EventCode {
    type Error = String;

    fn try_from(repr: EventCodeRepr) -> Result<EventCode, String> {
        match repr {
            EventCodeRepr::Name(name) => match name.as_str() {
                "start" => Ok(EventCode::Start),
                "end" => Ok(EventCode::End),
                "clear" => Ok(EventCode::Clear),
                name => Err(format!("unknown event code `{name}`")),
            },
            EventCodeRepr::Code(code) => Ok(EventCode::from_code(code)),
        }
    }
}

impl From<EventCode> for EventCodeRepr {
    fn from(code: EventCode) -> EventCodeRepr {
        match code {
            EventCode::Start => EventCodeRepr::Name("start".to_string()),
            EventCode::End => EventCodeRepr::Name("end".to_string()),
            EventCode::Clear => EventCodeRepr::Name("clear".to_string()),
            EventCode::Unknown(code) => EventCodeRepr::Code(code),
        }
    }
}

/// Housekeeping event with resolved timing.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub offset: i32,
    pub measure: MeasureLocation,
    pub timestamp_ms: f64,
    pub bpm: f64,
    pub event: EventCode,
}

/// Cabinet lamp cue; the state byte is opaque and passed through.
#[derive(Debug, Clone, PartialEq)]
pub struct LampEvent {
    pub offset: i32,
    pub measure: MeasureLocation,
    pub timestamp_ms: f64,
    pub bpm: f64,
    pub state: u8,
}

/// One decoded step: lanes hit plus freeze markers.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub offset: i32,
    pub measure: MeasureLocation,
    pub timestamp_ms: f64,
    pub bpm: f64,
    pub notes: Vec<NoteName>,
    pub extra: Vec<ExtraMarker>,
}

/// A decoded notes chunk: one difficulty's event list.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub chart_type: ChartType,
    pub events: Vec<NoteEvent>,
}

/// Background animation cue.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimEvent {
    pub offset: i32,
    pub measure: MeasureLocation,
    pub timestamp_ms: f64,
    pub bpm: f64,
    pub cmd: u8,
    pub param: u16,
    pub clip: String,
}

/// A fully decoded chunk, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedChunk {
    Tempo(TempoTable),
    Events(Vec<TimedEvent>),
    Notes(Chart),
    Lamps(Vec<LampEvent>),
    Anim(Vec<AnimEvent>),
}

/// Split a CSQ buffer into raw chunks.
///
/// Each chunk leads with a 4-byte LE length that covers the length prefix
/// and the 2-byte tag. The stream ends when 4 or fewer bytes remain (a
/// trailing zero length word is a valid terminator). A declared length past
/// the buffer end clamps to the buffer; a length below 6 cannot make
/// progress and is malformed.
pub fn split_chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>, ChartError> {
    let mut chunks = Vec::new();
    let mut cursor = 0usize;
    while data.len().saturating_sub(cursor) > 4 {
        let remaining = &data[cursor..];
        if remaining.len() < 6 {
            return Err(ChartError::ParsingError(format!(
                "truncated chunk header at byte {cursor}"
            )));
        }
        let length =
            u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]) as usize;
        if length < 6 {
            return Err(ChartError::ParsingError(format!(
                "chunk length {length} at byte {cursor} too small"
            )));
        }
        let tag = u16::from_le_bytes([remaining[4], remaining[5]]);
        let kind = ChunkKind::from_tag(tag).ok_or(ChartError::UnknownChunkType {
            tag,
            offset: cursor + 4,
        })?;
        let payload = slice_range(data, cursor + 6, cursor + length);
        log::debug!("chunk {kind:?} at byte {cursor}, {} payload bytes", payload.len());
        chunks.push(Chunk { kind, payload });
        cursor += length;
    }
    Ok(chunks)
}

/// Decode a CSQ/SSQ buffer into its chunk sequence.
///
/// The first tempo chunk is decoded ahead of everything else because every
/// other decoder needs the tempo table; the chunks themselves are then
/// decoded in stream order, tempo included.
pub fn parse_csq_data(data: &[u8]) -> Result<Vec<DecodedChunk>, ChartError> {
    let chunks = split_chunks(data)?;
    let tempo = chunks
        .iter()
        .find(|c| c.kind == ChunkKind::Tempo)
        .ok_or(ChartError::MissingTempoChunk)?;
    let table = parse_tempo_chunk(tempo.payload)?;
    log::debug!(
        "tempo table: tick_rate {}, {} segments",
        table.tick_rate,
        table.segments.len()
    );
    chunks
        .iter()
        .map(|chunk| decode_chunk(chunk, &table))
        .collect()
}

fn decode_chunk(chunk: &Chunk, table: &TempoTable) -> Result<DecodedChunk, ChartError> {
    match chunk.kind {
        ChunkKind::Tempo => parse_tempo_chunk(chunk.payload).map(DecodedChunk::Tempo),
        ChunkKind::Events => parse_events_chunk(chunk.payload, table).map(DecodedChunk::Events),
        ChunkKind::Notes => parse_notes_chunk(chunk.payload, table).map(DecodedChunk::Notes),
        ChunkKind::Lamps => parse_lamp_chunk(chunk.payload, table).map(DecodedChunk::Lamps),
        ChunkKind::Anim => parse_anim_chunk(chunk.payload, table).map(DecodedChunk::Anim),
    }
}

fn malformed<'a>(
    kind: ChunkKind,
) -> impl FnOnce(nom::Err<nom::error::Error<&'a [u8]>>) -> ChartError {
    move |err| {
        log::debug!("nom failure in {kind:?} chunk: {err:?}");
        ChartError::ParsingError(format!("malformed {kind:?} chunk"))
    }
}

/// Chunk header: leading short (tick rate, version or zero depending on the
/// chunk type), event count, reserved zero short.
fn parse_chunk_header(i: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (i, lead) = parse_u16(i)?;
    let (i, event_count) = parse_u16(i)?;
    let (i, _) = parse_reserved(i)?;
    Ok((i, (lead, event_count)))
}

/// Decode a tempo chunk into the file's tempo table.
pub fn parse_tempo_chunk(payload: &[u8]) -> Result<TempoTable, ChartError> {
    let (_rest, (tick_rate, offsets, data)) = (|i| {
        let (i, (tick_rate, n)) = parse_chunk_header(i)?;
        let (i, offsets) = count(parse_int, n as usize).parse(i)?;
        let (i, data) = count(parse_int, n as usize).parse(i)?;
        Ok((i, (tick_rate, offsets, data)))
    })(payload)
    .map_err(malformed(ChunkKind::Tempo))?;
    Ok(TempoTable::from_points(tick_rate, &offsets, &data))
}

/// Decode a housekeeping events chunk.
pub fn parse_events_chunk(
    payload: &[u8],
    table: &TempoTable,
) -> Result<Vec<TimedEvent>, ChartError> {
    let (_rest, (version, offsets, codes)) = (|i| {
        let (i, (version, n)) = parse_chunk_header(i)?;
        let (i, offsets) = count(parse_int, n as usize).parse(i)?;
        let (i, codes) = count(parse_u16, n as usize).parse(i)?;
        Ok((i, (version, offsets, codes)))
    })(payload)
    .map_err(malformed(ChunkKind::Events))?;
    if version != 1 {
        return Err(ChartError::ParsingError(format!(
            "unsupported events chunk version {version}"
        )));
    }
    offsets
        .iter()
        .zip(codes)
        .map(|(&offset, code)| {
            Ok(TimedEvent {
                offset,
                measure: measure_of(offset),
                timestamp_ms: table.timestamp_ms(offset)?,
                bpm: table.bpm_at(offset)?,
                event: EventCode::from_code(code),
            })
        })
        .collect()
}

/// Decode a lamp cue chunk; states are raw bytes, passed through.
pub fn parse_lamp_chunk(payload: &[u8], table: &TempoTable) -> Result<Vec<LampEvent>, ChartError> {
    let (_rest, (version, offsets, states)) = (|i| {
        let (i, (version, n)) = parse_chunk_header(i)?;
        let (i, offsets) = count(parse_int, n as usize).parse(i)?;
        let (i, states) = count(parse_u8, n as usize).parse(i)?;
        Ok((i, (version, offsets, states)))
    })(payload)
    .map_err(malformed(ChunkKind::Lamps))?;
    if version != 1 {
        return Err(ChartError::ParsingError(format!(
            "unsupported lamp chunk version {version}"
        )));
    }
    offsets
        .iter()
        .zip(states)
        .map(|(&offset, state)| {
            Ok(LampEvent {
                offset,
                measure: measure_of(offset),
                timestamp_ms: table.timestamp_ms(offset)?,
                bpm: table.bpm_at(offset)?,
                state,
            })
        })
        .collect()
}

fn pop_byte(stream: &mut std::slice::Iter<'_, u8>, offset: i32) -> Result<u8, ChartError> {
    stream.next().copied().ok_or_else(|| {
        ChartError::ParsingError(format!("note stream exhausted at offset {offset}"))
    })
}

/// Lane for a set bit of the note bitfield.
fn note_for_bit(bit: u8, solo: bool, offset: i32) -> Result<NoteName, ChartError> {
    let name = if solo {
        match bit {
            0 => NoteName::SoloLeft,
            1 => NoteName::SoloDown,
            2 => NoteName::SoloUp,
            3 => NoteName::SoloRight,
            4 => NoteName::SoloUpLeft,
            6 => NoteName::SoloUpRight,
            bit => return Err(ChartError::UnknownNoteBit { bit, offset }),
        }
    } else {
        match bit {
            0 => NoteName::P1Left,
            1 => NoteName::P1Down,
            2 => NoteName::P1Up,
            3 => NoteName::P1Right,
            4 => NoteName::P2Left,
            5 => NoteName::P2Down,
            6 => NoteName::P2Up,
            7 => NoteName::P2Right,
            _ => unreachable!("note bitfields are 8 bits"),
        }
    };
    Ok(name)
}

/// Decode a notes chunk into a [`Chart`].
///
/// The note bitfield stream is one byte per event, padded to an even length;
/// a zero byte is an escape that pulls the real bitfield plus a flags byte
/// from the trailing extra stream. After decoding, events are sorted by
/// offset and each freeze_end is paired backward with the nearest earlier
/// event holding exactly the same note list.
pub fn parse_notes_chunk(payload: &[u8], table: &TempoTable) -> Result<Chart, ChartError> {
    let (after_offsets, (code, offsets)) = (|i| {
        let (i, (code, n)) = parse_chunk_header(i)?;
        let (i, offsets) = count(parse_int, n as usize).parse(i)?;
        Ok((i, (code, offsets)))
    })(payload)
    .map_err(malformed(ChunkKind::Notes))?;
    let chart_type = ChartType::from_code(code);
    log::debug!("notes chunk: {chart_type} with {} events", offsets.len());

    // note bytes, padded to an even boundary, then the extra stream
    let note_len = offsets.len() + (offsets.len() & 1);
    let mut note_stream = slice_range(after_offsets, 0, note_len).iter();
    let mut extra_stream = slice_from(after_offsets, note_len).iter();

    let mut events = Vec::with_capacity(offsets.len());
    for offset in offsets {
        let mut note_raw = pop_byte(&mut note_stream, offset)?;
        let mut extra = Vec::new();
        if note_raw == 0 {
            note_raw = pop_byte(&mut extra_stream, offset)?;
            let flags = pop_byte(&mut extra_stream, offset)?;
            if flags & 1 != 0 {
                extra.push(ExtraMarker::FreezeEnd);
            }
            if flags & !1 != 0 {
                return Err(ChartError::UnknownExtraFlags { flags, offset });
            }
        }

        let mut notes = Vec::new();
        if note_raw == 0xff {
            notes.push(NoteName::Shock);
        } else {
            for bit in 0..8 {
                if note_raw & (1 << bit) != 0 {
                    notes.push(note_for_bit(bit, chart_type.is_solo(), offset)?);
                }
            }
        }

        events.push(NoteEvent {
            offset,
            measure: measure_of(offset),
            timestamp_ms: table.timestamp_ms(offset)?,
            bpm: table.bpm_at(offset)?,
            notes,
            extra,
        });
    }

    events.sort_by_key(|e| e.offset);

    // pair each freeze_end with the nearest preceding event holding the
    // same notes; an orphan freeze_end stays untagged
    for i in 0..events.len() {
        if events[i].extra.contains(&ExtraMarker::FreezeEnd) {
            let notes = events[i].notes.clone();
            if let Some(j) = (0..i).rev().find(|&j| events[j].notes == notes) {
                events[j].extra.push(ExtraMarker::FreezeStart);
            }
        }
    }

    Ok(Chart { chart_type, events })
}

/// Clip names packed 6 characters into 30 bits, 5 bits per character.
fn unpack_clip_name(mut packed: u32) -> String {
    let mut name = String::new();
    for _ in 0..6 {
        let c = (packed & 0x1f) as u8;
        if c < 0x1b {
            name.push(char::from(b'a' + c));
        }
        packed >>= 5;
    }
    name
}

/// Clip indices 0x14..=0x1d refer to clips shared across files rather than
/// the chunk's own filename list.
const fn common_clip(index: u8) -> Option<&'static str> {
    match index {
        0x14 => Some("end"),
        0x15 => Some("ccclma"),
        0x16 => Some("ccclca"),
        0x17 => Some("ccddra"),
        0x18 => Some("ccdrga"),
        0x19 => Some("ccheaa"),
        0x1a => Some("ccitaa"),
        0x1b => Some("ccltaa"),
        0x1c => Some("ccrgca"),
        0x1d => Some("ccsaca"),
        _ => None,
    }
}

/// Decode a background animation chunk.
pub fn parse_anim_chunk(payload: &[u8], table: &TempoTable) -> Result<Vec<AnimEvent>, ChartError> {
    let (_rest, (lead, offsets, records, clip_names)) = (|i| {
        let (i, (lead, n)) = parse_chunk_header(i)?;
        let (i, offsets) = count(parse_int, n as usize).parse(i)?;
        let (i, records) = count(take(4usize), n as usize).parse(i)?;
        let (i, name_count) = parse_u32(i)?;
        let (i, packed_names) = count(parse_u32, name_count as usize).parse(i)?;
        let clip_names: Vec<String> = packed_names.into_iter().map(unpack_clip_name).collect();
        Ok((i, (lead, offsets, records, clip_names)))
    })(payload)
    .map_err(malformed(ChunkKind::Anim))?;
    if lead != 0 {
        return Err(ChartError::ParsingError(format!(
            "unsupported anim chunk header {lead:#06x}"
        )));
    }
    offsets
        .iter()
        .zip(records)
        .map(|(&offset, record)| {
            let cmd = record[0];
            let clip_index = record[1];
            let param = u16::from_le_bytes([record[2], record[3]]);
            let clip = match common_clip(clip_index) {
                Some(name) => name.to_string(),
                None => clip_names
                    .get(clip_index as usize)
                    .cloned()
                    .ok_or_else(|| {
                        ChartError::ParsingError(format!(
                            "clip index {clip_index} out of range at offset {offset}"
                        ))
                    })?,
            };
            Ok(AnimEvent {
                offset,
                measure: measure_of(offset),
                timestamp_ms: table.timestamp_ms(offset)?,
                bpm: table.bpm_at(offset)?,
                cmd,
                param,
                clip,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_type_codes() {
        assert_eq!(ChartType::from_code(0x0214), ChartType::SingleStandard);
        assert_eq!(ChartType::from_code(0xf316), ChartType::Solo3Heavy);
        assert_eq!(ChartType::from_code(0x1024), ChartType::DoubleBattle);
        assert_eq!(ChartType::from_code(0xbeef), ChartType::Unknown(0xbeef));
        assert!(ChartType::SoloHeavy.is_solo());
        assert!(ChartType::Solo3Basic.is_solo());
        assert!(!ChartType::SingleHeavy.is_solo());
        assert!(!ChartType::Unknown(0xbeef).is_solo());
    }

    #[test]
    fn test_unpack_clip_name() {
        // 'a' (0), 'b', 'c' then three blank slots (values >= 0x1b)
        let packed = (1 << 5) | (2 << 10) | (0x1f << 15) | (0x1f << 20) | (0x1f << 25);
        assert_eq!(unpack_clip_name(packed), "abc");
        assert_eq!(unpack_clip_name(0x3fffffff), "");
    }
}
