use nom::combinator::verify;
use nom::{IResult, Parser, number};

/// Parse unsigned byte
pub fn parse_u8(i: &[u8]) -> IResult<&[u8], u8> {
    number::complete::le_u8(i)
}

/// Parse unsigned short
pub fn parse_u16(i: &[u8]) -> IResult<&[u8], u16> {
    number::complete::le_u16(i)
}

/// Parse unsigned 32
pub fn parse_u32(i: &[u8]) -> IResult<&[u8], u32> {
    number::complete::le_u32(i)
}

/// Parse signed 32
pub fn parse_int(i: &[u8]) -> IResult<&[u8], i32> {
    number::complete::le_i32(i)
}

/// Parse a reserved short that must hold zero
pub fn parse_reserved(i: &[u8]) -> IResult<&[u8], u16> {
    verify(number::complete::le_u16, |v| *v == 0).parse(i)
}

/// Slice from `start`, clamped to the end of the buffer.
///
/// Chunk payloads declare their own extents; a declared extent past the end
/// of the input is truncation at stream end, not a reason to panic.
pub fn slice_from(i: &[u8], start: usize) -> &[u8] {
    &i[start.min(i.len())..]
}

/// Slice `[start, end)`, both bounds clamped to the end of the buffer.
pub fn slice_range(i: &[u8], start: usize, end: usize) -> &[u8] {
    let start = start.min(i.len());
    let end = end.max(start).min(i.len());
    &i[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reserved() {
        assert_eq!(parse_reserved(&[0x00, 0x00, 0xaa]), Ok((&[0xaa][..], 0)));
        assert!(parse_reserved(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn test_slice_range_clamps() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(slice_range(&data, 1, 3), &[2, 3]);
        assert_eq!(slice_range(&data, 2, 10), &[3, 4]);
        assert_eq!(slice_range(&data, 9, 12), &[] as &[u8]);
        assert_eq!(slice_from(&data, 10), &[] as &[u8]);
    }
}
