//! Minimal nom parsers for the handful of CQL wire types the extractor needs
//! to skip over inline values while walking a `BATCH` body.

use nom::{
    bytes::complete::take,
    combinator::map,
    error::{self, ErrorKind},
    number::complete,
    IResult,
};

pub fn short_bytes(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, len) = complete::be_u16(input)?;
    take(len as usize)(rest)
}

pub fn long_string(input: &[u8]) -> IResult<&[u8], &str> {
    let (rest, n) = complete::be_u32(input)?;
    let (rest, bytes) = take(n as usize)(rest)?;
    let s = std::str::from_utf8(bytes)
        .map_err(|_| nom::Err::Failure(error::Error::new(input, ErrorKind::Char)))?;
    Ok((rest, s))
}

/// A `[value]`: a 4-byte signed length followed by that many bytes, with the
/// sentinel lengths `-1` (empty) and `-2` (null) from the native protocol.
pub fn value(input: &[u8]) -> IResult<&[u8], Option<&[u8]>> {
    let (rest, len) = complete::be_i32(input)?;
    match len {
        -1 => Ok((rest, Some(&[]))),
        -2 => Ok((rest, None)),
        _ if len < -2 => Err(nom::Err::Failure(error::Error::new(
            input,
            ErrorKind::NonEmpty,
        ))),
        _ => map(take(len as usize), Some)(rest),
    }
}
