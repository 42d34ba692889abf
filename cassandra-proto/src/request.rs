//! Decodes just enough of a request frame to locate prepared-query
//! identifiers. This proxy never builds a full CQL request model — that is
//! explicitly out of scope (see spec Non-goals: no CQL server-side
//! semantics) — it only needs the `queryId` bytes referenced by `EXECUTE`
//! and `BATCH`.

use bytes::Bytes;
use nom::number::complete::{be_i64, be_u16, be_u8};
use num_enum::TryFromPrimitive;

use crate::{frame::FrameError, parse};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive)]
#[repr(u8)]
pub enum RequestOpcode {
    Startup = 0x01,
    Options = 0x05,
    Query = 0x07,
    Prepare = 0x09,
    Execute = 0x0A,
    Register = 0x0B,
    Batch = 0x0D,
    AuthResponse = 0x0F,
}

impl RequestOpcode {
    pub fn from_u8(opcode: u8) -> Option<Self> {
        Self::try_from(opcode).ok()
    }
}

/// Extracts the ordered list of prepared-query identifiers referenced by an
/// `EXECUTE` or `BATCH` request. Any other opcode yields an empty list.
pub fn extract_prepared_ids(opcode: u8, body: &[u8]) -> Result<Vec<Bytes>, FrameError> {
    match RequestOpcode::from_u8(opcode) {
        Some(RequestOpcode::Execute) => {
            let (_, id) = parse::short_bytes(body).map_err(|_| FrameError::MalformedPayload)?;
            Ok(vec![Bytes::copy_from_slice(id)])
        }
        Some(RequestOpcode::Batch) => extract_from_batch(body),
        _ => Ok(Vec::new()),
    }
}

const BATCH_FLAG_SERIAL_CONSISTENCY: u8 = 0x10;
const BATCH_FLAG_TIMESTAMP: u8 = 0x20;

fn extract_from_batch(body: &[u8]) -> Result<Vec<Bytes>, FrameError> {
    let fail = |_| FrameError::MalformedPayload;

    // [u8 batch_type][u16 statement count]
    let (mut rest, _batch_type) = be_u8::<_, nom::error::Error<_>>(body).map_err(fail)?;
    let (r, statement_count) = be_u16::<_, nom::error::Error<_>>(rest).map_err(fail)?;
    rest = r;

    let mut ids = Vec::new();
    for _ in 0..statement_count {
        let (r, kind) = be_u8::<_, nom::error::Error<_>>(rest).map_err(fail)?;
        match kind {
            // inline query string: skip it, it carries no prepared-id
            0 => {
                let (r, _query) = parse::long_string(r).map_err(fail)?;
                let (r, values_count) = be_u16::<_, nom::error::Error<_>>(r).map_err(fail)?;
                rest = skip_values(r, values_count)?;
            }
            // prepared statement reference: collect its id
            1 => {
                let (r, id) = parse::short_bytes(r).map_err(fail)?;
                ids.push(Bytes::copy_from_slice(id));
                let (r, values_count) = be_u16::<_, nom::error::Error<_>>(r).map_err(fail)?;
                rest = skip_values(r, values_count)?;
            }
            _ => return Err(FrameError::MalformedPayload),
        }
    }

    let (r, _consistency) = be_u16::<_, nom::error::Error<_>>(rest).map_err(fail)?;
    let (r, flags) = be_u8::<_, nom::error::Error<_>>(r).map_err(fail)?;
    rest = r;

    if flags & BATCH_FLAG_SERIAL_CONSISTENCY != 0 {
        let (r, _) = be_u16::<_, nom::error::Error<_>>(rest).map_err(fail)?;
        rest = r;
    }
    if flags & BATCH_FLAG_TIMESTAMP != 0 {
        let (r, _) = be_i64::<_, nom::error::Error<_>>(rest).map_err(fail)?;
        rest = r;
    }

    let _ = rest;
    Ok(ids)
}

fn skip_values(mut rest: &[u8], count: u16) -> Result<&[u8], FrameError> {
    for _ in 0..count {
        let (r, _) = parse::value(rest).map_err(|_| FrameError::MalformedPayload)?;
        rest = r;
    }
    Ok(rest)
}
