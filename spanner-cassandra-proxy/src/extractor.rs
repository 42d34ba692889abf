//! Turns a request frame's referenced prepared-query ids into either an
//! outgoing attachments map, or an `UNPREPARED` short-circuit response when
//! the cache doesn't know about one of them yet.

use std::collections::HashMap;

use bytes::Bytes;
use cassandra_proto::{frame::FrameError, ErrorFrame, Frame};

use crate::{
    cache::{prepared_id_key, AttachmentsCache},
    metrics::Metrics,
};

pub enum Extracted {
    /// All referenced prepared ids were found in the cache (or there were
    /// none); forward the request with these attachments.
    Attachments(HashMap<String, String>),
    /// At least one referenced prepared id was missing; the caller should
    /// write this frame and skip calling the Adapter entirely.
    Unprepared(Bytes, i16),
}

pub fn extract(
    cache: &AttachmentsCache,
    frame: &Frame,
    metrics: &Metrics,
) -> Result<Extracted, FrameError> {
    let query_ids = cassandra_proto::extract_prepared_ids(frame.opcode(), frame.body())?;

    let mut attachments = HashMap::with_capacity(query_ids.len());
    for query_id in query_ids {
        let key = prepared_id_key(&query_id);
        match cache.get(&key) {
            Some(value) => {
                metrics.cache_hit();
                attachments.insert(key, value);
            }
            None => {
                metrics.cache_miss();
                return Ok(Extracted::Unprepared(query_id, frame.stream_id()));
            }
        }
    }

    Ok(Extracted::Attachments(attachments))
}

/// Builds the `UNPREPARED` response frame for a missing query id.
pub fn unprepared_frame(query_id: Bytes, stream_id: i16) -> Bytes {
    ErrorFrame::unprepared(query_id).encode(stream_id)
}

#[cfg(test)]
mod tests {
    use cassandra_proto::frame::{FrameFlags, FrameHeader, ProtocolVersion};

    use super::*;

    fn execute_frame(id: &[u8], stream: i16) -> Frame {
        let mut body = vec![];
        body.extend_from_slice(&(id.len() as u16).to_be_bytes());
        body.extend_from_slice(id);
        body.extend_from_slice(&0i16.to_be_bytes());
        body.push(0);

        let mut bytes = vec![0x04, 0x00];
        bytes.extend_from_slice(&stream.to_be_bytes());
        bytes.push(0x0A);
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&body);

        Frame {
            header: FrameHeader {
                version: ProtocolVersion::V4,
                flags: FrameFlags::empty(),
                stream,
                opcode: 0x0A,
                body_len: body.len() as i32,
            },
            bytes: bytes.into(),
        }
    }

    #[test]
    fn cached_id_is_forwarded_as_an_attachment() {
        let cache = AttachmentsCache::new(4);
        cache.put(prepared_id_key(b"QID"), "ATT".into());

        let frame = execute_frame(b"QID", 7);
        match extract(&cache, &frame, &Metrics::new(false)).unwrap() {
            Extracted::Attachments(map) => {
                assert_eq!(map.get("pqid/QID"), Some(&"ATT".to_string()));
                assert_eq!(map.len(), 1);
            }
            Extracted::Unprepared(..) => panic!("expected attachments"),
        }
    }

    #[test]
    fn missing_id_short_circuits() {
        let cache = AttachmentsCache::new(4);
        let frame = execute_frame(b"QID", 7);

        match extract(&cache, &frame, &Metrics::new(false)).unwrap() {
            Extracted::Unprepared(id, stream) => {
                assert_eq!(id.as_ref(), b"QID");
                assert_eq!(stream, 7);
            }
            Extracted::Attachments(_) => panic!("expected unprepared"),
        }
    }
}
