use bitflags::bitflags;
use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_LEN: usize = 9;

bitflags! {
    /// Frame Flags, as laid out in the native protocol v4 spec.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        const COMPRESSION = 1 << 0;
        const TRACING = 1 << 1;
        const CUSTOM_PAYLOAD = 1 << 2;
        const WARNING = 1 << 3;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtocolVersion {
    V4,
    Unsupported(u8),
}

impl ProtocolVersion {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(..))
    }

    pub fn from_request(value: u8) -> Self {
        match value {
            0x04 => Self::V4,
            x => Self::Unsupported(x),
        }
    }
}

/// The 9-byte header of a Cassandra native protocol v4 frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameHeader {
    pub version: ProtocolVersion,
    pub flags: FrameFlags,
    pub stream: i16,
    pub opcode: u8,
    pub body_len: i32,
}

/// A full frame: header plus exactly `body_len` bytes, kept as a single
/// contiguous span so it can be forwarded to the Adapter untouched.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    pub bytes: Bytes,
}

impl Frame {
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    pub fn stream_id(&self) -> i16 {
        self.header.stream
    }

    pub fn opcode(&self) -> u8 {
        self.header.opcode
    }
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Server error during request processing: Payload is not well formed.")]
    MalformedPayload,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads exactly one frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF observed before any byte of the header
/// is read — the only legitimate termination signal. Any other short read
/// (1-8 header bytes, or a truncated body) is a malformed payload.
pub async fn read_frame(
    reader: &mut (impl AsyncRead + Unpin),
) -> Result<Option<Frame>, FrameError> {
    let mut header_buf = [0u8; HEADER_LEN];

    let first = reader.read(&mut header_buf[..1]).await?;
    if first == 0 {
        return Ok(None);
    }

    read_exact_or_malformed(reader, &mut header_buf[1..]).await?;

    let body_len = (&header_buf[5..9]).get_i32();
    if body_len < 0 {
        return Err(FrameError::MalformedPayload);
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len as usize);
    buf.extend_from_slice(&header_buf);
    buf.resize(HEADER_LEN + body_len as usize, 0);
    read_exact_or_malformed(reader, &mut buf[HEADER_LEN..]).await?;

    let header = FrameHeader {
        version: ProtocolVersion::from_request(header_buf[0]),
        flags: FrameFlags::from_bits(header_buf[1]).ok_or(FrameError::MalformedPayload)?,
        stream: i16::from_be_bytes([header_buf[2], header_buf[3]]),
        opcode: header_buf[4],
        body_len,
    };

    Ok(Some(Frame {
        header,
        bytes: buf.freeze(),
    }))
}

async fn read_exact_or_malformed(
    reader: &mut (impl AsyncRead + Unpin),
    buf: &mut [u8],
) -> Result<(), FrameError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(FrameError::MalformedPayload)
        }
        Err(e) => Err(FrameError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn frame_bytes(stream: i16, opcode: u8, body: &[u8]) -> Vec<u8> {
        let mut v = vec![0x04, 0x00];
        v.extend_from_slice(&stream.to_be_bytes());
        v.push(opcode);
        v.extend_from_slice(&(body.len() as i32).to_be_bytes());
        v.extend_from_slice(body);
        v
    }

    #[tokio::test]
    async fn reads_a_well_formed_frame() {
        let body = b"SELECT * FROM T";
        let bytes = frame_bytes(1, 0x07, body);
        let mut cursor = Cursor::new(bytes);

        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame.stream_id(), 1);
        assert_eq!(frame.opcode(), 0x07);
        assert_eq!(frame.body(), body);
    }

    #[tokio::test]
    async fn clean_eof_before_any_byte_yields_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_header_is_malformed() {
        let mut cursor = Cursor::new(vec![0x04, 0x00, 0x00, 0x01]);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload));
    }

    #[tokio::test]
    async fn truncated_body_is_malformed() {
        let mut bytes = frame_bytes(1, 0x07, b"0123456789");
        bytes.truncate(bytes.len() - 3);
        let mut cursor = Cursor::new(bytes);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload));
    }

    #[tokio::test]
    async fn negative_body_length_is_malformed() {
        let mut bytes = frame_bytes(1, 0x07, b"");
        bytes[5..9].copy_from_slice(&(-1i32).to_be_bytes());
        let mut cursor = Cursor::new(bytes);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload));
    }

    #[tokio::test]
    async fn successive_reads_consume_the_stream_up_to_a_frame_boundary() {
        let mut bytes = frame_bytes(1, 0x07, b"first");
        bytes.extend(frame_bytes(2, 0x07, b"second"));
        let mut cursor = Cursor::new(bytes);

        let a = read_frame(&mut cursor).await.unwrap().unwrap();
        let b = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(a.body(), b"first");
        assert_eq!(b.body(), b"second");
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }
}
