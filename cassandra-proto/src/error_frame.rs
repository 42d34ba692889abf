//! Synthesis of the two response frames the proxy itself produces:
//! `SERVER_ERROR` and `UNPREPARED`. Modeled as a tagged enum per the
//! project's preference for small enums over class-based dispatch.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{frame::HEADER_LEN, write};

const OPCODE_ERROR: u8 = 0x00;
const ERROR_CODE_SERVER_ERROR: i32 = 0x0000;
const ERROR_CODE_UNPREPARED: i32 = 0x2500;
const RESPONSE_VERSION: u8 = 0x84;

#[derive(Debug, Clone)]
pub enum ErrorFrame {
    ServerError { message: String },
    Unprepared { query_id: Bytes },
}

impl ErrorFrame {
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    pub fn unprepared(query_id: Bytes) -> Self {
        Self::Unprepared { query_id }
    }

    /// Serializes this error as a complete frame (header + body) addressed
    /// to `stream_id`, the `streamId` of the request that triggered it (or
    /// `0` if no request was successfully parsed).
    pub fn encode(&self, stream_id: i16) -> Bytes {
        let mut body = BytesMut::new();
        match self {
            ErrorFrame::ServerError { message } => {
                body.put_i32(ERROR_CODE_SERVER_ERROR);
                write::string(&mut body, message);
            }
            ErrorFrame::Unprepared { query_id } => {
                body.put_i32(ERROR_CODE_UNPREPARED);
                write::string(&mut body, "Unprepared query");
                write::short_bytes(&mut body, query_id);
            }
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
        frame.put_u8(RESPONSE_VERSION);
        frame.put_u8(0); // flags
        frame.put_i16(stream_id);
        frame.put_u8(OPCODE_ERROR);
        frame.put_u32(body.len() as u32);
        frame.extend_from_slice(&body);
        frame.freeze()
    }
}
