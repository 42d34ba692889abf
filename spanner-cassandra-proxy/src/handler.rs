//! The per-connection pipeline: read one frame, extract prepared-id
//! attachments (possibly short-circuiting with `UNPREPARED`), forward to
//! the Adapter, write the response, and loop until EOF or a socket error.
//!
//! State machine: `IDLE -> READING -> TRANSLATING -> WRITING -> IDLE`, with
//! `CLOSED` as the terminal state once the loop exits. There is no
//! pipelining state: a client's logical `streamId` multiplexing is not
//! reflected here because one handler serves one request at a time: a
//! client wanting concurrency opens more connections.

use std::sync::Arc;

use cassandra_proto::{read_frame, ErrorFrame, FrameError};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
};

use crate::{
    adapter::AdapterClient,
    cache::AttachmentsCache,
    extractor::{self, Extracted},
    metrics::Metrics,
    session::SessionManager,
};

const MALFORMED_PAYLOAD_MESSAGE: &str =
    "Server error during request processing: Payload is not well formed.";

#[derive(Clone)]
pub struct HandlerContext {
    pub cache: Arc<AttachmentsCache>,
    pub sessions: Arc<SessionManager>,
    pub adapter: Arc<AdapterClient>,
    pub metrics: Metrics,
}

pub async fn run(mut socket: TcpStream, ctx: HandlerContext) {
    if let Err(err) = socket.set_nodelay(true) {
        tracing::warn!(?err, "could not set TCP_NODELAY on accepted socket");
    }

    loop {
        let frame = match read_frame(&mut socket).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::trace!("client closed the connection");
                break;
            }
            Err(FrameError::MalformedPayload) => {
                let response = ErrorFrame::server_error(MALFORMED_PAYLOAD_MESSAGE).encode(0);
                if write_response(&mut socket, &response).await.is_err() {
                    break;
                }
                continue;
            }
            Err(FrameError::Io(err)) => {
                tracing::debug!(?err, "socket read failed, closing connection");
                break;
            }
        };

        let stream_id = frame.stream_id();
        ctx.metrics.frame_read(frame.opcode());

        let response = match extractor::extract(&ctx.cache, &frame, &ctx.metrics) {
            Ok(Extracted::Unprepared(query_id, stream)) => {
                extractor::unprepared_frame(query_id, stream)
            }
            Ok(Extracted::Attachments(attachments)) => {
                let started = std::time::Instant::now();
                let response = ctx
                    .adapter
                    .send_grpc_request(&ctx.sessions, frame.bytes.clone(), attachments, stream_id)
                    .await;
                ctx.metrics
                    .adapter_rpc_latency(started.elapsed().as_secs_f64() * 1000.0);
                response
            }
            Err(FrameError::MalformedPayload) => {
                ErrorFrame::server_error(MALFORMED_PAYLOAD_MESSAGE).encode(stream_id)
            }
            Err(FrameError::Io(_)) => unreachable!("prepared-id extraction never performs I/O"),
        };

        if write_response(&mut socket, &response).await.is_err() {
            break;
        }
    }
}

async fn write_response(socket: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    socket.write_all(bytes).await?;
    socket.flush().await
}
