//! Wraps the Spanner Adapter gRPC stub: one streaming `AdaptMessage` call
//! per Cassandra request, plus `CreateSession` for bootstrap and refresh.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use cassandra_proto::ErrorFrame;
use tonic::{
    metadata::{Ascii, MetadataValue},
    service::Interceptor,
    transport::{Channel, ClientTlsConfig, Endpoint},
    Request, Status,
};

use crate::{
    cache::AttachmentsCache,
    config::ProxyConfig,
    error::{AdapterError, SessionError, StartupError},
    pb::{self, adapter_service_client::AdapterServiceClient},
    session::{SessionManager, SessionSource},
};

type InterceptedClient =
    AdapterServiceClient<tonic::service::interceptor::InterceptedService<Channel, AdapterHeaders>>;

#[derive(Clone)]
struct AdapterHeaders {
    resource_prefix: MetadataValue<Ascii>,
    user_agent: MetadataValue<Ascii>,
}

impl Interceptor for AdapterHeaders {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert("google-cloud-resource-prefix", self.resource_prefix.clone());
        request
            .metadata_mut()
            .insert("user-agent", self.user_agent.clone());
        Ok(request)
    }
}

#[derive(Clone)]
pub struct AdapterClient {
    client: InterceptedClient,
    cache: Arc<AttachmentsCache>,
}

impl AdapterClient {
    pub fn connect(config: &ProxyConfig, cache: Arc<AttachmentsCache>) -> Result<Self, StartupError> {
        let channel = build_channel(config)?;

        let headers = AdapterHeaders {
            resource_prefix: config
                .database_uri
                .parse()
                .map_err(|_| StartupError::InvalidDatabaseUri(config.database_uri.clone()))?,
            user_agent: user_agent().parse().expect("user agent is ASCII"),
        };

        let client = AdapterServiceClient::with_interceptor(channel, headers);
        Ok(Self { client, cache })
    }

    /// Issues one `AdaptMessage` call and stitches the streamed response.
    /// Never fails: any upstream error, including a failure to resolve the
    /// session, is turned into a synthesized `SERVER_ERROR` frame so the
    /// connection handler always has exactly one frame to write back.
    pub async fn send_grpc_request(
        &self,
        sessions: &SessionManager,
        payload: Bytes,
        attachments: HashMap<String, String>,
        stream_id: i16,
    ) -> Bytes {
        match self.try_send(sessions, payload, attachments, stream_id).await {
            Ok(bytes) => bytes,
            Err(err) => ErrorFrame::server_error(err.to_string()).encode(stream_id),
        }
    }

    async fn try_send(
        &self,
        sessions: &SessionManager,
        payload: Bytes,
        attachments: HashMap<String, String>,
        stream_id: i16,
    ) -> Result<Bytes, AdapterError> {
        let session = sessions.get_session().await?;

        let request = pb::AdaptMessageRequest {
            name: session.name.clone(),
            protocol: "cassandra".to_string(),
            payload: payload.to_vec(),
            attachments,
        };

        let mut stream = self
            .client
            .clone()
            .adapt_message(request)
            .await?
            .into_inner();

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.message().await? {
            for (key, value) in &chunk.state_updates {
                self.cache.put(key.clone(), value.clone());
            }
            chunks.push(chunk);
        }

        Ok(stitch(chunks, stream_id))
    }
}

/// Writes the terminal chunk's payload first (it carries the Cassandra
/// response header), then the remaining chunks in their original arrival
/// order. Zero chunks yields the documented "no response" error frame,
/// addressed to the triggering request's `stream_id`.
fn stitch(chunks: Vec<pb::AdaptMessageResponse>, stream_id: i16) -> Bytes {
    if chunks.is_empty() {
        return ErrorFrame::server_error("No response received from the server.")
            .encode(stream_id);
    }

    let total: usize = chunks.iter().map(|c| c.payload.len()).sum();
    let mut out = BytesMut::with_capacity(total);
    let last = chunks.len() - 1;
    out.extend_from_slice(&chunks[last].payload);
    for chunk in &chunks[..last] {
        out.extend_from_slice(&chunk.payload);
    }
    out.freeze()
}

#[async_trait]
impl SessionSource for AdapterClient {
    async fn create_session(&self, database_uri: &str) -> Result<String, SessionError> {
        let mut client = self.client.clone();
        let response = client
            .create_session(pb::CreateSessionRequest {
                parent: database_uri.to_string(),
            })
            .await
            .map_err(|status| SessionError(status.to_string()))?;
        Ok(response.into_inner().name)
    }
}

fn build_channel(config: &ProxyConfig) -> Result<Channel, StartupError> {
    let scheme = if config.use_plain_text { "http" } else { "https" };
    let uri = format!("{scheme}://{}", config.spanner_endpoint);

    let channel_count = config.num_grpc_channels.max(1);
    let mut endpoints = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        let mut endpoint = Endpoint::from_shared(uri.clone())?;
        if !config.use_plain_text {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_enabled_roots())?;
        }
        endpoints.push(endpoint);
    }

    Ok(Channel::balance_list(endpoints.into_iter()))
}

fn user_agent() -> String {
    format!(
        "spanner-cassandra-proxy/v{} tonic/0.12",
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
impl AdapterClient {
    /// Builds a client over a lazily-connecting channel: no I/O happens
    /// until a call is actually made. For tests that only need a value of
    /// the right type, never an upstream.
    pub(crate) fn test_stub(cache: Arc<AttachmentsCache>) -> Self {
        let channel = Endpoint::from_static("http://localhost:1").connect_lazy();
        let headers = AdapterHeaders {
            resource_prefix: "db".parse().unwrap(),
            user_agent: user_agent().parse().unwrap(),
        };
        Self {
            client: AdapterServiceClient::with_interceptor(channel, headers),
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(payload: &str, updates: &[(&str, &str)]) -> pb::AdaptMessageResponse {
        pb::AdaptMessageResponse {
            payload: payload.as_bytes().to_vec(),
            state_updates: updates
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn stitches_terminal_chunk_first() {
        let chunks = vec![chunk("B1", &[]), chunk("B2", &[]), chunk("HDR", &[])];
        let result = stitch(chunks, 9);
        assert_eq!(result.as_ref(), b"HDRB1B2");
    }

    #[test]
    fn single_chunk_is_returned_verbatim() {
        let result = stitch(vec![chunk("R", &[])], 9);
        assert_eq!(result.as_ref(), b"R");
    }

    #[test]
    fn zero_chunks_synthesizes_the_documented_error_addressed_to_the_request_stream_id() {
        let result = stitch(vec![], 42);
        assert!(result.len() > cassandra_proto::frame::HEADER_LEN);
        assert_eq!(&result[2..4], &42i16.to_be_bytes());
    }
}
