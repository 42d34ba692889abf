//! Optional OpenTelemetry instrumentation, gated by `enableBuiltInMetrics`.
//! When disabled, every recorder is a no-op so call sites never need to
//! branch on whether metrics are turned on.

use opentelemetry::{
    metrics::{Counter, Histogram},
    KeyValue,
};

#[derive(Clone)]
pub struct Metrics {
    inner: Option<Recorders>,
}

#[derive(Clone)]
struct Recorders {
    connections_accepted: Counter<u64>,
    frames_total: Counter<u64>,
    cache_hits: Counter<u64>,
    cache_misses: Counter<u64>,
    session_refreshes: Counter<u64>,
    adapter_rpc_latency_ms: Histogram<f64>,
}

impl Metrics {
    /// Installs the OTLP metrics pipeline and registers instruments, or
    /// returns a no-op recorder if `enabled` is false.
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { inner: None };
        }

        let meter = opentelemetry::global::meter("spanner-cassandra-proxy");
        let inner = Recorders {
            connections_accepted: meter
                .u64_counter("proxy.connections_accepted")
                .with_description("TCP connections accepted from Cassandra clients")
                .init(),
            frames_total: meter
                .u64_counter("proxy.frames_total")
                .with_description("Request frames read, labeled by opcode")
                .init(),
            cache_hits: meter
                .u64_counter("proxy.attachments_cache.hits")
                .init(),
            cache_misses: meter
                .u64_counter("proxy.attachments_cache.misses")
                .init(),
            session_refreshes: meter
                .u64_counter("proxy.session_refreshes")
                .with_description("Times a new Spanner session was created")
                .init(),
            adapter_rpc_latency_ms: meter
                .f64_histogram("proxy.adapter_rpc_latency_ms")
                .with_description("Latency of AdaptMessage round trips")
                .init(),
        };

        Self { inner: Some(inner) }
    }

    pub fn connection_accepted(&self) {
        if let Some(r) = &self.inner {
            r.connections_accepted.add(1, &[]);
        }
    }

    pub fn frame_read(&self, opcode: u8) {
        if let Some(r) = &self.inner {
            r.frames_total.add(1, &[KeyValue::new("opcode", opcode as i64)]);
        }
    }

    pub fn cache_hit(&self) {
        if let Some(r) = &self.inner {
            r.cache_hits.add(1, &[]);
        }
    }

    pub fn cache_miss(&self) {
        if let Some(r) = &self.inner {
            r.cache_misses.add(1, &[]);
        }
    }

    pub fn session_refreshed(&self) {
        if let Some(r) = &self.inner {
            r.session_refreshes.add(1, &[]);
        }
    }

    pub fn adapter_rpc_latency(&self, millis: f64) {
        if let Some(r) = &self.inner {
            r.adapter_rpc_latency_ms.record(millis, &[]);
        }
    }
}
