pub mod adapter;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod health;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod session;

pub mod pb {
    tonic::include_proto!("google.spanner.adapter.v1");
}

pub use adapter::AdapterClient;
pub use cache::AttachmentsCache;
pub use config::ProxyConfig;
pub use listener::Listener;
pub use session::SessionManager;
