//! Holds the single long-lived Spanner session handle for one listener,
//! refreshing it past an age threshold with a double-checked-locking
//! pattern: an `ArcSwapOption` keeps the hot read path lock-free, and a
//! `tokio::sync::Mutex` single-flights the cold refresh so concurrent
//! callers observing an expired holder issue exactly one `CreateSession`.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::{error::SessionError, metrics::Metrics};

/// Spanner's session-idle deletion window is measured in weeks; six days
/// keeps a comfortable margin below it without being user-tunable.
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(6 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub name: String,
    refresh_time: Instant,
}

impl SessionHandle {
    fn new(name: String) -> Self {
        Self {
            name,
            refresh_time: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.refresh_time + REFRESH_THRESHOLD
    }
}

/// The session manager's only upstream dependency: creating a brand new
/// session for a database. Kept as a narrow trait (rather than depending on
/// the full adapter client) so the manager is independently testable.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn create_session(&self, database_uri: &str) -> Result<String, SessionError>;
}

pub struct SessionManager {
    source: Arc<dyn SessionSource>,
    database_uri: String,
    current: ArcSwapOption<SessionHandle>,
    refresh_gate: Mutex<()>,
    metrics: Metrics,
}

impl SessionManager {
    pub fn new(source: Arc<dyn SessionSource>, database_uri: impl Into<String>) -> Self {
        Self::with_metrics(source, database_uri, Metrics::new(false))
    }

    pub fn with_metrics(
        source: Arc<dyn SessionSource>,
        database_uri: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            source,
            database_uri: database_uri.into(),
            current: ArcSwapOption::empty(),
            refresh_gate: Mutex::new(()),
            metrics,
        }
    }

    pub async fn get_session(&self) -> Result<Arc<SessionHandle>, SessionError> {
        if let Some(handle) = self.fresh_handle() {
            return Ok(handle);
        }

        let _guard = self.refresh_gate.lock().await;

        // Re-check: another caller may have refreshed while we waited for
        // the gate.
        if let Some(handle) = self.fresh_handle() {
            return Ok(handle);
        }

        let name = self.source.create_session(&self.database_uri).await?;
        let handle = Arc::new(SessionHandle::new(name));
        self.current.store(Some(handle.clone()));
        self.metrics.session_refreshed();
        Ok(handle)
    }

    fn fresh_handle(&self) -> Option<Arc<SessionHandle>> {
        let handle = self.current.load_full()?;
        (!handle.is_expired()).then_some(handle)
    }
}
