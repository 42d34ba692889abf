//! `/debug/health`: 200 while the listener is accepting connections, 503
//! once it has been told to stop. Kept separate from the listener so a
//! load balancer can keep draining-state visibility even after the
//! Cassandra-facing socket closes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Clone, Default)]
pub struct HealthState {
    serving: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            serving: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn mark_stopped(&self) {
        self.serving.store(false, Ordering::SeqCst);
    }

    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthBody>) {
    if state.is_serving() {
        (StatusCode::OK, Json(HealthBody { status: "SERVING" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthBody {
                status: "NOT_SERVING",
            }),
        )
    }
}

pub async fn serve(port: u16, state: HealthState) -> std::io::Result<()> {
    let app = Router::new()
        .route("/debug/health", get(health))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving health checks");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok_while_serving_and_unavailable_after_stop() {
        let state = HealthState::new();
        let (status, Json(body)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "SERVING");

        state.mark_stopped();
        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "NOT_SERVING");
    }
}
