use std::sync::Arc;

use clap::Parser;
use spanner_cassandra_proxy::{
    cache::AttachmentsCache,
    config::{Args, ProxyConfig},
    handler::HandlerContext,
    health::{self, HealthState},
    logging,
    metrics::Metrics,
    session::SessionManager,
    AdapterClient, Listener,
};
use stable_eyre::eyre::{self, Context};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    stable_eyre::install()?;
    logging::setup_telemetry("spanner-cassandra-proxy")?;

    let config = ProxyConfig::load(Args::parse()).context("loading configuration")?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        spanner_endpoint = %config.spanner_endpoint,
        "starting spanner-cassandra-proxy"
    );

    let metrics = Metrics::new(config.enable_built_in_metrics);

    let cache = Arc::new(AttachmentsCache::default());
    let adapter = Arc::new(AdapterClient::connect(&config, cache.clone())?);
    let sessions = Arc::new(SessionManager::with_metrics(
        adapter.clone(),
        config.database_uri.clone(),
        metrics.clone(),
    ));

    // Fail fast: an unreachable Adapter endpoint should stop the process
    // before it ever accepts a client connection, not surface as a
    // per-request error later.
    sessions
        .get_session()
        .await
        .context("establishing the initial Spanner session")?;

    let health_state = config.health_check_port.map(|_| HealthState::new());

    let mut health_task = None;
    if let (Some(port), Some(state)) = (config.health_check_port, health_state.clone()) {
        health_task = Some(tokio::spawn(async move {
            if let Err(err) = health::serve(port, state).await {
                tracing::error!(?err, "health server exited");
            }
        }));
    }

    let ctx = HandlerContext {
        cache,
        sessions,
        adapter,
        metrics,
    };
    let addr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("parsing listen address")?;
    let listener = Arc::new(Listener::new(addr, ctx, health_state));

    let mut serving = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.serve().await })
    };

    tokio::select! {
        result = &mut serving => {
            result.context("listener task panicked")?.context("listener failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, draining connections");
            listener.stop();
            serving.await.context("listener task panicked")?.context("listener failed")?;
        }
    }

    if let Some(health_task) = health_task {
        health_task.abort();
    }

    Ok(())
}
