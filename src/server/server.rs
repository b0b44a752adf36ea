use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::config::types::ServiceConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::provider::TokenProviderResolver;
use crate::server::token_routes::TokenState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub token_state: TokenState,
}

impl AppState {
    pub fn new(
        metrics: &Metrics,
        config: &ServiceConfig,
        resolver: &TokenProviderResolver,
    ) -> Result<Self> {
        Ok(Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            token_state: TokenState::build(config, resolver)?,
        })
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(state.metrics_state.router(&settings_config.metrics))
        .merge(state.token_state.router())
        .with_state(state)
}

/// Serve token, health and metrics routes until ctrl-c.
pub async fn start(settings_config: &SettingsConfig, state: AppState) -> Result<()> {
    let metrics = get_metrics().await;
    let app = router(settings_config, state);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(address = %bind_addr, "token agent listening");
    metrics.up.set(1);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    metrics.up.set(0);
    info!("token agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
