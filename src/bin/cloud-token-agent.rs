use anyhow::Result;
use clap::Parser;
use cloud_token_agent::cache::token_cache::ConcurrentTokenCache;
use cloud_token_agent::observability::metrics::get_metrics;
use cloud_token_agent::provider::TokenProviderResolver;
use cloud_token_agent::server::server::{self, AppState};
use cloud_token_agent::utils::config_loader;
use cloud_token_agent::utils::logging::{self, LogLevel};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "cloud-token-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level).await?;
    let settings = &service_config.settings;

    // -------------------------------
    // 2. Shared grant client and token cache
    // -------------------------------

    let client = Client::builder()
        .timeout(Duration::from_millis(settings.http_timeout_ms()))
        .build()?;
    let cache = Arc::new(ConcurrentTokenCache::with_settings(
        settings.safety_margin_seconds(),
        settings.unknown_expiry_seconds(),
    ));
    let resolver = TokenProviderResolver::new(cache, client);

    // -------------------------------
    // 3. Resolve every configured credential, then serve
    // -------------------------------

    let metrics = get_metrics().await;
    let state = AppState::new(metrics, &service_config, &resolver)?;
    info!(
        credentials = service_config.credentials.len(),
        allowlist = service_config.allowed_endpoints.len(),
        "token agent starting..."
    );
    server::start(settings, state).await
}
