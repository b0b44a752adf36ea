//! Configuration validation with aggregated errors.
//! - every issue is collected into `Vec<String>`, nothing stops at the first
//! - credentials are checked by resolving them the way the server will

use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use crate::cache::token_cache::ConcurrentTokenCache;
use crate::config::auth::AuthSettings;
use crate::config::settings::SettingsConfig;
use crate::config::types::ServiceConfig;
use crate::endpoint::EndpointAllowlist;
use crate::observability::metrics::get_metrics;
use crate::provider::TokenProviderResolver;
use crate::utils::constants::MAX_CACHE_WINDOW_SECS;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_auth(&cfg.auth, &mut errors);

    if cfg.credentials.is_empty() {
        errors.push("config: 'credentials' is empty; at least one credential required".to_string());
    }

    let resolver = TokenProviderResolver::new(Arc::new(ConcurrentTokenCache::new()), Client::new());
    let mut names: Vec<&String> = cfg.credentials.keys().collect();
    names.sort();
    for name in names {
        let entry = &cfg.credentials[name];
        if entry.scopes.iter().all(|s| s.trim().is_empty()) {
            errors.push(format!("credentials['{}'].scopes must not be empty", name));
        }
        if let Err(e) = resolver.resolve_provider(&cfg.auth, &entry.credential, true) {
            errors.push(format!("credentials['{}']: {}", name, e));
        }
    }

    for pattern in &cfg.allowed_endpoints {
        if let Err(e) = EndpointAllowlist::compile(&[pattern]) {
            errors.push(format!("allowed_endpoints: {}", e));
        }
    }

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        let metrics = get_metrics().await;
        for e in &errors {
            error!("config validation: {}", e);
        }
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!("settings.server.port '{}' is not a valid port", settings.server.port));
    }
    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", settings.metrics.path));
    }
    if settings.unknown_expiry_seconds == Some(0) {
        errors.push("settings.unknown_expiry_seconds must be greater than 0".to_string());
    }
    for (field, value) in [
        ("safety_margin_seconds", settings.safety_margin_seconds),
        ("unknown_expiry_seconds", settings.unknown_expiry_seconds),
    ] {
        if value.is_some_and(|secs| secs > MAX_CACHE_WINDOW_SECS) {
            errors.push(format!(
                "settings.{} must not exceed {} seconds",
                field, MAX_CACHE_WINDOW_SECS
            ));
        }
    }
    if settings.http_timeout_ms == Some(0) {
        errors.push("settings.http_timeout_ms must be greater than 0".to_string());
    }
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
}

fn validate_auth(auth: &AuthSettings, errors: &mut Vec<String>) {
    if let Err(e) = auth.get_cloud(auth.default_cloud()) {
        errors.push(format!("auth.cloud: {}", e));
    }
    if auth.user_identity_enabled() {
        match &auth.user_identity.token_endpoint {
            None => errors.push(
                "auth.user_identity.token_endpoint is required when user identity is enabled"
                    .to_string(),
            ),
            Some(endpoint) => {
                if Url::parse(&endpoint.token_url).is_err() {
                    errors.push(format!(
                        "auth.user_identity.token_endpoint.token_url '{}' is not a valid URL",
                        endpoint.token_url
                    ));
                }
                if endpoint.client_id.trim().is_empty() {
                    errors.push("auth.user_identity.token_endpoint.client_id must not be empty".to_string());
                }
            }
        }
    }
    if auth.workload_identity_enabled() && auth.workload_identity.token_file.is_none() {
        errors.push("auth.workload_identity.token_file is required when workload identity is enabled".to_string());
    }
}
