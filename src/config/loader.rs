use anyhow::{bail, Result};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error};

use crate::config::settings::LoggingConfig;
use crate::config::types::ServiceConfig;
use crate::config::validator;
use crate::utils::constants::{DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_UNKNOWN_EXPIRY_SECS};

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}").expect("valid env var pattern"));

/// Load, expand and validate config from a YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let expanded = expand_env_vars(&content);
    parse_config(&expanded).await
}

pub async fn parse_config(content: &str) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(content)
        .inspect_err(|e| error!("parse config error: {}", e))?;

    apply_defaults(&mut service_config);
    debug!("validating config ...");
    if let Err(errors) = validator::validate_service_config(&service_config).await {
        bail!("invalid config:\n  - {}", errors.join("\n  - "));
    }

    Ok(service_config)
}

fn apply_defaults(service_config: &mut ServiceConfig) {
    let settings = &mut service_config.settings;
    if settings.logging.is_none() {
        settings.logging = Some(LoggingConfig::default());
    }
    if settings.safety_margin_seconds.is_none() {
        settings.safety_margin_seconds = Some(DEFAULT_SAFETY_MARGIN_SECS);
    }
    if settings.unknown_expiry_seconds.is_none() {
        settings.unknown_expiry_seconds = Some(DEFAULT_UNKNOWN_EXPIRY_SECS);
    }
}

/// `${VAR}` and `${VAR:default}`; unset without default expands to "".
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string()
}
