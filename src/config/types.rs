use serde::Deserialize;
use std::collections::HashMap;

use crate::config::auth::AuthSettings;
use crate::config::credentials::Credential;
use crate::config::settings::SettingsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub auth: AuthSettings,
    /// named credentials served on `/token/{name}`
    #[serde(default)]
    pub credentials: HashMap<String, CredentialConfig>,
    /// destinations allowed to receive issued tokens; empty allows all
    #[serde(default)]
    pub allowed_endpoints: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    pub credential: Credential,
    #[serde(default)]
    pub scopes: Vec<String>,
}
