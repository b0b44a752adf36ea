use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::clouds::{cloud_infos, lookup_cloud, predefined_clouds, CloudInfo, CloudSettings, AZURE_PUBLIC};
use crate::error::TokenError;

/// ================================
/// Identity mechanism gates
/// ================================
///
/// Read-only input of the dispatcher. A mechanism specific field is only
/// meaningful while its `enabled` flag is set.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthSettings {
    #[serde(default)]
    pub cloud: Option<String>,
    #[serde(default)]
    pub managed_identity: ManagedIdentitySettings,
    #[serde(default)]
    pub workload_identity: WorkloadIdentitySettings,
    #[serde(default)]
    pub user_identity: UserIdentitySettings,
    #[serde(default)]
    pub custom_clouds: Vec<CloudSettings>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ManagedIdentitySettings {
    #[serde(default)]
    pub enabled: bool,
    /// used when the credential carries no client id
    pub client_id: Option<String>,
    /// instance metadata token endpoint override
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkloadIdentitySettings {
    #[serde(default)]
    pub enabled: bool,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    /// projected federated service account token
    pub token_file: Option<PathBuf>,
    /// authority override, defaults to the authority of the default cloud
    pub authority: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserIdentitySettings {
    #[serde(default)]
    pub enabled: bool,
    pub token_endpoint: Option<TokenEndpointSettings>,
    #[serde(default)]
    pub fallback_credentials_enabled: bool,
}

/// Grant endpoint used for the delegated (user) flows.
#[derive(Deserialize, Clone, Default)]
pub struct TokenEndpointSettings {
    pub token_url: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// exchange the user's login instead of an ID token (auth proxy setups)
    #[serde(default)]
    pub username_assertion: bool,
}

impl fmt::Debug for TokenEndpointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEndpointSettings")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("username_assertion", &self.username_assertion)
            .finish()
    }
}

impl AuthSettings {
    pub fn managed_identity_enabled(&self) -> bool {
        self.managed_identity.enabled
    }

    pub fn workload_identity_enabled(&self) -> bool {
        self.workload_identity.enabled
    }

    pub fn user_identity_enabled(&self) -> bool {
        self.user_identity.enabled
    }

    pub fn user_identity_fallback_credentials_enabled(&self) -> bool {
        self.user_identity.enabled && self.user_identity.fallback_credentials_enabled
    }

    pub fn username_assertion(&self) -> bool {
        self.user_identity
            .token_endpoint
            .as_ref()
            .map(|e| e.username_assertion)
            .unwrap_or(false)
    }

    pub fn default_cloud(&self) -> &str {
        match self.cloud.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => AZURE_PUBLIC,
        }
    }

    pub fn get_cloud(&self, cloud_name: &str) -> Result<&CloudSettings, TokenError> {
        lookup_cloud(&self.custom_clouds, cloud_name)
            .ok_or_else(|| TokenError::UnsupportedCloud(cloud_name.to_owned()))
    }

    /// All clouds known to this instance, custom ones included.
    pub fn clouds(&self) -> Vec<CloudInfo> {
        cloud_infos(predefined_clouds().iter().chain(self.custom_clouds.iter()))
    }

    pub fn custom_clouds(&self) -> Vec<CloudInfo> {
        cloud_infos(self.custom_clouds.iter())
    }
}
