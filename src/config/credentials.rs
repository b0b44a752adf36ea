use serde::{Deserialize, Serialize};
use std::fmt;

pub const AUTH_CURRENT_USER_IDENTITY: &str = "currentuser";
pub const AUTH_MANAGED_IDENTITY: &str = "msi";
pub const AUTH_WORKLOAD_IDENTITY: &str = "workloadidentity";
pub const AUTH_CLIENT_SECRET: &str = "clientsecret";
pub const AUTH_CLIENT_SECRET_OBO: &str = "clientsecret-obo";
pub const AUTH_USERNAME_PASSWORD: &str = "clientpassword";

/// ================================
/// How the caller is authenticated
/// ================================
///
/// Immutable once built; one value per datasource / request session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "authType")]
pub enum Credential {
    #[serde(rename = "currentuser", rename_all = "camelCase")]
    CurrentUserIdentity {
        #[serde(default)]
        service_credentials_enabled: bool,
        #[serde(default)]
        service_credentials: Option<Box<Credential>>,
    },
    #[serde(rename = "msi", rename_all = "camelCase")]
    ManagedIdentity {
        #[serde(default)]
        client_id: Option<String>,
    },
    #[serde(rename = "workloadidentity", rename_all = "camelCase")]
    WorkloadIdentity {
        #[serde(default)]
        client_id: Option<String>,
        #[serde(default)]
        tenant_id: Option<String>,
    },
    #[serde(rename = "clientsecret")]
    ClientSecret(ClientSecretCredential),
    #[serde(rename = "clientsecret-obo")]
    ClientSecretOnBehalfOf {
        base: ClientSecretCredential,
    },
    #[serde(rename = "clientpassword", rename_all = "camelCase")]
    UsernamePassword {
        tenant_id: String,
        #[serde(default)]
        client_id: String,
        user_id: String,
        password: String,
    },
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSecretCredential {
    #[serde(rename = "azureCloud", default)]
    pub cloud_name: String,
    #[serde(rename = "authority", default)]
    pub authority_override: Option<String>,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credential {
    /// Discriminant used in external configuration and custom provider lookup.
    pub fn auth_type(&self) -> &'static str {
        match self {
            Credential::CurrentUserIdentity { .. } => AUTH_CURRENT_USER_IDENTITY,
            Credential::ManagedIdentity { .. } => AUTH_MANAGED_IDENTITY,
            Credential::WorkloadIdentity { .. } => AUTH_WORKLOAD_IDENTITY,
            Credential::ClientSecret(_) => AUTH_CLIENT_SECRET,
            Credential::ClientSecretOnBehalfOf { .. } => AUTH_CLIENT_SECRET_OBO,
            Credential::UsernamePassword { .. } => AUTH_USERNAME_PASSWORD,
        }
    }

    pub fn current_user(service_credentials: Option<Credential>) -> Self {
        Credential::CurrentUserIdentity {
            service_credentials_enabled: service_credentials.is_some(),
            service_credentials: service_credentials.map(Box::new),
        }
    }

    pub fn managed_identity(client_id: Option<&str>) -> Self {
        Credential::ManagedIdentity {
            client_id: client_id.map(str::to_owned),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::CurrentUserIdentity {
                service_credentials_enabled,
                service_credentials,
            } => f
                .debug_struct("CurrentUserIdentity")
                .field("service_credentials_enabled", service_credentials_enabled)
                .field("service_credentials", service_credentials)
                .finish(),
            Credential::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
            Credential::WorkloadIdentity { client_id, tenant_id } => f
                .debug_struct("WorkloadIdentity")
                .field("client_id", client_id)
                .field("tenant_id", tenant_id)
                .finish(),
            Credential::ClientSecret(c) => f.debug_tuple("ClientSecret").field(c).finish(),
            Credential::ClientSecretOnBehalfOf { base } => f
                .debug_struct("ClientSecretOnBehalfOf")
                .field("base", base)
                .finish(),
            Credential::UsernamePassword {
                tenant_id,
                client_id,
                user_id,
                password: _,
            } => f
                .debug_struct("UsernamePassword")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("user_id", user_id)
                .field("password", &"[redacted]")
                .finish(),
        }
    }
}

impl fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("cloud_name", &self.cloud_name)
            .field("authority_override", &self.authority_override)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}
