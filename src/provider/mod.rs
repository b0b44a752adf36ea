//! Token provider dispatcher
//!
//! Turns a declared `Credential` plus the gating `AuthSettings` into the
//! provider callers fetch tokens from. Service-style credentials map to a
//! single retriever; the current-user credential maps to a provider that
//! picks its retriever per request.

use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::token_cache::ConcurrentTokenCache;
use crate::config::auth::AuthSettings;
use crate::config::credentials::{ClientSecretCredential, Credential};
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::client_secret::ClientSecretTokenRetriever;
use crate::retrievers::managed_identity::ManagedIdentityTokenRetriever;
use crate::retrievers::password::PasswordTokenRetriever;
use crate::retrievers::token_client::TokenClient;
use crate::retrievers::workload_identity::WorkloadIdentityTokenRetriever;
use crate::retrievers::Retriever;

pub mod service;
pub mod user;

pub use service::ServiceTokenProvider;
pub use user::UserTokenProvider;

#[derive(Debug)]
pub enum TokenProvider {
    Service(ServiceTokenProvider),
    User(UserTokenProvider),
}

impl TokenProvider {
    /// Bearer token for `scopes`, served through the shared cache.
    pub async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<String, TokenError> {
        if scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(TokenError::InvalidArgument("scopes must not be empty".into()));
        }
        match self {
            TokenProvider::Service(p) => p.get_access_token(ctx, scopes).await,
            TokenProvider::User(p) => p.get_access_token(ctx, scopes).await,
        }
    }
}

/// Composition root for providers: owns the shared cache and HTTP client.
#[derive(Debug, Clone)]
pub struct TokenProviderResolver {
    cache: Arc<ConcurrentTokenCache>,
    http: Client,
}

impl TokenProviderResolver {
    pub fn new(cache: Arc<ConcurrentTokenCache>, http: Client) -> Self {
        Self { cache, http }
    }

    pub fn cache(&self) -> &Arc<ConcurrentTokenCache> {
        &self.cache
    }

    /// `is_user_initiated` tells whether the calling surface can carry an end
    /// user at all; the current-user credential is refused when it cannot.
    pub fn resolve_provider(
        &self,
        settings: &AuthSettings,
        credential: &Credential,
        is_user_initiated: bool,
    ) -> Result<TokenProvider, TokenError> {
        let provider = match credential {
            Credential::CurrentUserIdentity {
                service_credentials_enabled,
                service_credentials,
            } => {
                if !settings.user_identity_enabled() || !is_user_initiated {
                    return Err(TokenError::configuration(
                        "user identity authentication is not enabled",
                    ));
                }
                let endpoint = settings.user_identity.token_endpoint.as_ref().ok_or_else(|| {
                    TokenError::configuration("user identity token endpoint is not configured")
                })?;
                let client = TokenClient::new(
                    self.http.clone(),
                    endpoint.token_url.clone(),
                    endpoint.client_id.clone(),
                    endpoint.client_secret.clone(),
                );

                let fallback = match service_credentials.as_deref() {
                    Some(sub) if *service_credentials_enabled => {
                        validate_fallback(sub)?;
                        if settings.user_identity_fallback_credentials_enabled() {
                            Some(Arc::new(resolve_service_retriever(&self.http, settings, sub)?))
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
                TokenProvider::User(UserTokenProvider::new(
                    self.cache.clone(),
                    client,
                    settings.username_assertion(),
                    fallback,
                ))
            }
            other => TokenProvider::Service(ServiceTokenProvider::new(
                self.cache.clone(),
                Arc::new(resolve_service_retriever(&self.http, settings, other)?),
            )),
        };
        info!(auth_type = credential.auth_type(), "token provider resolved");
        Ok(provider)
    }
}

/// Fallback credentials must themselves be usable without an end user.
fn validate_fallback(credential: &Credential) -> Result<(), TokenError> {
    match credential {
        Credential::CurrentUserIdentity { .. } | Credential::ClientSecretOnBehalfOf { .. } => Err(
            TokenError::InvalidFallbackCredential(credential.auth_type().to_owned()),
        ),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Retriever for a credential that needs no end user.
pub(crate) fn resolve_service_retriever(
    http: &Client,
    settings: &AuthSettings,
    credential: &Credential,
) -> Result<Retriever, TokenError> {
    debug!(auth_type = credential.auth_type(), "resolving token retriever");
    match credential {
        Credential::ManagedIdentity { client_id } => {
            if !settings.managed_identity_enabled() {
                return Err(TokenError::configuration(
                    "managed identity authentication is not enabled",
                ));
            }
            let client_id = non_empty(client_id.as_deref())
                .or(non_empty(settings.managed_identity.client_id.as_deref()))
                .map(str::to_owned);
            Ok(Retriever::ManagedIdentity(ManagedIdentityTokenRetriever::new(
                http.clone(),
                client_id,
                settings.managed_identity.endpoint.clone(),
            )))
        }
        Credential::WorkloadIdentity {
            client_id,
            tenant_id,
        } => {
            if !settings.workload_identity_enabled() {
                return Err(TokenError::configuration(
                    "workload identity authentication is not enabled",
                ));
            }
            let wi = &settings.workload_identity;
            let tenant_id = non_empty(tenant_id.as_deref())
                .or(non_empty(wi.tenant_id.as_deref()))
                .unwrap_or_default();
            let client_id = non_empty(client_id.as_deref())
                .or(non_empty(wi.client_id.as_deref()))
                .unwrap_or_default();
            let authority = match non_empty(wi.authority.as_deref()) {
                Some(authority) => authority.to_owned(),
                None => settings.get_cloud(settings.default_cloud())?.aad_authority.clone(),
            };
            Ok(Retriever::WorkloadIdentity(WorkloadIdentityTokenRetriever::new(
                http.clone(),
                authority,
                tenant_id.to_owned(),
                client_id.to_owned(),
                wi.token_file.clone(),
            )))
        }
        Credential::ClientSecret(c) => {
            let authority = resolve_authority(settings, c)?;
            Ok(Retriever::ClientSecret(ClientSecretTokenRetriever::new(
                http.clone(),
                authority,
                c.tenant_id.clone(),
                c.client_id.clone(),
                c.client_secret.clone(),
            )))
        }
        Credential::UsernamePassword {
            tenant_id,
            client_id,
            user_id,
            password,
        } => {
            let client_id = non_empty(Some(client_id.as_str()))
                .or(non_empty(settings.managed_identity.client_id.as_deref()))
                .unwrap_or_default();
            let authority = &settings.get_cloud(settings.default_cloud())?.aad_authority;
            Ok(Retriever::Password(PasswordTokenRetriever::new(
                http.clone(),
                authority,
                tenant_id,
                client_id.to_owned(),
                user_id.clone(),
                password.clone(),
            )))
        }
        Credential::CurrentUserIdentity { .. } | Credential::ClientSecretOnBehalfOf { .. } => Err(
            TokenError::UnsupportedCredential(credential.auth_type().to_owned()),
        ),
    }
}

/// Explicit authority wins over the named cloud.
fn resolve_authority(
    settings: &AuthSettings,
    credential: &ClientSecretCredential,
) -> Result<String, TokenError> {
    if let Some(authority) = non_empty(credential.authority_override.as_deref()) {
        return Ok(authority.to_owned());
    }
    let cloud_name = match credential.cloud_name.trim() {
        "" => settings.default_cloud(),
        name => name,
    };
    Ok(settings.get_cloud(cloud_name)?.aad_authority.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::auth::{ManagedIdentitySettings, TokenEndpointSettings, UserIdentitySettings, WorkloadIdentitySettings};
    use crate::retrievers::TokenRetriever;

    fn resolver() -> TokenProviderResolver {
        TokenProviderResolver::new(Arc::new(ConcurrentTokenCache::new()), Client::new())
    }

    fn client_secret(cloud: &str) -> Credential {
        Credential::ClientSecret(ClientSecretCredential {
            cloud_name: cloud.into(),
            authority_override: None,
            tenant_id: "tenant".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
        })
    }

    fn user_settings(fallback: bool) -> AuthSettings {
        AuthSettings {
            user_identity: UserIdentitySettings {
                enabled: true,
                token_endpoint: Some(TokenEndpointSettings {
                    token_url: "FAKE_TOKEN_URL".into(),
                    client_id: "FAKE_CLIENT_ID".into(),
                    client_secret: "FAKE_CLIENT_SECRET".into(),
                    username_assertion: false,
                }),
                fallback_credentials_enabled: fallback,
            },
            ..Default::default()
        }
    }

    #[test]
    fn managed_identity_requires_enabled_flag() {
        let settings = AuthSettings {
            managed_identity: ManagedIdentitySettings {
                enabled: false,
                client_id: Some("default-msi".into()),
                endpoint: None,
            },
            ..Default::default()
        };
        for credential in [Credential::managed_identity(None), Credential::managed_identity(Some("id"))] {
            let err = resolver().resolve_provider(&settings, &credential, true).unwrap_err();
            assert!(matches!(err, TokenError::Configuration(_)));
        }
    }

    #[test]
    fn managed_identity_client_id_defaults_from_settings() {
        let settings = AuthSettings {
            managed_identity: ManagedIdentitySettings {
                enabled: true,
                client_id: Some("default-msi".into()),
                endpoint: None,
            },
            ..Default::default()
        };
        let retriever =
            resolve_service_retriever(&Client::new(), &settings, &Credential::managed_identity(None)).unwrap();
        assert_eq!(retriever.cache_key(""), "msi|default-msi|");

        let retriever =
            resolve_service_retriever(&Client::new(), &settings, &Credential::managed_identity(Some("own")))
                .unwrap();
        assert_eq!(retriever.cache_key(""), "msi|own|");
    }

    #[test]
    fn workload_identity_requires_enabled_flag_and_defaults_ids() {
        let credential = Credential::WorkloadIdentity {
            client_id: None,
            tenant_id: None,
        };
        let err = resolver()
            .resolve_provider(&AuthSettings::default(), &credential, false)
            .unwrap_err();
        assert!(matches!(err, TokenError::Configuration(_)));

        let settings = AuthSettings {
            workload_identity: WorkloadIdentitySettings {
                enabled: true,
                tenant_id: Some("wi-tenant".into()),
                client_id: Some("wi-client".into()),
                token_file: Some("/var/run/secrets/token".into()),
                authority: None,
            },
            ..Default::default()
        };
        let retriever = resolve_service_retriever(&Client::new(), &settings, &credential).unwrap();
        assert_eq!(retriever.cache_key(""), "wi|wi-tenant|wi-client|");
    }

    #[test]
    fn client_secret_resolves_known_and_unknown_clouds() {
        let settings = AuthSettings::default();
        let provider = resolver().resolve_provider(&settings, &client_secret("AzureCloud"), false);
        assert!(matches!(provider, Ok(TokenProvider::Service(_))));

        let err = resolver()
            .resolve_provider(&settings, &client_secret("MarsCloud"), false)
            .unwrap_err();
        assert_eq!(err, TokenError::UnsupportedCloud("MarsCloud".into()));
    }

    #[test]
    fn authority_override_skips_cloud_lookup() {
        let credential = ClientSecretCredential {
            cloud_name: "MarsCloud".into(),
            authority_override: Some("https://login.example.org/".into()),
            tenant_id: "t".into(),
            client_id: "c".into(),
            client_secret: "s".into(),
        };
        assert_eq!(
            resolve_authority(&AuthSettings::default(), &credential).unwrap(),
            "https://login.example.org/"
        );
    }

    #[test]
    fn on_behalf_of_credential_is_unsupported() {
        let credential = Credential::ClientSecretOnBehalfOf {
            base: ClientSecretCredential {
                cloud_name: "AzureCloud".into(),
                authority_override: None,
                tenant_id: "t".into(),
                client_id: "c".into(),
                client_secret: "s".into(),
            },
        };
        let err = resolver()
            .resolve_provider(&AuthSettings::default(), &credential, true)
            .unwrap_err();
        assert_eq!(err, TokenError::UnsupportedCredential("clientsecret-obo".into()));
    }

    #[test]
    fn password_client_id_defaults_to_managed_identity_client() {
        let settings = AuthSettings {
            managed_identity: ManagedIdentitySettings {
                enabled: false,
                client_id: Some("msi-client".into()),
                endpoint: None,
            },
            ..Default::default()
        };
        let credential = Credential::UsernamePassword {
            tenant_id: "t".into(),
            client_id: "".into(),
            user_id: "svc".into(),
            password: "pw".into(),
        };
        let retriever = resolve_service_retriever(&Client::new(), &settings, &credential).unwrap();
        assert!(retriever.cache_key("").starts_with("password|svc|msi-client|"));
    }

    #[test]
    fn current_user_requires_user_identity_and_user_initiated_surface() {
        let credential = Credential::current_user(None);
        assert!(matches!(
            resolver().resolve_provider(&AuthSettings::default(), &credential, false),
            Err(TokenError::Configuration(_))
        ));
        assert!(matches!(
            resolver().resolve_provider(&AuthSettings::default(), &credential, true),
            Err(TokenError::Configuration(_))
        ));
        assert!(matches!(
            resolver().resolve_provider(&user_settings(false), &credential, false),
            Err(TokenError::Configuration(_))
        ));
        assert!(matches!(
            resolver().resolve_provider(&user_settings(false), &credential, true),
            Ok(TokenProvider::User(_))
        ));
    }

    #[test]
    fn current_user_with_service_credentials_resolves() {
        let credential = Credential::current_user(Some(client_secret("AzureCloud")));
        let provider = resolver().resolve_provider(&user_settings(true), &credential, true);
        assert!(matches!(provider, Ok(TokenProvider::User(_))));
    }

    #[test]
    fn invalid_fallback_credentials_are_rejected() {
        let nested_user = Credential::current_user(Some(Credential::current_user(None)));
        let err = resolver()
            .resolve_provider(&user_settings(true), &nested_user, true)
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidFallbackCredential("currentuser".into()));

        let obo = Credential::current_user(Some(Credential::ClientSecretOnBehalfOf {
            base: ClientSecretCredential {
                cloud_name: "AzureCloud".into(),
                authority_override: None,
                tenant_id: "t".into(),
                client_id: "c".into(),
                client_secret: "s".into(),
            },
        }));
        let err = resolver()
            .resolve_provider(&user_settings(true), &obo, true)
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidFallbackCredential("clientsecret-obo".into()));
    }

    #[tokio::test]
    async fn empty_scopes_are_rejected() {
        let provider = resolver()
            .resolve_provider(&AuthSettings::default(), &client_secret("AzureCloud"), false)
            .unwrap();
        let err = provider
            .get_access_token(&RequestContext::new(), &["  ".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidArgument(_)));
        let err = provider.get_access_token(&RequestContext::new(), &[]).await.unwrap_err();
        assert!(matches!(err, TokenError::InvalidArgument(_)));
    }
}
