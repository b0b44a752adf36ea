use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, Response};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::credentials::Credential;
use crate::context::RequestContext;
use crate::endpoint::endpoint;
use crate::error::TokenError;
use crate::http::options::{AccessTokenProvider, AuthOptions};
use crate::observability::metrics::get_metrics;
use crate::provider::TokenProviderResolver;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request endpoint '{0}' is not allowed")]
    EndpointNotAllowed(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outbound client that attaches a bearer token to every request it sends.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    options: AuthOptions,
    provider: Arc<dyn AccessTokenProvider>,
}

impl AuthorizedClient {
    /// Custom provider registered for the credential's auth type wins over
    /// the built-in dispatcher.
    pub fn new(
        http: Client,
        resolver: &TokenProviderResolver,
        options: AuthOptions,
        credential: &Credential,
        is_user_initiated: bool,
    ) -> Result<Self, TokenError> {
        let provider: Arc<dyn AccessTokenProvider> =
            match options.custom_providers.get(credential.auth_type()) {
                Some(factory) => factory(&options.settings, credential)?,
                None => Arc::new(resolver.resolve_provider(
                    &options.settings,
                    credential,
                    is_user_initiated,
                )?),
            };
        Ok(Self {
            http,
            options,
            provider,
        })
    }

    pub async fn send(&self, ctx: &RequestContext, mut request: Request) -> Result<Response, RequestError> {
        if let Some(allowlist) = &self.options.allowed_endpoints {
            if !allowlist.is_allowed(request.url()) {
                let target = endpoint(request.url()).unwrap_or_else(|| request.url().scheme().to_owned());
                warn!(endpoint = %target, "outbound request refused by endpoint allowlist");
                get_metrics().await.allowlist_rejections.inc();
                return Err(RequestError::EndpointNotAllowed(target));
            }
        }
        if self.options.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(TokenError::configuration("scopes not configured").into());
        }

        let token = self.provider.access_token(ctx, &self.options.scopes).await?;
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| TokenError::token_request("issued token is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, value);

        debug!(endpoint = ?endpoint(request.url()), "sending authorized request");
        Ok(self.http.execute(request).await?)
    }
}
