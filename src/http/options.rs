use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::auth::AuthSettings;
use crate::config::credentials::Credential;
use crate::context::RequestContext;
use crate::endpoint::EndpointAllowlist;
use crate::error::{AllowlistError, TokenError};
use crate::provider::TokenProvider;

pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TokenError>> + Send + 'a>>;

/// Anything that can hand out bearer tokens for a set of scopes.
pub trait AccessTokenProvider: Send + Sync {
    fn access_token<'a>(&'a self, ctx: &'a RequestContext, scopes: &'a [String]) -> TokenFuture<'a>;
}

impl AccessTokenProvider for TokenProvider {
    fn access_token<'a>(&'a self, ctx: &'a RequestContext, scopes: &'a [String]) -> TokenFuture<'a> {
        Box::pin(self.get_access_token(ctx, scopes))
    }
}

/// Builds a provider for credentials of one auth type instead of the built-in dispatcher.
pub type TokenProviderFactory = Arc<
    dyn Fn(&AuthSettings, &Credential) -> Result<Arc<dyn AccessTokenProvider>, TokenError>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct AuthOptions {
    pub(crate) settings: AuthSettings,
    pub(crate) scopes: Vec<String>,
    pub(crate) allowed_endpoints: Option<EndpointAllowlist>,
    pub(crate) custom_providers: HashMap<String, TokenProviderFactory>,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut custom: Vec<&String> = self.custom_providers.keys().collect();
        custom.sort();
        f.debug_struct("AuthOptions")
            .field("settings", &self.settings)
            .field("scopes", &self.scopes)
            .field("allowed_endpoints", &self.allowed_endpoints)
            .field("custom_providers", &custom)
            .finish()
    }
}

impl AuthOptions {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Restrict the destinations tokens are sent to.
    pub fn allow_endpoints<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, AllowlistError> {
        self.allowed_endpoints = Some(EndpointAllowlist::compile(patterns)?);
        Ok(self)
    }

    pub fn add_token_provider(mut self, auth_type: &str, factory: TokenProviderFactory) -> Self {
        self.custom_providers.insert(auth_type.to_owned(), factory);
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }
}
