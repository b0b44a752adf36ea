use reqwest::Client;
use std::fmt;
use tracing::debug;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::token_client::{parse_access_token, request_url_form, scope_param, GRANT_PASSWORD};
use crate::retrievers::{authority_token_url, hash_secret, TokenRetriever};

/// Resource-owner password grant for a fixed service user.
pub struct PasswordTokenRetriever {
    http: Client,
    token_url: String,
    client_id: String,
    user_id: String,
    password: String,
    password_hash: String,
}

impl fmt::Debug for PasswordTokenRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordTokenRetriever")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("user_id", &self.user_id)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl PasswordTokenRetriever {
    pub fn new(
        http: Client,
        authority: &str,
        tenant_id: &str,
        client_id: String,
        user_id: String,
        password: String,
    ) -> Self {
        let password_hash = hash_secret(&password);
        Self {
            http,
            token_url: authority_token_url(authority, tenant_id),
            client_id,
            user_id,
            password,
            password_hash,
        }
    }
}

impl TokenRetriever for PasswordTokenRetriever {
    fn mechanism(&self) -> &'static str {
        "clientpassword"
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        format!(
            "password|{}|{}|{}|{}",
            self.user_id, self.client_id, self.password_hash, tenant_scope
        )
    }

    async fn init(&self) -> Result<(), TokenError> {
        if self.client_id.trim().is_empty() {
            return Err(TokenError::configuration("password credential requires a client id"));
        }
        if self.user_id.trim().is_empty() {
            return Err(TokenError::configuration("password credential requires a user id"));
        }
        Ok(())
    }

    async fn get_access_token(
        &self,
        _ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        debug!(user_id = %self.user_id, "requesting password grant token");
        let form = [
            ("grant_type", GRANT_PASSWORD.to_owned()),
            ("client_id", self.client_id.clone()),
            ("username", self.user_id.clone()),
            ("password", self.password.clone()),
            ("scope", scope_param(scopes)),
        ];
        let response = request_url_form(&self.http, &self.token_url, &form, None).await?;
        parse_access_token(response)
    }
}
