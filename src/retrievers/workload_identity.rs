use reqwest::Client;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::token_client::{
    parse_access_token, request_url_form, scope_param, CLIENT_ASSERTION_TYPE_JWT_BEARER,
    GRANT_CLIENT_CREDENTIALS,
};
use crate::retrievers::{authority_token_url, TokenRetriever};

/// Federated credential: a projected service-account token exchanged for an
/// access token.
pub struct WorkloadIdentityTokenRetriever {
    http: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    token_file: Option<PathBuf>,
    token_url: OnceCell<String>,
}

impl fmt::Debug for WorkloadIdentityTokenRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadIdentityTokenRetriever")
            .field("authority", &self.authority)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("token_file", &self.token_file)
            .finish()
    }
}

impl WorkloadIdentityTokenRetriever {
    pub fn new(
        http: Client,
        authority: String,
        tenant_id: String,
        client_id: String,
        token_file: Option<PathBuf>,
    ) -> Self {
        Self {
            http,
            authority,
            tenant_id,
            client_id,
            token_file,
            token_url: OnceCell::new(),
        }
    }

    async fn read_assertion(&self) -> Result<String, TokenError> {
        let path = self
            .token_file
            .as_ref()
            .ok_or_else(|| TokenError::configuration("workload identity token file not set"))?;
        // re-read on every grant, the file is rotated by the platform
        let assertion = tokio::fs::read_to_string(path).await.map_err(|e| {
            TokenError::configuration(format!(
                "unable to read workload identity token file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let assertion = assertion.trim();
        if assertion.is_empty() {
            return Err(TokenError::configuration(format!(
                "workload identity token file '{}' is empty",
                path.display()
            )));
        }
        Ok(assertion.to_owned())
    }
}

impl TokenRetriever for WorkloadIdentityTokenRetriever {
    fn mechanism(&self) -> &'static str {
        "workloadidentity"
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        format!("wi|{}|{}|{}", self.tenant_id, self.client_id, tenant_scope)
    }

    async fn init(&self) -> Result<(), TokenError> {
        self.token_url
            .get_or_try_init(|| async {
                if self.tenant_id.trim().is_empty() {
                    return Err(TokenError::configuration("workload identity tenant id not set"));
                }
                if self.client_id.trim().is_empty() {
                    return Err(TokenError::configuration("workload identity client id not set"));
                }
                if self.token_file.is_none() {
                    return Err(TokenError::configuration("workload identity token file not set"));
                }
                Ok(authority_token_url(&self.authority, &self.tenant_id))
            })
            .await
            .map(|_| ())
    }

    async fn get_access_token(
        &self,
        _ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        self.init().await?;
        let token_url = self
            .token_url
            .get()
            .ok_or_else(|| TokenError::configuration("workload identity not initialised"))?;
        let assertion = self.read_assertion().await?;

        debug!(tenant_id = %self.tenant_id, client_id = %self.client_id, "requesting workload identity token");
        let form = [
            ("grant_type", GRANT_CLIENT_CREDENTIALS.to_owned()),
            ("client_id", self.client_id.clone()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE_JWT_BEARER.to_owned()),
            ("client_assertion", assertion),
            ("scope", scope_param(scopes)),
        ];
        let response = request_url_form(&self.http, token_url, &form, None).await?;
        parse_access_token(response)
    }
}
