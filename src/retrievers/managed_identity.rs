use http::header::ACCEPT;
use reqwest::Client;
use tracing::debug;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::token_client::{parse_access_token, read_token_response};
use crate::retrievers::TokenRetriever;
use crate::utils::constants::{DEFAULT_IMDS_ENDPOINT, IMDS_API_VERSION};

/// Token from the instance metadata endpoint of the host the service runs on.
#[derive(Debug, Clone)]
pub struct ManagedIdentityTokenRetriever {
    http: Client,
    endpoint: String,
    /// user-assigned identity; system-assigned when `None`
    client_id: Option<String>,
}

impl ManagedIdentityTokenRetriever {
    pub fn new(http: Client, client_id: Option<String>, endpoint: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMDS_ENDPOINT.to_owned()),
            client_id: client_id.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// The metadata endpoint takes a resource, not a scope.
fn scope_to_resource(scope: &str) -> &str {
    let scope = scope.trim();
    scope.strip_suffix("/.default").unwrap_or(scope)
}

impl TokenRetriever for ManagedIdentityTokenRetriever {
    fn mechanism(&self) -> &'static str {
        "msi"
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        format!(
            "msi|{}|{}",
            self.client_id.as_deref().unwrap_or("system"),
            tenant_scope
        )
    }

    async fn init(&self) -> Result<(), TokenError> {
        Ok(())
    }

    async fn get_access_token(
        &self,
        _ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        let resource = scopes
            .iter()
            .map(|s| scope_to_resource(s))
            .find(|s| !s.is_empty())
            .ok_or_else(|| TokenError::InvalidArgument("scopes must not be empty".into()))?;

        let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource)];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }
        debug!(resource, client_id = ?self.client_id, "requesting managed identity token");

        let response = self
            .http
            .get(&self.endpoint)
            .header("Metadata", "true")
            .header(ACCEPT, "application/json")
            .query(&query)
            .send()
            .await?;
        parse_access_token(read_token_response(response).await?)
    }
}
