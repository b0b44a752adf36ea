use reqwest::Client;
use std::fmt;
use tokio::sync::OnceCell;
use url::Url;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::token_client::TokenClient;
use crate::retrievers::{authority_token_url, hash_secret, TokenRetriever};

/// Application identity with a shared secret (`client_credentials` grant).
pub struct ClientSecretTokenRetriever {
    http: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    secret_hash: String,
    client: OnceCell<TokenClient>,
}

impl fmt::Debug for ClientSecretTokenRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretTokenRetriever")
            .field("authority", &self.authority)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl ClientSecretTokenRetriever {
    pub fn new(
        http: Client,
        authority: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        let secret_hash = hash_secret(&client_secret);
        Self {
            http,
            authority,
            tenant_id,
            client_id,
            client_secret,
            secret_hash,
            client: OnceCell::new(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }
}

impl TokenRetriever for ClientSecretTokenRetriever {
    fn mechanism(&self) -> &'static str {
        "clientsecret"
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        format!(
            "clientsecret|{}|{}|{}|{}|{}",
            self.authority, self.tenant_id, self.client_id, self.secret_hash, tenant_scope
        )
    }

    async fn init(&self) -> Result<(), TokenError> {
        self.client
            .get_or_try_init(|| async {
                if self.tenant_id.trim().is_empty() || self.client_id.trim().is_empty() {
                    return Err(TokenError::configuration(
                        "client secret credential requires tenant id and client id",
                    ));
                }
                let token_url = authority_token_url(&self.authority, &self.tenant_id);
                Url::parse(&token_url).map_err(|e| {
                    TokenError::configuration(format!("invalid authority '{}': {}", self.authority, e))
                })?;
                Ok(TokenClient::new(
                    self.http.clone(),
                    token_url,
                    self.client_id.clone(),
                    self.client_secret.clone(),
                ))
            })
            .await
            .map(|_| ())
    }

    async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        self.init().await?;
        let client = self
            .client
            .get()
            .ok_or_else(|| TokenError::configuration("client secret credential not initialised"))?;
        client.from_client_secret(ctx, scopes).await
    }
}
