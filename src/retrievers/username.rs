use std::fmt;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::token_client::TokenClient;
use crate::retrievers::TokenRetriever;

/// Username-assertion grant: the host vouches for the user by login alone.
pub struct UsernameTokenRetriever {
    client: TokenClient,
    username: String,
}

impl fmt::Debug for UsernameTokenRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernameTokenRetriever")
            .field("client", &self.client)
            .field("username", &self.username)
            .finish()
    }
}

impl UsernameTokenRetriever {
    pub fn new(client: TokenClient, username: String) -> Self {
        Self { client, username }
    }
}

impl TokenRetriever for UsernameTokenRetriever {
    fn mechanism(&self) -> &'static str {
        "username"
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        format!("currentuser|username|{}|{}", self.username, tenant_scope)
    }

    async fn init(&self) -> Result<(), TokenError> {
        Ok(())
    }

    async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        self.client.from_username(ctx, &self.username, scopes).await
    }
}
