use std::sync::Arc;
use tracing::debug;

use crate::cache::token_cache::ConcurrentTokenCache;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::on_behalf_of::OnBehalfOfTokenRetriever;
use crate::retrievers::token_client::TokenClient;
use crate::retrievers::username::UsernameTokenRetriever;
use crate::retrievers::Retriever;

/// End-user identity. The retriever is picked per request from the user the
/// request was made by, or the fallback credential for backend requests.
#[derive(Debug, Clone)]
pub struct UserTokenProvider {
    cache: Arc<ConcurrentTokenCache>,
    client: TokenClient,
    username_assertion: bool,
    fallback: Option<Arc<Retriever>>,
}

impl UserTokenProvider {
    pub fn new(
        cache: Arc<ConcurrentTokenCache>,
        client: TokenClient,
        username_assertion: bool,
        fallback: Option<Arc<Retriever>>,
    ) -> Self {
        Self {
            cache,
            client,
            username_assertion,
            fallback,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn select_retriever(&self, ctx: &RequestContext) -> Result<Arc<Retriever>, TokenError> {
        let Some(user) = ctx.current_user() else {
            // backend request, no end user to act for
            if self.username_assertion {
                return Err(TokenError::FallbackNotEnabled);
            }
            debug!("no user in request context, using fallback credentials");
            return self.fallback.clone().ok_or(TokenError::FallbackNotEnabled);
        };

        let login = user.login.trim();
        if login.is_empty() {
            return Err(TokenError::UnassociatedRequest);
        }

        if self.username_assertion {
            return Ok(Arc::new(Retriever::Username(UsernameTokenRetriever::new(
                self.client.clone(),
                login.to_owned(),
            ))));
        }

        let id_token = user
            .delegated_assertion
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingDelegatedToken)?;
        Ok(Arc::new(Retriever::OnBehalfOf(OnBehalfOfTokenRetriever::new(
            self.client.clone(),
            login.to_owned(),
            id_token.to_owned(),
        ))))
    }

    pub async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<String, TokenError> {
        let retriever = self.select_retriever(ctx)?;
        self.cache
            .get_access_token(ctx, retriever.as_ref(), scopes)
            .await
    }
}
