use std::sync::Arc;

use crate::cache::token_cache::ConcurrentTokenCache;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::Retriever;

/// Fixed application identity: one retriever chosen at configuration time.
#[derive(Debug, Clone)]
pub struct ServiceTokenProvider {
    cache: Arc<ConcurrentTokenCache>,
    retriever: Arc<Retriever>,
}

impl ServiceTokenProvider {
    pub fn new(cache: Arc<ConcurrentTokenCache>, retriever: Arc<Retriever>) -> Self {
        Self { cache, retriever }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<String, TokenError> {
        self.cache
            .get_access_token(ctx, self.retriever.as_ref(), scopes)
            .await
    }
}
