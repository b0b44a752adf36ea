use chrono::TimeDelta;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::token_context::TokenContext;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::observability::metrics::get_metrics;
use crate::retrievers::TokenRetriever;
use crate::utils::constants::{
    DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_UNKNOWN_EXPIRY_SECS, MAX_CACHE_WINDOW_SECS,
};

/// Outcome of the latest refresh of one cache key.
#[derive(Debug, Default)]
struct EntryState {
    current: Option<TokenContext>,
    /// bumped by every finished refresh, successful or not
    generation: u64,
    last_error: Option<TokenError>,
}

#[derive(Debug, Default)]
struct CacheEntry {
    state: RwLock<EntryState>,
    /// held for the whole duration of a refresh
    retrieval: Mutex<()>,
}

/// Shared token cache: cache key -> entry.
///
/// At most one refresh per key is in flight; callers arriving during a
/// refresh wait for it and share its outcome. Entries are never evicted, the
/// key space is bounded by the configured credentials.
#[derive(Debug)]
pub struct ConcurrentTokenCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    safety_margin: TimeDelta,
    unknown_expiry_window: TimeDelta,
}

impl Default for ConcurrentTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentTokenCache {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_SAFETY_MARGIN_SECS, DEFAULT_UNKNOWN_EXPIRY_SECS)
    }

    /// Both durations are clamped to `MAX_CACHE_WINDOW_SECS`; the window is at least 1s.
    pub fn with_settings(safety_margin_seconds: u64, unknown_expiry_window_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            safety_margin: bounded_seconds(safety_margin_seconds),
            unknown_expiry_window: bounded_seconds(unknown_expiry_window_seconds.max(1)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Return a valid token for `retriever` and `scopes`, refreshing it
    /// through the retriever when missing or inside the safety margin.
    pub async fn get_access_token<R: TokenRetriever>(
        &self,
        ctx: &RequestContext,
        retriever: &R,
        scopes: &[String],
    ) -> Result<String, TokenError> {
        let metrics = get_metrics().await;
        let key = cache_key(&retriever.cache_key(ctx.tenant_scope()), scopes);
        let entry = self.entry(&key).await;

        // fast path: read lock only
        let observed_generation = {
            let state = entry.state.read().await;
            if let Some(cached) = state
                .current
                .as_ref()
                .filter(|c| c.is_servable(retriever.get_expiry()))
            {
                debug!(cache_key = %key, "token cache hit");
                metrics.cache_hits.inc();
                return Ok(cached.token.token.clone());
            }
            state.generation
        };

        metrics.cache_misses.inc();
        let _guard = tokio::select! {
            guard = entry.retrieval.lock() => guard,
            _ = ctx.cancelled() => {
                debug!(cache_key = %key, "cancelled while waiting for token refresh");
                return Err(TokenError::Cancelled);
            }
        };

        // someone else may have refreshed while we waited for the lock
        {
            let state = entry.state.read().await;
            if state.generation != observed_generation {
                metrics.shared_waits.inc();
                if let Some(err) = &state.last_error {
                    return Err(err.clone());
                }
                if let Some(cached) = &state.current {
                    return Ok(cached.token.token.clone());
                }
            }
            if let Some(cached) = state
                .current
                .as_ref()
                .filter(|c| c.is_servable(retriever.get_expiry()))
            {
                return Ok(cached.token.token.clone());
            }
        }

        let start = Instant::now();
        let result = tokio::select! {
            result = retrieve(retriever, ctx, scopes) => result,
            _ = ctx.cancelled() => {
                // entry untouched; the next waiter takes over the refresh
                warn!(cache_key = %key, "token refresh cancelled by caller");
                return Err(TokenError::Cancelled);
            }
        };
        metrics
            .token_refresh_duration
            .with_label_values(&[retriever.mechanism()])
            .observe(start.elapsed().as_secs_f64());

        let mut state = entry.state.write().await;
        state.generation += 1;
        match result {
            Ok(token) => {
                let context = TokenContext::new(
                    token,
                    retriever.get_expiry(),
                    self.safety_margin,
                    self.unknown_expiry_window,
                );
                info!(
                    cache_key = %key,
                    expires_at = %context.expires_at,
                    "token refreshed"
                );
                metrics.token_refreshes.with_label_values(&[retriever.mechanism()]).inc();
                let value = context.token.token.clone();
                state.current = Some(context);
                state.last_error = None;
                Ok(value)
            }
            Err(err) => {
                warn!(cache_key = %key, error = %err, "token refresh failed");
                metrics
                    .token_refresh_failures
                    .with_label_values(&[retriever.mechanism(), err.kind()])
                    .inc();
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn entry(&self, key: &str) -> Arc<CacheEntry> {
        if let Some(entry) = self.entries.read().await.get(key) {
            return entry.clone();
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(CacheEntry::default()))
            .clone()
    }
}

async fn retrieve<R: TokenRetriever>(
    retriever: &R,
    ctx: &RequestContext,
    scopes: &[String],
) -> Result<crate::cache::token::AccessToken, TokenError> {
    retriever.init().await?;
    retriever.get_access_token(ctx, scopes).await
}

fn bounded_seconds(secs: u64) -> TimeDelta {
    TimeDelta::try_seconds(secs.min(MAX_CACHE_WINDOW_SECS) as i64).unwrap_or(TimeDelta::zero())
}

/// Retriever identity plus the normalised scope set.
pub fn cache_key(retriever_key: &str, scopes: &[String]) -> String {
    let mut normalized: Vec<&str> = scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    normalized.sort_unstable();
    normalized.dedup();
    format!("{}|{}", retriever_key, normalized.join(" "))
}
