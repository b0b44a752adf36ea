use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::header::COOKIE;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::config::types::ServiceConfig;
use crate::context::{CurrentUser, RequestContext};
use crate::endpoint::{endpoint, EndpointAllowlist};
use crate::error::TokenError;
use crate::observability::metrics::get_metrics;
use crate::provider::{TokenProvider, TokenProviderResolver};
use crate::server::server::AppState;
use crate::utils::constants::{HEADER_ID_TOKEN, HEADER_TENANT_ID, HEADER_USER_LOGIN};

/// Provider resolved at startup for one named credential.
#[derive(Debug)]
pub struct NamedProvider {
    pub provider: TokenProvider,
    pub scopes: Vec<String>,
}

#[derive(Clone, Default)]
pub struct TokenState {
    providers: Arc<HashMap<String, NamedProvider>>,
    /// `None` when no allowlist is configured
    allowlist: Option<Arc<EndpointAllowlist>>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub endpoint: Option<String>,
}

impl TokenState {
    /// Resolve every configured credential; any failure is fatal.
    pub fn build(config: &ServiceConfig, resolver: &TokenProviderResolver) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();
        for (name, entry) in &config.credentials {
            let provider = resolver
                .resolve_provider(&config.auth, &entry.credential, true)
                .map_err(|e| anyhow::anyhow!("credential '{}': {}", name, e))?;
            providers.insert(
                name.clone(),
                NamedProvider {
                    provider,
                    scopes: entry.scopes.clone(),
                },
            );
        }
        let allowlist = if config.allowed_endpoints.is_empty() {
            None
        } else {
            Some(Arc::new(EndpointAllowlist::compile(&config.allowed_endpoints)?))
        };
        Ok(Self {
            providers: Arc::new(providers),
            allowlist,
        })
    }

    pub fn router(&self) -> Router<AppState> {
        Router::new().route("/token/{name}", get(get_token))
    }
}

/// End user and tenant as forwarded by the host in request headers.
fn request_context(headers: &HeaderMap) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let mut ctx = RequestContext::new();
    if let Some(tenant) = header(HEADER_TENANT_ID) {
        ctx = ctx.with_tenant_scope(tenant);
    }
    if let Some(login) = header(HEADER_USER_LOGIN) {
        let mut user = CurrentUser::new(login);
        if let Some(id_token) = header(HEADER_ID_TOKEN) {
            user = user.with_assertion(id_token);
        }
        if let Some(cookies) = header(COOKIE.as_str()) {
            user = user.with_cookies(cookies);
        }
        ctx = ctx.with_current_user(user);
    }
    ctx
}

fn error_status(err: &TokenError) -> StatusCode {
    match err {
        TokenError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        TokenError::FallbackNotEnabled
        | TokenError::MissingDelegatedToken
        | TokenError::UnassociatedRequest => StatusCode::UNAUTHORIZED,
        TokenError::TokenRequest(_) => StatusCode::BAD_GATEWAY,
        TokenError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        TokenError::Configuration(_)
        | TokenError::UnsupportedCredential(_)
        | TokenError::UnsupportedCloud(_)
        | TokenError::InvalidFallbackCredential(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, kind: &str, message: String) -> Response {
    (status, Json(json!({ "error": kind, "message": message }))).into_response()
}

async fn get_token(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    let metrics = get_metrics().await;
    let token_state = &state.token_state;

    let Some(named) = token_state.providers.get(&name) else {
        metrics.token_requests.with_label_values(&["unknown", "404"]).inc();
        return error_response(
            StatusCode::NOT_FOUND,
            "unknown_credential",
            format!("credential '{}' is not configured", name),
        );
    };

    if let (Some(allowlist), Some(target)) = (&token_state.allowlist, query.endpoint.as_deref()) {
        let allowed = Url::parse(target)
            .map(|u| allowlist.is_allowed(&u))
            .unwrap_or(false);
        if !allowed {
            let shown = Url::parse(target)
                .ok()
                .and_then(|u| endpoint(&u))
                .unwrap_or_else(|| "<invalid>".to_owned());
            warn!(credential = %name, endpoint = %shown, "token refused for endpoint outside allowlist");
            metrics.allowlist_rejections.inc();
            metrics.token_requests.with_label_values(&[name.as_str(), "403"]).inc();
            return error_response(
                StatusCode::FORBIDDEN,
                "endpoint_not_allowed",
                format!("request endpoint '{}' is not allowed", shown),
            );
        }
    }

    let ctx = request_context(&headers);
    match named.provider.get_access_token(&ctx, &named.scopes).await {
        Ok(token) => {
            debug!(credential = %name, "token issued");
            metrics.token_requests.with_label_values(&[name.as_str(), "200"]).inc();
            (
                StatusCode::OK,
                Json(json!({ "access_token": token, "token_type": "Bearer" })),
            )
                .into_response()
        }
        Err(err) => {
            let status = error_status(&err);
            warn!(credential = %name, error = %err, "token request failed");
            metrics
                .token_requests
                .with_label_values(&[name.as_str(), status.as_str()])
                .inc();
            error_response(status, err.kind(), err.to_string())
        }
    }
}
