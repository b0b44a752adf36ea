pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cache::token_cache::ConcurrentTokenCache;
use crate::provider::TokenProviderResolver;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Resolver over a fresh cache, so tests never share cached tokens.
pub fn fresh_resolver() -> TokenProviderResolver {
    TokenProviderResolver::new(Arc::new(ConcurrentTokenCache::new()), build_reqwest_client())
}

pub fn token_body(token: &str) -> serde_json::Value {
    json!({ "access_token": token, "token_type": "Bearer", "expires_in": 3600 })
}
