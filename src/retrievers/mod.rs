//! Token retrievers: one strategy per identity mechanism.
//!
//! Each retriever knows how to obtain a token and how to name itself in the
//! token cache. `Retriever` closes over all built-in variants so the
//! dispatcher and the cache can work with a single concrete type.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::future::Future;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;

pub mod client_secret;
pub mod managed_identity;
pub mod on_behalf_of;
pub mod password;
pub mod token_client;
pub mod username;
pub mod workload_identity;

use client_secret::ClientSecretTokenRetriever;
use managed_identity::ManagedIdentityTokenRetriever;
use on_behalf_of::OnBehalfOfTokenRetriever;
use password::PasswordTokenRetriever;
use username::UsernameTokenRetriever;
use workload_identity::WorkloadIdentityTokenRetriever;

pub trait TokenRetriever: Send + Sync {
    /// Short mechanism label for logs and metrics.
    fn mechanism(&self) -> &'static str;

    /// Stable identity of the credential behind this retriever. Secrets only
    /// ever appear hashed.
    fn cache_key(&self, tenant_scope: &str) -> String;

    /// One-time lazy construction of the underlying credential. Idempotent:
    /// a success is kept, a failure is retried on the next call.
    fn init(&self) -> impl Future<Output = Result<(), TokenError>> + Send;

    fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> impl Future<Output = Result<AccessToken, TokenError>> + Send;

    /// Externally imposed expiry ceiling, independent of the issued token.
    fn get_expiry(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[derive(Debug)]
pub enum Retriever {
    ManagedIdentity(ManagedIdentityTokenRetriever),
    WorkloadIdentity(WorkloadIdentityTokenRetriever),
    ClientSecret(ClientSecretTokenRetriever),
    Password(PasswordTokenRetriever),
    OnBehalfOf(OnBehalfOfTokenRetriever),
    Username(UsernameTokenRetriever),
}

impl TokenRetriever for Retriever {
    fn mechanism(&self) -> &'static str {
        match self {
            Retriever::ManagedIdentity(r) => r.mechanism(),
            Retriever::WorkloadIdentity(r) => r.mechanism(),
            Retriever::ClientSecret(r) => r.mechanism(),
            Retriever::Password(r) => r.mechanism(),
            Retriever::OnBehalfOf(r) => r.mechanism(),
            Retriever::Username(r) => r.mechanism(),
        }
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        match self {
            Retriever::ManagedIdentity(r) => r.cache_key(tenant_scope),
            Retriever::WorkloadIdentity(r) => r.cache_key(tenant_scope),
            Retriever::ClientSecret(r) => r.cache_key(tenant_scope),
            Retriever::Password(r) => r.cache_key(tenant_scope),
            Retriever::OnBehalfOf(r) => r.cache_key(tenant_scope),
            Retriever::Username(r) => r.cache_key(tenant_scope),
        }
    }

    async fn init(&self) -> Result<(), TokenError> {
        match self {
            Retriever::ManagedIdentity(r) => r.init().await,
            Retriever::WorkloadIdentity(r) => r.init().await,
            Retriever::ClientSecret(r) => r.init().await,
            Retriever::Password(r) => r.init().await,
            Retriever::OnBehalfOf(r) => r.init().await,
            Retriever::Username(r) => r.init().await,
        }
    }

    async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        match self {
            Retriever::ManagedIdentity(r) => r.get_access_token(ctx, scopes).await,
            Retriever::WorkloadIdentity(r) => r.get_access_token(ctx, scopes).await,
            Retriever::ClientSecret(r) => r.get_access_token(ctx, scopes).await,
            Retriever::Password(r) => r.get_access_token(ctx, scopes).await,
            Retriever::OnBehalfOf(r) => r.get_access_token(ctx, scopes).await,
            Retriever::Username(r) => r.get_access_token(ctx, scopes).await,
        }
    }

    fn get_expiry(&self) -> Option<DateTime<Utc>> {
        match self {
            Retriever::OnBehalfOf(r) => r.get_expiry(),
            _ => None,
        }
    }
}

/// One-way hash for secrets that take part in cache keys.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// `<authority>/<tenant>/oauth2/v2.0/token`
pub(crate) fn authority_token_url(authority: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority.trim_end_matches('/'),
        tenant_id
    )
}
