//! # Cloud Token Agent
//!
//! Acquires OAuth2 bearer tokens for outbound cloud API calls and keeps
//! them in a concurrent, single-flight cache.
//!
//! Modules:
//! - `config`: YAML service configuration, auth settings and credentials
//! - `provider`: credential dispatcher resolving service and user providers
//! - `retrievers`: grant flows (managed/workload identity, client secret, delegated user)
//! - `cache`: per credential/tenant/scope token cache with shared refreshes
//! - `endpoint`: allowlist of destinations tokens may be sent to
//! - `http`: outbound client attaching bearer tokens
//! - `server`: `/token/{name}` HTTP surface

pub mod cache;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod observability;
pub mod provider;
pub mod retrievers;
pub mod server;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::credentials::Credential;
pub use crate::context::{CurrentUser, RequestContext};
pub use crate::endpoint::EndpointAllowlist;
pub use crate::error::{AllowlistError, TokenError};
pub use crate::provider::{TokenProvider, TokenProviderResolver};
