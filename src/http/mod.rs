//! Outbound HTTP with bearer authentication.
//!
//! `AuthorizedClient` checks the destination against the endpoint allowlist,
//! fetches a token through the configured provider and only then sends.

pub mod client;
pub mod options;

pub use client::{AuthorizedClient, RequestError};
pub use options::{AccessTokenProvider, AuthOptions, TokenFuture, TokenProviderFactory};
