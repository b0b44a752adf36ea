//! Per-request context handed to the dispatcher and the cache.
//!
//! Carries the caller's cancellation signal, the tenant scope used to
//! partition cache keys in multi-tenant deployments, and the end user the
//! inbound request was made by (if any).

use std::fmt;
use tokio_util::sync::CancellationToken;

/// End user of an inbound request, as vouched for by the host.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CurrentUser {
    pub login: String,
    /// ID token / assertion for the on-behalf-of exchange
    pub delegated_assertion: Option<String>,
    /// raw `Cookie` header of the inbound request
    pub cookies: Option<String>,
}

impl CurrentUser {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            ..Default::default()
        }
    }

    pub fn with_assertion(mut self, assertion: impl Into<String>) -> Self {
        self.delegated_assertion = Some(assertion.into());
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }
}

impl fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentUser")
            .field("login", &self.login)
            .field("delegated_assertion", &self.delegated_assertion.as_ref().map(|_| "[redacted]"))
            .field("cookies", &self.cookies.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    tenant_scope: Option<String>,
    user: Option<CurrentUser>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_current_user(mut self, user: CurrentUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_tenant_scope(mut self, tenant_scope: impl Into<String>) -> Self {
        self.tenant_scope = Some(tenant_scope.into());
        self
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    /// Empty when the deployment is single tenant.
    pub fn tenant_scope(&self) -> &str {
        self.tenant_scope.as_deref().unwrap_or("")
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
