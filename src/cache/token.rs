use chrono::{DateTime, Utc};
use std::fmt;

/// Bearer token as issued by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// `None` when the provider did not say when the token expires
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: String, expires_on: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_on }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[redacted]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}
