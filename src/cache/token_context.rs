use chrono::{DateTime, TimeDelta, Utc};
use crate::cache::token::AccessToken;

/// Cached token plus the instants that govern it
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub token: AccessToken,
    /// min(token expiry, retriever ceiling)
    pub expires_at: DateTime<Utc>,
    /// serve from cache strictly before this instant
    pub refresh_at: DateTime<Utc>,
}

impl TokenContext {
    pub fn new(
        token: AccessToken,
        ceiling: Option<DateTime<Utc>>,
        safety_margin: TimeDelta,
        unknown_expiry_window: TimeDelta,
    ) -> Self {
        let now = Utc::now();
        let known_expiry = match (token.expires_on, ceiling) {
            (Some(exp), Some(ceiling)) => Some(exp.min(ceiling)),
            (exp, ceiling) => exp.or(ceiling),
        };
        let (expires_at, refresh_at) = match known_expiry {
            Some(expires_at) => (
                expires_at,
                expires_at
                    .checked_sub_signed(safety_margin)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            ),
            // no expiry reported: keep it for a fixed window, margin does not apply
            None => {
                let expires_at = now
                    .checked_add_signed(unknown_expiry_window)
                    .unwrap_or(now);
                (expires_at, expires_at)
            }
        };
        Self {
            token,
            expires_at,
            refresh_at,
        }
    }

    /// Check if token should be updated
    pub fn should_update(&self) -> bool {
        Utc::now() >= self.refresh_at
    }

    /// Valid for serving: before the refresh instant and, if the retriever
    /// currently imposes a ceiling, before that as well.
    pub fn is_servable(&self, ceiling: Option<DateTime<Utc>>) -> bool {
        if self.should_update() {
            return false;
        }
        ceiling.map(|c| Utc::now() < c).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(secs: i64) -> AccessToken {
        AccessToken::new("t".into(), Some(Utc::now() + TimeDelta::seconds(secs)))
    }

    #[test]
    fn safety_margin_moves_refresh_before_expiry() {
        let ctx = TokenContext::new(token_expiring_in(3600), None, TimeDelta::seconds(60), TimeDelta::seconds(300));
        assert_eq!(ctx.expires_at - ctx.refresh_at, TimeDelta::seconds(60));
        assert!(ctx.is_servable(None));
    }

    #[test]
    fn token_inside_margin_needs_refresh() {
        let ctx = TokenContext::new(token_expiring_in(30), None, TimeDelta::seconds(60), TimeDelta::seconds(300));
        assert!(ctx.should_update());
        assert!(!ctx.is_servable(None));
    }

    #[test]
    fn ceiling_caps_expiry() {
        let ceiling = Utc::now() + TimeDelta::seconds(600);
        let ctx = TokenContext::new(token_expiring_in(3600), Some(ceiling), TimeDelta::seconds(60), TimeDelta::seconds(300));
        assert_eq!(ctx.expires_at, ceiling);
    }

    #[test]
    fn passed_ceiling_overrides_valid_token() {
        let ctx = TokenContext::new(token_expiring_in(3600), None, TimeDelta::seconds(60), TimeDelta::seconds(300));
        let passed = Utc::now() - TimeDelta::seconds(1);
        assert!(!ctx.is_servable(Some(passed)));
    }

    #[test]
    fn expiry_at_the_edge_of_time_needs_refresh() {
        let token = AccessToken::new("t".into(), Some(DateTime::<Utc>::MIN_UTC));
        let ctx = TokenContext::new(token, None, TimeDelta::seconds(60), TimeDelta::seconds(300));
        assert_eq!(ctx.refresh_at, DateTime::<Utc>::MIN_UTC);
        assert!(!ctx.is_servable(None));
    }

    #[test]
    fn unknown_expiry_uses_window() {
        let ctx = TokenContext::new(AccessToken::new("t".into(), None), None, TimeDelta::seconds(60), TimeDelta::seconds(300));
        assert!(ctx.is_servable(None));
        assert!(ctx.expires_at > Utc::now() + TimeDelta::seconds(290));
    }
}
