use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;
use crate::retrievers::token_client::TokenClient;
use crate::retrievers::TokenRetriever;

/// Exchanges the end user's ID token for an access token on their behalf.
pub struct OnBehalfOfTokenRetriever {
    client: TokenClient,
    user_id: String,
    id_token: String,
}

impl fmt::Debug for OnBehalfOfTokenRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnBehalfOfTokenRetriever")
            .field("client", &self.client)
            .field("user_id", &self.user_id)
            .field("id_token", &"[redacted]")
            .finish()
    }
}

impl OnBehalfOfTokenRetriever {
    pub fn new(client: TokenClient, user_id: String, id_token: String) -> Self {
        Self {
            client,
            user_id,
            id_token,
        }
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// `exp` claim of an unverified JWT. Anything malformed yields `None`.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

impl TokenRetriever for OnBehalfOfTokenRetriever {
    fn mechanism(&self) -> &'static str {
        "onbehalfof"
    }

    fn cache_key(&self, tenant_scope: &str) -> String {
        format!("currentuser|idtoken|{}|{}", self.user_id, tenant_scope)
    }

    async fn init(&self) -> Result<(), TokenError> {
        Ok(())
    }

    async fn get_access_token(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        self.client.on_behalf_of(ctx, &self.id_token, scopes).await
    }

    /// A delegated token must not outlive the assertion it was issued for.
    fn get_expiry(&self) -> Option<DateTime<Utc>> {
        jwt_expiry(&self.id_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    fn retriever(id_token: &str) -> OnBehalfOfTokenRetriever {
        OnBehalfOfTokenRetriever::new(
            TokenClient::new(Client::new(), "http://127.0.0.1:1/token".into(), "c".into(), "s".into()),
            "user1@example.org".into(),
            id_token.into(),
        )
    }

    #[test]
    fn expiry_comes_from_exp_claim() {
        let r = retriever(&jwt(r#"{"sub":"u","exp":1893456000}"#));
        assert_eq!(r.get_expiry().map(|d| d.timestamp()), Some(1893456000));
    }

    #[test]
    fn malformed_assertion_has_no_ceiling() {
        assert_eq!(retriever("FAKE_ID_TOKEN").get_expiry(), None);
        assert_eq!(retriever("a.!!!.c").get_expiry(), None);
        assert_eq!(retriever(&jwt(r#"{"sub":"u"}"#)).get_expiry(), None);
        assert_eq!(retriever(&jwt("not json")).get_expiry(), None);
    }

    #[test]
    fn cache_key_is_per_user_and_debug_hides_token() {
        let r = retriever("FAKE_ID_TOKEN");
        assert_eq!(r.cache_key("t"), "currentuser|idtoken|user1@example.org|t");
        assert!(!format!("{:?}", r).contains("FAKE_ID_TOKEN"));
    }
}
