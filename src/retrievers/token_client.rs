/// OAuth2 grant endpoint client
///
/// Form-encoded POST against a token endpoint, JSON response parsing and the
/// grant flows used by the delegated (user) retrievers.
use chrono::{TimeDelta, Utc};
use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use http::StatusCode;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::debug;

use crate::cache::token::AccessToken;
use crate::context::RequestContext;
use crate::error::TokenError;

pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const GRANT_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const GRANT_USERNAME: &str = "username";
pub const GRANT_PASSWORD: &str = "password";
pub const CLIENT_ASSERTION_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const CLIENT_SKU: &str = env!("CARGO_PKG_NAME");
const CLIENT_VER: &str = env!("CARGO_PKG_VERSION");

/// Token endpoint response body
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub expires_in: Option<i64>,
}

/// Endpoint and client identity for the delegated grant flows.
#[derive(Clone)]
pub struct TokenClient {
    http: Client,
    endpoint_url: String,
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClient")
            .field("endpoint_url", &self.endpoint_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl TokenClient {
    pub fn new(http: Client, endpoint_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            endpoint_url,
            client_id,
            client_secret,
        }
    }

    pub async fn from_client_secret(
        &self,
        ctx: &RequestContext,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        let form = vec![("grant_type", GRANT_CLIENT_CREDENTIALS.to_owned())];
        self.request_token(ctx, form, scopes, false).await
    }

    pub async fn on_behalf_of(
        &self,
        ctx: &RequestContext,
        id_token: &str,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        let form = vec![
            ("grant_type", GRANT_JWT_BEARER.to_owned()),
            ("assertion", id_token.to_owned()),
            ("requested_token_use", "on_behalf_of".to_owned()),
        ];
        self.request_token(ctx, form, scopes, true).await
    }

    pub async fn from_username(
        &self,
        ctx: &RequestContext,
        username: &str,
        scopes: &[String],
    ) -> Result<AccessToken, TokenError> {
        let form = vec![
            ("grant_type", GRANT_USERNAME.to_owned()),
            ("username", username.to_owned()),
        ];
        self.request_token(ctx, form, scopes, true).await
    }

    /// End-user cookies go only to grants made on behalf of that user.
    async fn request_token(
        &self,
        ctx: &RequestContext,
        mut form: Vec<(&'static str, String)>,
        scopes: &[String],
        forward_cookies: bool,
    ) -> Result<AccessToken, TokenError> {
        form.push(("client_id", self.client_id.to_owned()));
        form.push(("client_secret", self.client_secret.to_owned()));
        form.push(("scope", scope_param(scopes)));

        let cookies = ctx
            .current_user()
            .filter(|_| forward_cookies)
            .and_then(|u| u.cookies.as_deref());
        let response = request_url_form(&self.http, &self.endpoint_url, &form, cookies).await?;
        parse_access_token(response)
    }
}

/// Scopes trimmed, blanks dropped, space separated.
pub fn scope_param(scopes: &[String]) -> String {
    scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_access_token(response: TokenResponse) -> Result<AccessToken, TokenError> {
    let token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TokenError::token_request("token response doesn't contain 'access_token' field"))?;
    // out of range lifetimes are treated like a missing one
    let expires_on = response
        .expires_in
        .filter(|secs| *secs > 0)
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
    Ok(AccessToken::new(token, expires_on))
}

/// POST `form` to `url` and decode the JSON token response.
pub async fn request_url_form(
    http: &Client,
    url: &str,
    form: &[(&str, String)],
    cookies: Option<&str>,
) -> Result<TokenResponse, TokenError> {
    let mut request = http
        .post(url)
        .header(ACCEPT, "application/json")
        .header("X-Client-SKU", CLIENT_SKU)
        .header("X-Client-Ver", CLIENT_VER)
        .form(form);
    if let Some(cookies) = cookies.and_then(sanitize_cookies) {
        request = request.header(COOKIE, cookies);
    }

    let response = request.send().await?;
    read_token_response(response).await
}

/// Shared status / content-type handling of token endpoint responses.
pub async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, TokenError> {
    let status = response.status();
    let content_type = media_type(&response);
    debug!(%status, content_type = %content_type, "token endpoint responded");

    if status != StatusCode::OK {
        let mut message = format!("request failed with status {}", status);
        if content_type == "application/json" {
            if let Ok(body) = response.text().await {
                if !body.is_empty() {
                    message.push_str(&format!(", body {}", body));
                }
            }
        }
        return Err(TokenError::TokenRequest(message));
    }
    if content_type != "application/json" {
        return Err(TokenError::TokenRequest(format!(
            "invalid response content-type '{}'",
            content_type
        )));
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| TokenError::TokenRequest(format!("unable to read response: {}", e)))
}

fn media_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_default()
}

/// Strip CR/LF so forwarded cookies cannot inject headers.
fn sanitize_cookies(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_owned())
    }
}

/// `expires_in` arrives as a number from most endpoints and as a string from
/// instance metadata.
pub fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Seconds>::deserialize(deserializer)? {
        Some(Seconds::Number(n)) => Some(n),
        Some(Seconds::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CurrentUser;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn client(server: &MockServer) -> TokenClient {
        TokenClient::new(
            Client::new(),
            server.url("/token"),
            "test-client-id".into(),
            "test-client-secret".into(),
        )
    }

    fn scopes() -> Vec<String> {
        vec!["https://graph.microsoft.com/.default".into()]
    }

    #[tokio::test]
    async fn parses_token_and_expiry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("accept", "application/json")
                    .form_urlencoded_tuple("grant_type", "client_credentials")
                    .form_urlencoded_tuple("client_id", "test-client-id")
                    .form_urlencoded_tuple("client_secret", "test-client-secret")
                    .form_urlencoded_tuple("scope", "https://graph.microsoft.com/.default");
                then.status(200)
                    .header("content-type", "application/json; charset=utf-8")
                    .json_body(json!({"access_token": "T", "expires_in": 3600}));
            })
            .await;

        let token = client(&server)
            .from_client_secret(&RequestContext::new(), &scopes())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(token.token, "T");
        let remaining = token.expires_on.unwrap() - Utc::now();
        assert!(remaining > TimeDelta::seconds(3590) && remaining <= TimeDelta::seconds(3600));
    }

    #[tokio::test]
    async fn missing_access_token_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"expires_in": 3600}));
            })
            .await;

        let err = client(&server)
            .from_client_secret(&RequestContext::new(), &scopes())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::TokenRequest(ref m) if m.contains("access_token")));
    }

    #[tokio::test]
    async fn missing_expiry_means_unknown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"access_token": "T"}));
            })
            .await;

        let token = client(&server)
            .from_client_secret(&RequestContext::new(), &scopes())
            .await
            .unwrap();
        assert_eq!(token.expires_on, None);
    }

    #[tokio::test]
    async fn non_200_status_is_an_error_with_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400)
                    .header("content-type", "application/json")
                    .json_body(json!({"error": "invalid_grant"}));
            })
            .await;

        let err = client(&server)
            .on_behalf_of(&RequestContext::new(), "id-token", &scopes())
            .await
            .unwrap_err();
        match err {
            TokenError::TokenRequest(msg) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("invalid_grant"));
                assert!(!msg.contains("test-client-secret"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_content_type_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html></html>");
            })
            .await;

        let err = client(&server)
            .from_client_secret(&RequestContext::new(), &scopes())
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::TokenRequest(ref m) if m.contains("content-type")));
    }

    #[tokio::test]
    async fn on_behalf_of_sends_assertion() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .form_urlencoded_tuple("grant_type", GRANT_JWT_BEARER)
                    .form_urlencoded_tuple("assertion", "FAKE_ID_TOKEN")
                    .form_urlencoded_tuple("requested_token_use", "on_behalf_of");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"access_token": "obo", "expires_in": 60}));
            })
            .await;

        let token = client(&server)
            .on_behalf_of(&RequestContext::new(), "FAKE_ID_TOKEN", &scopes())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(token.token, "obo");
    }

    #[tokio::test]
    async fn username_grant_and_sanitized_cookies() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .header("cookie", "session=abc123; theme=dark; lang=en")
                    .form_urlencoded_tuple("grant_type", "username")
                    .form_urlencoded_tuple("username", "user1@example.org");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"access_token": "u", "expires_in": "3600"}));
            })
            .await;

        let ctx = RequestContext::new().with_current_user(
            CurrentUser::new("user1@example.org").with_cookies("session=abc123\n; theme=dark\r\n; lang=en"),
        );
        let token = client(&server)
            .from_username(&ctx, "user1@example.org", &scopes())
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(token.expires_on.is_some());
    }

    #[tokio::test]
    async fn client_credentials_grant_never_forwards_user_cookies() {
        let server = MockServer::start_async().await;
        let leaked = server
            .mock_async(|when, then| {
                when.method(POST).path("/token").header_exists("cookie");
                then.status(400)
                    .header("content-type", "application/json")
                    .json_body(json!({"error": "cookie forwarded"}));
            })
            .await;
        let clean = server
            .mock_async(|when, then| {
                when.method(POST).path("/token").header_missing("cookie");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"access_token": "svc", "expires_in": 3600}));
            })
            .await;

        let ctx = RequestContext::new().with_current_user(
            CurrentUser::new("user1@example.org").with_cookies("grafana_session=SECRET"),
        );
        let token = client(&server).from_client_secret(&ctx, &scopes()).await.unwrap();

        assert_eq!(token.token, "svc");
        clean.assert_async().await;
        leaked.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn out_of_range_expires_in_means_unknown_expiry() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"access_token": "T", "expires_in": i64::MAX}));
            })
            .await;

        let token = client(&server)
            .from_client_secret(&RequestContext::new(), &scopes())
            .await
            .unwrap();
        assert_eq!(token.token, "T");
        assert_eq!(token.expires_on, None);
    }

    #[test]
    fn huge_string_lifetime_does_not_overflow() {
        let response = TokenResponse {
            access_token: Some("T".into()),
            expires_in: Some(9_000_000_000_000),
        };
        assert_eq!(parse_access_token(response).unwrap().expires_on, None);
    }

    #[test]
    fn scope_param_drops_blank_scopes() {
        let scopes = vec![" a ".to_owned(), "".to_owned(), "  ".to_owned(), "b".to_owned()];
        assert_eq!(scope_param(&scopes), "a b");
    }

    #[test]
    fn cookies_that_become_empty_are_dropped() {
        assert_eq!(sanitize_cookies("\n\r\n"), None);
        assert_eq!(sanitize_cookies("a=b\r\n"), Some("a=b".to_owned()));
    }
}
