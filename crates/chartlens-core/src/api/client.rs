//! HTTP client for the hosted identity provider.
//!
//! Sign-in and sign-up answer in camelCase (`idToken`, `expiresIn`), the
//! refresh endpoint in snake_case (`id_token`, `expires_in`). Both are turned
//! into `TokenGrant`/`AccountGrant` here so nothing downstream sees the
//! difference.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{AccountGrant, TokenGrant, User};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for account endpoints (password sign-in, sign-up)
pub const IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Base URL for the secure token service (refresh)
pub const SECURE_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";

const SIGN_IN_PATH: &str = "accounts:signInWithPassword";
const SIGN_UP_PATH: &str = "accounts:signUp";
const REFRESH_PATH: &str = "token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The three operations the session manager needs from an identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Password sign-in
    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AccountGrant, ApiError>>;

    /// Account creation; same shape as `sign_in`
    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AccountGrant, ApiError>>;

    /// Exchange a refresh token for a new token pair
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenGrant, ApiError>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    email_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

impl PasswordResponse {
    /// Normalize into an `AccountGrant`. `email` is what the user typed and
    /// stands in when the provider does not echo it back.
    fn into_grant(self, email: &str) -> Result<AccountGrant, ApiError> {
        Ok(AccountGrant {
            tokens: TokenGrant {
                id_token: self.id_token,
                refresh_token: self.refresh_token,
                expires_in_secs: parse_expires_in(&self.expires_in)?,
            },
            user: User {
                local_id: self.local_id,
                email: self.email.unwrap_or_else(|| email.to_string()),
                display_name: self.display_name,
                email_verified: self.email_verified.unwrap_or(false),
            },
        })
    }
}

impl RefreshResponse {
    fn into_grant(self) -> Result<TokenGrant, ApiError> {
        Ok(TokenGrant {
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in_secs: parse_expires_in(&self.expires_in)?,
        })
    }
}

/// The provider sends token lifetimes as decimal strings of seconds.
fn parse_expires_in(value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::InvalidResponse(format!("expires_in is not a number: {:?}", value)))
}

/// Identity provider client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    api_key: String,
    identity_base_url: String,
    token_base_url: String,
}

impl IdentityClient {
    /// Create a client for the hosted provider
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            identity_base_url: IDENTITY_BASE_URL.to_string(),
            token_base_url: SECURE_TOKEN_BASE_URL.to_string(),
        })
    }

    /// Point the client at other hosts (emulator, staging, tests)
    pub fn with_base_urls(mut self, identity_base_url: impl Into<String>, token_base_url: impl Into<String>) -> Self {
        self.identity_base_url = identity_base_url.into().trim_end_matches('/').to_string();
        self.token_base_url = token_base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, base: &str, path: &str) -> String {
        format!("{}/{}?key={}", base, path, self.api_key)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.client.post(url).json(body).send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        debug!(path, "Identity provider response received");
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", path, e)))
    }

    async fn password_grant(&self, path: &'static str, email: &str, password: &str) -> Result<AccountGrant, ApiError> {
        let url = self.url(&self.identity_base_url, path);
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: PasswordResponse = self.post(&url, path, &body).await?;
        response.into_grant(email)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenGrant, ApiError> {
        let url = self.url(&self.token_base_url, REFRESH_PATH);
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        let response: RefreshResponse = self.post(&url, REFRESH_PATH, &body).await?;
        response.into_grant()
    }
}

impl IdentityProvider for IdentityClient {
    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AccountGrant, ApiError>> {
        self.password_grant(SIGN_IN_PATH, email, password).boxed()
    }

    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, Result<AccountGrant, ApiError>> {
        self.password_grant(SIGN_UP_PATH, email, password).boxed()
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenGrant, ApiError>> {
        self.refresh_grant(refresh_token).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> IdentityClient {
        IdentityClient::new("test-key")
            .unwrap()
            .with_base_urls(format!("{}/v1", server.uri()), format!("{}/v1/", server.uri()))
    }

    #[test]
    fn test_parse_sign_in_response() {
        let json = r#"{"kind":"identitytoolkit#VerifyPasswordResponse","localId":"uid-1","email":"ada@example.com","displayName":"Ada","idToken":"id-1","registered":true,"refreshToken":"refresh-1","expiresIn":"3600"}"#;
        let resp: PasswordResponse = serde_json::from_str(json).unwrap();
        let grant = resp.into_grant("typed@example.com").unwrap();

        assert_eq!(grant.tokens.expires_in_secs, 3600);
        assert_eq!(grant.user.email, "ada@example.com");
        assert_eq!(grant.user.display_name.as_deref(), Some("Ada"));
        assert!(!grant.user.email_verified);
    }

    #[test]
    fn test_sign_up_response_without_email_uses_input() {
        let json = r#"{"localId":"uid-2","idToken":"id-2","refreshToken":"refresh-2","expiresIn":"3600"}"#;
        let resp: PasswordResponse = serde_json::from_str(json).unwrap();
        let grant = resp.into_grant("new@example.com").unwrap();
        assert_eq!(grant.user.email, "new@example.com");
        assert_eq!(grant.user.display_name, None);
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in("3600").unwrap(), 3600);
        assert_eq!(parse_expires_in(" 200 ").unwrap(), 200);
        assert!(matches!(parse_expires_in("soon"), Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_sign_in_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({
                "email": "ada@example.com",
                "password": "secret1",
                "returnSecureToken": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1",
                "email": "ada@example.com",
                "idToken": "id-1",
                "refreshToken": "refresh-1",
                "expiresIn": "3600",
                "emailVerified": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .sign_in("ada@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(grant.tokens.id_token, "id-1");
        assert_eq!(grant.user.local_id, "uid-1");
        assert!(grant.user.email_verified);
    }

    #[tokio::test]
    async fn test_network_error_does_not_leak_api_key() {
        // Bind and release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let base = format!("http://127.0.0.1:{}/v1", port);
        let client = IdentityClient::new("secret-api-key")
            .unwrap()
            .with_base_urls(base.clone(), base);

        let err = client.sign_in("ada@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
        assert!(!format!("{err} {err:?}").contains("secret-api-key"));

        let err = crate::auth::AuthError::from(err);
        assert!(matches!(err, crate::auth::AuthError::Transport(_)));
        assert!(!err.to_string().contains("secret-api-key"));
    }

    #[tokio::test]
    async fn test_sign_up_hits_account_creation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-9",
                "email": "new@example.com",
                "idToken": "id-9",
                "refreshToken": "refresh-9",
                "expiresIn": "3600"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .sign_up("new@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(grant.user.local_id, "uid-9");
    }

    #[tokio::test]
    async fn test_rejection_keeps_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "EMAIL_EXISTS", "errors": []}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_up("ada@example.com", "secret1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "EMAIL_EXISTS");
        assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_refresh_normalizes_snake_case() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "expires_in": "3600",
                "token_type": "Bearer",
                "refresh_token": "refresh-2",
                "id_token": "id-2",
                "user_id": "uid-1",
                "project_id": "1234"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = client_for(&server).refresh("refresh-1").await.unwrap();
        assert_eq!(
            grant,
            TokenGrant {
                id_token: "id-2".to_string(),
                refresh_token: "refresh-2".to_string(),
                expires_in_secs: 3600,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("refresh-1").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
