//! Firebase Authentication client over the Identity Toolkit REST API.
//!
//! Covers the sign-in flows the clients use (email/password and Google ID
//! token exchange), token refresh, and session persistence. Sign-out is local:
//! Firebase ID tokens cannot be revoked from the client.

use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{compact_text, is_http_url, unix_timestamp_now};

/// Production Identity Toolkit endpoint.
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
/// Production Secure Token endpoint (refresh).
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

const EXPIRY_SKEW_SECONDS: i64 = 60;
const GOOGLE_PROVIDER_ID: &str = "google.com";

/// The signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
            display_name: None,
            photo_url: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a client keeps the signed-in session between launches.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct FirebaseAuthClient<S: SessionPersistence> {
    api_key: String,
    identity_url: String,
    token_url: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> FirebaseAuthClient<S> {
    pub fn new(api_key: impl Into<String>, store: S) -> AuthResult<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Firebase API key must not be empty",
            ));
        }

        Ok(Self {
            api_key,
            identity_url: IDENTITY_TOOLKIT_URL.to_string(),
            token_url: SECURE_TOKEN_URL.to_string(),
            client: Client::builder().build()?,
            store,
        })
    }

    /// Use other endpoints, e.g. the auth emulator's
    /// `http://localhost:9099/identitytoolkit.googleapis.com/v1`.
    pub fn with_endpoints(mut self, identity_url: &str, token_url: &str) -> AuthResult<Self> {
        self.identity_url = normalize_endpoint(identity_url)?;
        self.token_url = normalize_endpoint(token_url)?;
        Ok(self)
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
            "returnSecureToken": true,
        });
        let request = self.keyed(
            self.client
                .post(format!("{}/accounts:signInWithPassword", self.identity_url))
                .json(&payload),
        );
        let session = send_auth_request::<SignInResponse>(request)
            .await?
            .into_session()?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Exchange a Google ID token obtained by the platform sign-in UI.
    pub async fn sign_in_with_google(&self, google_id_token: &str) -> AuthResult<AuthSession> {
        let google_id_token = google_id_token.trim();
        if google_id_token.is_empty() {
            return Err(AuthError::Api(
                "Google sign-in failed: missing ID token.".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "postBody": format!("id_token={google_id_token}&providerId={GOOGLE_PROVIDER_ID}"),
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        let request = self.keyed(
            self.client
                .post(format!("{}/accounts:signInWithIdp", self.identity_url))
                .json(&payload),
        );
        let session = send_auth_request::<SignInResponse>(request)
            .await?
            .into_session()?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Trade the refresh token for a new ID token, keeping the stored user.
    pub async fn refresh_session(&self, session: &AuthSession) -> AuthResult<AuthSession> {
        if session.refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let request = self.keyed(
            self.client
                .post(format!("{}/token", self.token_url))
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", session.refresh_token.as_str()),
                ]),
        );
        let refreshed = send_auth_request::<RefreshResponse>(request)
            .await?
            .into_session(session.user.clone())?;

        self.store.save_session(&refreshed)?;
        Ok(refreshed)
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        self.store.clear_session()
    }

    fn keyed(&self, request: RequestBuilder) -> RequestBuilder {
        request.query(&[("key", self.api_key.as_str())])
    }
}

async fn send_auth_request<T: serde::de::DeserializeOwned>(
    request: RequestBuilder,
) -> AuthResult<T> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Api(parse_api_error(status, &body)));
    }
    Ok(response.json::<T>().await?)
}

fn normalize_endpoint(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Auth endpoint must not be empty",
        ));
    }
    if !is_http_url(trimmed) {
        return Err(AuthError::InvalidConfiguration(
            "Auth endpoint must include http:// or https://",
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

fn parse_expires_in(raw: Option<&str>) -> AuthResult<i64> {
    let seconds = raw
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| AuthError::Api("Auth response did not include expiresIn".to_string()))?;
    Ok(unix_timestamp_now().saturating_add(seconds))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl SignInResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        let expires_at = parse_expires_in(self.expires_in.as_deref())?;
        match (self.id_token, self.refresh_token, self.local_id) {
            (Some(id_token), Some(refresh_token), Some(uid)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at,
                user: AuthUser {
                    uid,
                    email: self.email.filter(|email| !email.trim().is_empty()),
                    display_name: self.display_name.filter(|name| !name.trim().is_empty()),
                    photo_url: self.photo_url.filter(|url| !url.trim().is_empty()),
                },
            }),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    user_id: Option<String>,
}

impl RefreshResponse {
    fn into_session(self, user: AuthUser) -> AuthResult<AuthSession> {
        if self.user_id.as_deref().is_some_and(|uid| uid != user.uid) {
            return Err(AuthError::Api(
                "Refresh response belongs to a different user".to_string(),
            ));
        }
        let expires_at = parse_expires_in(self.expires_in.as_deref())?;
        match (self.id_token, self.refresh_token) {
            (Some(id_token), Some(refresh_token)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at,
                user,
            }),
            _ => Err(AuthError::Api(
                "Refresh response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorResponse {
    error: Option<FirebaseErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorDetail {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<FirebaseErrorResponse>(body) {
        if let Some(message) = payload.error.and_then(|detail| detail.message) {
            return format!("{} ({})", describe_error_code(message.trim()), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

// Identity Toolkit reports codes like `INVALID_PASSWORD : detail`.
fn describe_error_code(message: &str) -> String {
    let code = message.split(':').next().unwrap_or(message).trim();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later".to_string(),
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" => "Session expired, sign in again".to_string(),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemorySessionStore {
        session: Arc<Mutex<Option<AuthSession>>>,
    }

    impl SessionPersistence for MemorySessionStore {
        fn load_session(&self) -> AuthResult<Option<AuthSession>> {
            Ok(self.session.lock().unwrap().clone())
        }

        fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
            *self.session.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        fn clear_session(&self) -> AuthResult<()> {
            *self.session.lock().unwrap() = None;
            Ok(())
        }
    }

    fn session(expires_at: i64) -> AuthSession {
        AuthSession {
            id_token: "secret-id-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at,
            user: AuthUser::new("uid-1", Some("ann@example.com".to_string())),
        }
    }

    #[test]
    fn new_rejects_empty_api_key() {
        assert!(FirebaseAuthClient::new("  ", MemorySessionStore::default()).is_err());
    }

    #[test]
    fn with_endpoints_requires_http_urls() {
        let client = FirebaseAuthClient::new("key", MemorySessionStore::default()).unwrap();
        assert!(client
            .clone()
            .with_endpoints("localhost:9099", SECURE_TOKEN_URL)
            .is_err());
        let emulator = client
            .with_endpoints(
                "http://localhost:9099/identitytoolkit.googleapis.com/v1/",
                "http://localhost:9099/securetoken.googleapis.com/v1",
            )
            .unwrap();
        assert_eq!(
            emulator.identity_url,
            "http://localhost:9099/identitytoolkit.googleapis.com/v1"
        );
    }

    #[tokio::test]
    async fn restore_returns_unexpired_session_without_network() {
        let store = MemorySessionStore::default();
        let stored = session(unix_timestamp_now() + 3_600);
        store.save_session(&stored).unwrap();

        let client = FirebaseAuthClient::new("key", store).unwrap();
        assert_eq!(client.restore_session().await.unwrap(), Some(stored));
    }

    #[test]
    fn sign_out_clears_persisted_session() {
        let store = MemorySessionStore::default();
        store.save_session(&session(0)).unwrap();
        let client = FirebaseAuthClient::new("key", store.clone()).unwrap();

        client.sign_out().unwrap();
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn sign_in_response_maps_to_session() {
        let response: SignInResponse = serde_json::from_value(serde_json::json!({
            "idToken": "id",
            "refreshToken": "refresh",
            "expiresIn": "3600",
            "localId": "uid-9",
            "email": "Zed@Example.com",
            "displayName": "",
            "photoUrl": "https://photo"
        }))
        .unwrap();

        let session = response.into_session().unwrap();
        assert_eq!(session.user.uid, "uid-9");
        assert_eq!(session.user.email.as_deref(), Some("Zed@Example.com"));
        assert_eq!(session.user.display_name, None);
        assert!(!session.is_expired());
    }

    #[test]
    fn sign_in_response_without_tokens_is_an_error() {
        let response: SignInResponse =
            serde_json::from_value(serde_json::json!({ "expiresIn": "3600" })).unwrap();
        assert!(response.into_session().is_err());
    }

    #[test]
    fn refresh_response_rejects_other_user() {
        let response: RefreshResponse = serde_json::from_value(serde_json::json!({
            "id_token": "id",
            "refresh_token": "refresh",
            "expires_in": "3600",
            "user_id": "someone-else"
        }))
        .unwrap();
        assert!(response
            .into_session(AuthUser::new("uid-1", None))
            .is_err());
    }

    #[test]
    fn parse_api_error_humanizes_known_codes() {
        let body = r#"{"error":{"code":400,"message":"INVALID_LOGIN_CREDENTIALS"}}"#;
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, body),
            "Invalid email or password (400)"
        );
        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : too short"}}"#;
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, body),
            "WEAK_PASSWORD : too short (400)"
        );
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session(1_700_000_000));
        assert!(!rendered.contains("secret-id-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
