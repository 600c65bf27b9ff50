//! Service-account credentials for the Sheets API.
//!
//! The key JSON is exchanged for a short-lived bearer token using the
//! JWT-bearer grant: an RS256 assertion signed with the key's private key is
//! posted to the key's `token_uri`.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const SPREADSHEETS_READONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/spreadsheets.readonly";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("service account key is invalid: {0}")]
    InvalidKey(String),
    #[error("service account private key could not be loaded: {0}")]
    InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),
    #[error("token assertion could not be signed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("token endpoint rejected the assertion with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("token endpoint request failed: {0}")]
    Transport(String),
    #[error("token endpoint response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let key: Self =
            serde_json::from_str(raw).map_err(|error| AuthError::InvalidKey(error.to_string()))?;
        if key.client_email.trim().is_empty() {
            return Err(AuthError::InvalidKey("client_email is empty".to_owned()));
        }
        if !key.private_key.contains("PRIVATE KEY") {
            return Err(AuthError::InvalidKey("private_key is not a PEM block".to_owned()));
        }
        Ok(key)
    }
}

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct ServiceAccountTokenProvider {
    client: Client,
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Parses the private key up front so a bad key fails at startup.
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(AuthError::InvalidPrivateKey)?;
        Ok(Self {
            client,
            client_email: key.client_email,
            token_uri: key.token_uri,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SPREADSHEETS_READONLY_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(AuthError::Signing)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, AuthError> {
        let assertion = self.signed_assertion(now)?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|error| AuthError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(
                event_name = "sheets.auth.rejected",
                status = status.as_u16(),
                client_email = %self.client_email,
                "service account token exchange rejected"
            );
            return Err(AuthError::Rejected { status: status.as_u16(), detail });
        }

        let token: TokenResponse =
            response.json().await.map_err(|error| AuthError::Decode(error.to_string()))?;
        if token.access_token.is_empty() {
            return Err(AuthError::Decode("token endpoint returned empty access token".to_owned()));
        }

        let expires_at = token_expiry(now, token.expires_in)?;
        debug!(
            event_name = "sheets.auth.token_issued",
            lifetime_secs = (expires_at - now).num_seconds(),
            "access token issued"
        );
        Ok(CachedToken { value: token.access_token, expires_at })
    }
}

/// `expires_in` is clamped to the assertion lifetime; out-of-range values never panic.
fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> Result<DateTime<Utc>, AuthError> {
    let lifetime = expires_in.unwrap_or(ASSERTION_LIFETIME_SECS).clamp(0, ASSERTION_LIFETIME_SECS);
    Duration::try_seconds(lifetime)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::Decode(format!("token lifetime {lifetime}s is out of range")))
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange(now).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}
