//! Google service-account authentication.
//!
//! Signs a JWT with the service account's private key and exchanges it at
//! the account's `token_uri` for an OAuth2 access token. Tokens are cached
//! and refreshed shortly before they expire.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::adapters::truncate_body;

/// Scopes needed to upload to Drive and edit Docs
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/documents",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("Failed to sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token endpoint rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// The fields of a service-account JSON key that we use
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
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

impl ServiceAccountKey {
    /// Parse the JSON key payload (as downloaded from the cloud console)
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let key: Self =
            serde_json::from_str(json).map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;

        if key.client_email.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("client_email is empty".to_string()));
        }
        if key.private_key.trim().is_empty() {
            return Err(AuthError::InvalidCredentials("private_key is empty".to_string()));
        }

        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME_SECS
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Access-token provider shared by the Drive and Docs clients
pub struct GoogleAuth {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    /// Build from a parsed key. Fails if the private key is not valid PEM.
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self, AuthError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            key,
            signing_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES.join(" "),
            aud: &self.key.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };

        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?)
    }

    /// A valid bearer token, fetching a new one when needed
    #[instrument(skip(self), fields(account = %self.key.client_email))]
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let token: TokenResponse = response.json().await?;
        debug!(expires_in = token.expires_in, "Obtained access token");

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        });

        Ok(access_token)
    }
}
