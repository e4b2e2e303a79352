//! OAuth access tokens for the Sheets API.
//!
//! A service account signs a short-lived JWT assertion and trades it at its token endpoint for
//! an access token. Tokens are cached and replaced shortly before they expire.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::AppError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetsCredentials {
    /// Pre-issued token, used as-is and never refreshed.
    AccessToken(String),
    /// Service-account key JSON given inline.
    ServiceAccountJson(String),
    /// Path to a service-account key file.
    ServiceAccountFile(PathBuf),
}

/// The fields of a Google service-account key file this app needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

pub enum TokenSource {
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl TokenSource {
    pub fn from_credentials(credentials: &SheetsCredentials, client: Client) -> Result<Self, AppError> {
        let json = match credentials {
            SheetsCredentials::AccessToken(token) => return Ok(Self::Static(token.clone())),
            SheetsCredentials::ServiceAccountJson(json) => json.clone(),
            SheetsCredentials::ServiceAccountFile(path) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!(
                    "Failed to read service account file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };
        let key: ServiceAccountKey = serde_json::from_str(&json)
            .map_err(|e| AppError::Config(format!("Invalid service account key: {}", e)))?;
        Ok(Self::ServiceAccount(ServiceAccountAuth::new(key, client)?))
    }

    pub async fn access_token(&self) -> Result<String, AppError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(auth) => auth.access_token().await,
        }
    }
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self, AppError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid service account private key: {}", e)))?;
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

    fn assertion(&self, now: i64) -> Result<String, AppError> {
        let claims = Claims {
            iss: self.key.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to sign token request: {}", e)))
    }

    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(current.token.clone());
        }

        debug!("Requesting Sheets access token for {}", self.key.client_email);
        let assertion = self.assertion(Utc::now().timestamp())?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::StoreUnavailable(format!(
                "Token endpoint rejected {}: {} {}",
                self.key.client_email, status, body
            )));
        }
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::StoreUnavailable(format!("Failed to parse token response: {}", e))
        })?;

        info!(
            "Obtained Sheets access token for {}, valid for {}s",
            self.key.client_email, parsed.expires_in
        );
        let token = parsed.access_token.clone();
        *cached = Some(CachedToken {
            token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        });
        Ok(token)
    }
}
