use axum::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GoogleConfig;
use crate::error::AppError;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity extracted from a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub google_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, AppError>;
}

/// Response of Google's `tokeninfo` endpoint. Booleans arrive as strings.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
}

fn invalid_token() -> AppError {
    AppError::Unauthorized("Invalid Google token".into())
}

impl TokenInfo {
    fn into_identity(self, client_id: &str) -> Result<GoogleIdentity, AppError> {
        if self.aud != client_id {
            warn!(aud = %self.aud, "google token audience mismatch");
            return Err(invalid_token());
        }
        if !GOOGLE_ISSUERS.contains(&self.iss.as_str()) {
            warn!(iss = %self.iss, "google token issuer mismatch");
            return Err(invalid_token());
        }
        if self.email_verified.as_deref() == Some("false") {
            warn!(sub = %self.sub, "google email not verified");
            return Err(AppError::Unauthorized("Google email is not verified".into()));
        }
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Invalid token payload".into()))?;
        Ok(GoogleIdentity {
            google_id: self.sub,
            email,
            first_name: self.given_name.unwrap_or_default(),
            last_name: self.family_name.unwrap_or_default(),
        })
    }
}

/// Verifies ID tokens against Google's public `tokeninfo` endpoint.
#[derive(Clone)]
pub struct HttpGoogleVerifier {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl HttpGoogleVerifier {
    pub fn new(config: GoogleConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GoogleVerifier for HttpGoogleVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, AppError> {
        let Some(client_id) = self.config.client_id.as_deref() else {
            warn!("google sign-in attempted but GOOGLE_CLIENT_ID is not configured");
            return Err(invalid_token());
        };

        let resp = self
            .client
            .get(&self.config.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "google tokeninfo request failed");
                invalid_token()
            })?;

        if !resp.status().is_success() {
            debug!(status = %resp.status(), "google rejected id token");
            return Err(invalid_token());
        }

        let info: TokenInfo = resp.json().await.map_err(|e| {
            warn!(error = %e, "google tokeninfo payload unreadable");
            invalid_token()
        })?;
        info.into_identity(client_id)
    }
}
