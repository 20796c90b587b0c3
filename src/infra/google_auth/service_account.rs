// Service account authentication.
//
// When the secrets file is a service account key instead of an OAuth client, there
// is no consent screen and no token cache: we sign a JWT assertion with the key and
// exchange it for a short-lived access token. The spreadsheet has to be shared with
// the service account email for the upload to work.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::auth::{AuthError, AuthProvider};

/// Service account key file contents (only the fields we use).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Used as the JWT issuer.
    pub client_email: String,
    /// PEM-encoded RSA key.
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scope: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, scope: impl Into<String>, client: Client) -> Self {
        Self {
            key,
            scope: scope.into(),
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    async fn fetch_new_token(&self) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Signing(e.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let jwt = encode(&header, &claims, &key).map_err(|e| AuthError::Signing(e.to_string()))?;

        tracing::debug!(account = %self.key.client_email, "Requesting service account token");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint { status, body });
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(token_response.access_token)
    }
}

#[async_trait]
impl AuthProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let new_token = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: new_token.clone(),
                expires_at: SystemTime::now() + Duration::from_secs(55 * 60),
            });
        }

        Ok(new_token)
    }
}
