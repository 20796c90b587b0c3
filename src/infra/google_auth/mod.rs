// =============================================================================
// GOOGLE AUTH MODULE
// =============================================================================
//
// Implements the core `AuthProvider` for Google APIs.
//
// **Supported secrets files:**
// 1. **OAuth client** (`{"installed": {...}}` or `{"web": {...}}`): interactive
//    consent on first use, tokens cached on disk and refreshed by yup-oauth2.
// 2. **Service account key** (`"type": "service_account"`): no user interaction,
//    the spreadsheet must be shared with the service account email.

pub mod installed_flow;
pub mod service_account;

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::core::auth::{AuthError, AuthProvider};
use installed_flow::InstalledFlowAuth;
use service_account::{ServiceAccountAuth, ServiceAccountKey};

/// Read/write access to spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

pub enum GoogleAuth {
    Installed(InstalledFlowAuth),
    ServiceAccount(ServiceAccountAuth),
}

impl GoogleAuth {
    /// Picks the flow matching the secrets file.
    pub async fn from_secrets_file(
        secrets_path: &Path,
        token_cache_path: &Path,
        scope: &str,
        client: Client,
    ) -> Result<Self, AuthError> {
        let secrets_error = |reason: String| AuthError::Secrets {
            path: secrets_path.to_path_buf(),
            reason,
        };

        let json = tokio::fs::read_to_string(secrets_path)
            .await
            .map_err(|e| secrets_error(e.to_string()))?;
        let value: Value = serde_json::from_str(&json).map_err(|e| secrets_error(e.to_string()))?;

        if value.get("type").and_then(Value::as_str) == Some("service_account") {
            let key: ServiceAccountKey =
                serde_json::from_value(value).map_err(|e| secrets_error(e.to_string()))?;
            tracing::debug!(account = %key.client_email, "Using service account");
            return Ok(GoogleAuth::ServiceAccount(ServiceAccountAuth::new(
                key, scope, client,
            )));
        }

        let secret = yup_oauth2::parse_application_secret(&json)
            .map_err(|e| secrets_error(e.to_string()))?;
        tracing::debug!(client_id = %secret.client_id, "Using installed-app OAuth flow");
        let auth = InstalledFlowAuth::new(secret, scope, token_cache_path).await?;
        Ok(GoogleAuth::Installed(auth))
    }
}

#[async_trait]
impl AuthProvider for GoogleAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        match self {
            GoogleAuth::Installed(auth) => auth.access_token().await,
            GoogleAuth::ServiceAccount(auth) => auth.access_token().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load(secrets: &Path, token_cache: &Path) -> Result<GoogleAuth, AuthError> {
        GoogleAuth::from_secrets_file(secrets, token_cache, SPREADSHEETS_SCOPE, Client::new()).await
    }

    #[tokio::test]
    async fn missing_secrets_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("nope.json");

        let err = load(&secrets, &dir.path().join("token.json"))
            .await
            .err()
            .unwrap();

        match err {
            AuthError::Secrets { path, .. } => assert_eq!(path, secrets),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn picks_flow_from_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let installed = dir.path().join("client.json");
        std::fs::write(
            &installed,
            r#"{"installed": {"client_id": "id", "client_secret": "secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]}}"#,
        )
        .unwrap();
        let service = dir.path().join("service.json");
        std::fs::write(
            &service,
            r#"{"type": "service_account", "client_email": "a@b.iam.gserviceaccount.com",
                "private_key": "pem", "token_uri": "https://oauth2.googleapis.com/token"}"#,
        )
        .unwrap();
        let token_cache = dir.path().join("token.json");

        let auth = load(&installed, &token_cache).await.unwrap();
        assert!(matches!(auth, GoogleAuth::Installed(_)));

        let auth = load(&service, &token_cache).await.unwrap();
        assert!(matches!(auth, GoogleAuth::ServiceAccount(_)));
    }

    #[tokio::test]
    async fn absent_token_cache_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("client.json");
        std::fs::write(
            &secrets,
            r#"{"web": {"client_id": "id", "client_secret": "secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]}}"#,
        )
        .unwrap();
        let token_cache = dir.path().join("never-written.json");

        let auth = load(&secrets, &token_cache).await.unwrap();

        assert!(matches!(auth, GoogleAuth::Installed(_)));
    }

    #[tokio::test]
    async fn unknown_secrets_layout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = dir.path().join("other.json");
        std::fs::write(&secrets, r#"{"other": {}}"#).unwrap();

        let err = load(&secrets, &dir.path().join("token.json"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AuthError::Secrets { .. }));
    }
}
