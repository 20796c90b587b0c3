// Installed-app OAuth2 flow on top of yup-oauth2.
//
// First run: the library opens a loopback listener and waits for the browser to
// come back with the authorization code. Tokens are persisted to the cache file
// and refreshed from there on later runs.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::core::auth::{AuthError, AuthProvider};

pub struct InstalledFlowAuth {
    authenticator: DefaultAuthenticator,
    scope: String,
}

impl InstalledFlowAuth {
    /// Loads any cached tokens. Nothing talks to Google until the first token is requested.
    pub async fn new(
        secret: ApplicationSecret,
        scope: impl Into<String>,
        token_cache_path: &Path,
    ) -> Result<Self, AuthError> {
        let authenticator =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .persist_tokens_to_disk(token_cache_path)
                .flow_delegate(Box::new(BrowserDelegate))
                .build()
                .await
                .map_err(|e| AuthError::TokenCache {
                    path: token_cache_path.to_path_buf(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            authenticator,
            scope: scope.into(),
        })
    }
}

#[async_trait]
impl AuthProvider for InstalledFlowAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        let token = self
            .authenticator
            .token(&[self.scope.as_str()])
            .await
            .map_err(|e| AuthError::Flow(e.to_string()))?;

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| AuthError::Flow("no access token in the response".to_string()))
    }
}

/// Shows the consent URL and tries to open it in the default browser.
struct BrowserDelegate;

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            eprintln!("Open this URL in your browser to authorize access:\n\n    {url}\n");
            if let Err(err) = open::that(url) {
                tracing::debug!("Could not launch a browser: {err}");
            }
            if need_code {
                return Err("this flow expects a loopback redirect, not a pasted code".to_string());
            }
            Ok(String::new())
        })
    }
}
