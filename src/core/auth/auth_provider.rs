// The core only needs "a bearer token for the spreadsheet scope". How that token is
// obtained (browser consent, cached refresh tokens, service account keys) lives in infra.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Cannot use client secrets at {}: {reason}", path.display())]
    Secrets { path: PathBuf, reason: String },
    #[error("Token cache at {} is unusable: {reason}", path.display())]
    TokenCache { path: PathBuf, reason: String },
    #[error("Authorization flow failed: {0}")]
    Flow(String),
    #[error("Token endpoint rejected the request ({status}): {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("Token request failed: {0}")]
    Transport(String),
    #[error("Failed to sign service account assertion: {0}")]
    Signing(String),
}

/// Produces access tokens for outgoing API requests.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}
