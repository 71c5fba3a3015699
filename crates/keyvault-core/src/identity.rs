//! Identity resolution
//!
//! Every request re-resolves its bearer credential against the upstream
//! auth service. No caching, no partial trust.

use std::time::Duration;

use async_trait::async_trait;
use keyvault_store::CallerIdentity;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Credential rejected (status {0})")]
    Rejected(u16),

    #[error("Auth service response had no user id")]
    InvalidResponse,

    #[error("Auth service unreachable: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Validates a caller credential and yields a stable identity
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `authorization` is the raw `Authorization` header value, if any
    async fn resolve(&self, authorization: Option<&str>) -> Result<CallerIdentity, AuthError>;
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let header = authorization
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(AuthError::MissingCredential)?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

#[derive(Deserialize)]
struct UserResponse {
    id: Option<String>,
}

/// Resolves tokens against a GoTrue-compatible auth service (`GET /auth/v1/user`)
pub struct GoTrueResolver {
    client: reqwest::Client,
    user_url: String,
    api_key: Option<SecretString>,
}

impl GoTrueResolver {
    pub fn new(
        auth_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            user_url: format!("{}/auth/v1/user", auth_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityResolver for GoTrueResolver {
    async fn resolve(&self, authorization: Option<&str>) -> Result<CallerIdentity, AuthError> {
        let token = bearer_token(authorization)?;

        let mut request = self.client.get(&self.user_url).bearer_auth(token);
        if let Some(api_key) = &self.api_key {
            request = request.header("apikey", api_key.expose_secret());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()));
        }

        let user: UserResponse = resp.json().await.map_err(|_| AuthError::InvalidResponse)?;
        match user.id {
            Some(id) if !id.trim().is_empty() => Ok(CallerIdentity::new(id)),
            _ => Err(AuthError::InvalidResponse),
        }
    }
}
