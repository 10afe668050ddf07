//! OAuth2 token exchange and access-token caching.
//!
//! A signed assertion is traded for a bearer token with a single
//! JWT-bearer grant POST. Tokens are valid for about an hour, so
//! [`TokenSource`] keeps the last one per issuer and only goes back to the
//! token endpoint when it is close to expiry.

// Rust guideline compliant 2026-02

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use super::signer::{sign_assertion, CredentialError, ServiceAccount, SignedAssertion};
use crate::constants::{
    ACCESS_TOKEN_REFRESH_SKEW_SECS, DEFAULT_ACCESS_TOKEN_LIFETIME_SECS, JWT_BEARER_GRANT,
};

/// The token endpoint did not hand out an access token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request never produced a response.
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    /// The endpoint answered without an `access_token`.
    #[error("token endpoint rejected assertion (HTTP {status}): {body}")]
    Rejected {
        /// HTTP status returned by the endpoint.
        status: u16,
        /// Provider error body, verbatim.
        body: String,
    },
}

/// Failure to obtain a bearer token, keeping the signing/exchange split.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signing step failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// Exchange step failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// A bearer credential for the push API.
#[derive(Clone)]
pub struct AccessToken {
    value: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Wrap a token value with its expiry.
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            expires_at,
        }
    }

    /// Token value for the `Authorization: Bearer` header.
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// When the provider stops accepting this token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still usable at `now`, leaving the refresh skew.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(ACCESS_TOKEN_REFRESH_SKEW_SECS) > now
    }
}

/// Token endpoint response; only the fields we read.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange a signed assertion for an access token.
///
/// One form-encoded POST, no retry. A response without `access_token`
/// (whatever its status) is a rejection carrying the provider body.
pub async fn exchange(
    client: &reqwest::Client,
    token_uri: &str,
    assertion: &SignedAssertion,
) -> Result<AccessToken, AuthError> {
    let response = client
        .post(token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;

    let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();
    match parsed {
        Some(TokenResponse {
            access_token: Some(token),
            expires_in,
        }) if !token.is_empty() => {
            Ok(AccessToken::new(token, expiry_after(Utc::now(), expires_in)))
        }
        _ => Err(AuthError::Rejected { status, body }),
    }
}

/// Expiry for a token issued at `now` with the provider's `expires_in`.
///
/// Missing, non-positive, or out-of-range lifetimes fall back to the
/// default lifetime.
fn expiry_after(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let provided = expires_in
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime));

    provided
        .or_else(|| {
            if expires_in.is_some() {
                log::warn!("[Token] Ignoring unusable expires_in={expires_in:?}");
            }
            Duration::try_seconds(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
        })
        // Only reachable at the end of time; the token is then refreshed on next use.
        .unwrap_or(now)
}

/// Expiry-aware access-token cache keyed by issuer identity.
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: HashMap<String, AccessToken>,
}

impl TokenCache {
    /// A fresh token for `issuer`, if one is cached.
    pub fn get(&self, issuer: &str, now: DateTime<Utc>) -> Option<AccessToken> {
        self.tokens
            .get(issuer)
            .filter(|token| token.is_fresh(now))
            .cloned()
    }

    /// Store the latest token for `issuer`.
    pub fn insert(&mut self, issuer: String, token: AccessToken) {
        self.tokens.insert(issuer, token);
    }

    /// Forget the token for `issuer` (e.g. after the provider refused it).
    pub fn invalidate(&mut self, issuer: &str) {
        self.tokens.remove(issuer);
    }

    /// Number of cached issuers.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Produces bearer tokens: cache hit, or sign → exchange → cache.
///
/// Shared by every concurrent invocation. The cache lock is held across a
/// refresh so that simultaneous misses do not each hit the token endpoint.
#[derive(Debug)]
pub struct TokenSource {
    client: reqwest::Client,
    cache: Option<Mutex<TokenCache>>,
}

impl TokenSource {
    /// Create a source; with `cache_tokens = false` every call re-derives.
    pub fn new(client: reqwest::Client, cache_tokens: bool) -> Self {
        Self {
            client,
            cache: cache_tokens.then(|| Mutex::new(TokenCache::default())),
        }
    }

    /// Obtain a bearer token for `account`.
    pub async fn access_token(&self, account: &ServiceAccount) -> Result<AccessToken, TokenError> {
        let Some(cache) = &self.cache else {
            return self.fetch(account).await;
        };

        let mut cache = cache.lock().await;
        if let Some(token) = cache.get(account.client_email(), Utc::now()) {
            log::debug!("[Token] Reusing cached access token for {}", account.client_email());
            return Ok(token);
        }

        let token = self.fetch(account).await?;
        cache.insert(account.client_email().to_string(), token.clone());
        Ok(token)
    }

    /// Drop any cached token for `account`.
    pub async fn invalidate(&self, account: &ServiceAccount) {
        if let Some(cache) = &self.cache {
            cache.lock().await.invalidate(account.client_email());
        }
    }

    async fn fetch(&self, account: &ServiceAccount) -> Result<AccessToken, TokenError> {
        let assertion = sign_assertion(account, Utc::now())?;
        let token = exchange(&self.client, account.token_uri(), &assertion).await?;
        log::info!(
            "[Token] Obtained access token for {} (expires {})",
            account.client_email(),
            token.expires_at().format("%H:%M:%S")
        );
        Ok(token)
    }
}
