//! Service-account assertion signing (RS256).
//!
//! Builds the short-lived JWT that authenticates this service to the
//! OAuth2 token endpoint (RFC 7523 JWT-bearer grant). The private key comes
//! from the provider's service-account JSON, which is injected through
//! configuration and never compiled in.

// Rust guideline compliant 2026-02

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

use crate::constants::{ASSERTION_LIFETIME_SECS, DEFAULT_TOKEN_URI, FCM_SCOPE};

/// The signing identity is unusable.
///
/// This is a configuration defect, not a transient fault: the invocation
/// aborts before any network call.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The service-account document could not be read or parsed.
    #[error("invalid service account: {0}")]
    Account(String),
    /// The armored key text did not decode to binary.
    #[error("private key is not valid PEM/base64: {0}")]
    Encoding(String),
    /// The decoded bytes are not an RSA private key.
    #[error("private key is not a PKCS#8 or PKCS#1 RSA key: {0}")]
    Key(String),
    /// Claims could not be serialized.
    #[error("failed to encode assertion: {0}")]
    Encode(String),
}

/// On-disk shape of a service-account JSON file.
#[derive(Deserialize)]
struct ServiceAccountFile {
    project_id: String,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: String,
    client_email: String,
    #[serde(default)]
    token_uri: Option<String>,
}

/// A push provider service account.
///
/// Loaded once per process and never mutated. The private key is held in
/// zeroizing memory and is omitted from `Debug` output.
#[derive(Clone)]
pub struct ServiceAccount {
    project_id: String,
    private_key_id: Option<String>,
    private_key: Zeroizing<String>,
    client_email: String,
    token_uri: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccount {
    /// Parse a service-account JSON document.
    pub fn from_json(json: &str) -> Result<Self, CredentialError> {
        let file: ServiceAccountFile =
            serde_json::from_str(json).map_err(|e| CredentialError::Account(e.to_string()))?;

        Ok(Self {
            project_id: file.project_id,
            private_key_id: file.private_key_id.filter(|id| !id.is_empty()),
            private_key: Zeroizing::new(file.private_key),
            client_email: file.client_email,
            token_uri: file
                .token_uri
                .filter(|uri| !uri.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }

    /// Read and parse a service-account JSON file.
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let json = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            CredentialError::Account(format!("cannot read {}: {e}", path.display()))
        })?);
        Self::from_json(&json)
    }

    /// Build an account from its parts (tests and tooling).
    pub fn new(
        project_id: impl Into<String>,
        client_email: impl Into<String>,
        private_key: impl Into<String>,
        token_uri: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            private_key_id: None,
            private_key: Zeroizing::new(private_key.into()),
            client_email: client_email.into(),
            token_uri: token_uri.into(),
        }
    }

    /// Replace the token endpoint (assertion audience).
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Project the push send endpoint is scoped to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Issuer identity (`iss` claim and cache key).
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// OAuth2 token endpoint and assertion audience.
    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Key id advertised in the JWT header, if the account has one.
    pub fn private_key_id(&self) -> Option<&str> {
        self.private_key_id.as_deref()
    }
}

/// Claim set of the service assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Service-account email.
    pub iss: String,
    /// Requested OAuth2 scope.
    pub scope: String,
    /// Token endpoint.
    pub aud: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, always `iat + 3600`.
    pub exp: i64,
}

impl AssertionClaims {
    /// Claims for `account` issued at `now`.
    pub fn new(account: &ServiceAccount, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: account.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: account.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// A compact, signed JWT ready for one token exchange.
#[derive(Clone)]
pub struct SignedAssertion {
    token: String,
    claims: AssertionClaims,
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

impl SignedAssertion {
    /// Compact serialization (`header.claims.signature`).
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Claims that were signed.
    pub fn claims(&self) -> &AssertionClaims {
        &self.claims
    }
}

/// Decode a text-armored key to raw DER.
///
/// Strips every `-----...-----` envelope marker and all whitespace, then
/// base64-decodes what remains. Literal `\n` escapes (common when the key
/// travels through an environment variable) count as whitespace.
pub fn pem_to_der(pem: &str) -> Result<Zeroizing<Vec<u8>>, CredentialError> {
    let unescaped = Zeroizing::new(pem.replace("\\n", "\n"));
    let mut rest: &str = &unescaped;
    let mut body = Zeroizing::new(String::with_capacity(rest.len()));

    while let Some(start) = rest.find("-----") {
        body.extend(rest[..start].chars().filter(|c| !c.is_whitespace()));
        let after_open = &rest[start + 5..];
        match after_open.find("-----") {
            Some(end) => rest = &after_open[end + 5..],
            None => {
                return Err(CredentialError::Encoding(
                    "unterminated envelope marker".to_string(),
                ))
            }
        }
    }
    body.extend(rest.chars().filter(|c| !c.is_whitespace()));

    if body.is_empty() {
        return Err(CredentialError::Encoding("no key material".to_string()));
    }

    BASE64
        .decode(body.as_bytes())
        .map(Zeroizing::new)
        .map_err(|e| CredentialError::Encoding(e.to_string()))
}

/// Parse DER key bytes, trying PKCS#8 first and PKCS#1 second.
fn parse_private_key(der: &[u8]) -> Result<RsaPrivateKey, CredentialError> {
    match RsaPrivateKey::from_pkcs8_der(der) {
        Ok(key) => Ok(key),
        Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|pkcs1_err| CredentialError::Key(format!("{pkcs8_err}; {pkcs1_err}"))),
    }
}

/// Signing key in the PKCS#1 DER form the JWT encoder takes.
fn encoding_key(der: &[u8]) -> Result<EncodingKey, CredentialError> {
    let key = parse_private_key(der)?;
    let pkcs1 = key
        .to_pkcs1_der()
        .map_err(|e| CredentialError::Key(e.to_string()))?;
    Ok(EncodingKey::from_rsa_der(pkcs1.as_bytes()))
}

/// Sign a service assertion for `account`, issued at `now`.
///
/// RS256 (RSASSA-PKCS1-v1_5 with SHA-256). CPU-bound, no I/O.
pub fn sign_assertion(
    account: &ServiceAccount,
    now: DateTime<Utc>,
) -> Result<SignedAssertion, CredentialError> {
    let der = pem_to_der(&account.private_key)?;
    let key = encoding_key(&der)?;

    let claims = AssertionClaims::new(account, now);
    let mut header = Header::new(Algorithm::RS256);
    header.kid = account.private_key_id.clone();

    let token = jsonwebtoken::encode(&header, &claims, &key)
        .map_err(|e| CredentialError::Encode(e.to_string()))?;

    log::debug!("[Signer] Signed assertion for {} (exp {})", claims.iss, claims.exp);

    Ok(SignedAssertion { token, claims })
}
