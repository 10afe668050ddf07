//! Push notification infrastructure.
//!
//! Authenticates to the push provider as a service account and delivers
//! attendance alerts to a guardian's device through the FCM HTTP v1 API.
//!
//! # Architecture
//!
//! ```text
//! Service account (RSA key, issuer)
//!     ↓  signer: RS256 assertion, exp = iat + 3600
//! OAuth2 token endpoint (JWT-bearer grant)
//!     ↓  token: bearer access token, cached per issuer
//! FCM messages:send
//!     ↓  dispatch: provider JSON passed back verbatim
//! Guardian's device
//! ```
//!
//! Failed deliveries that may succeed later are parked in the [`outbox`]
//! and re-driven in the background, never inside an invocation.

// Rust guideline compliant 2026-02

pub mod dispatch;
pub mod outbox;
pub mod signer;
pub mod token;

pub use dispatch::{compose, DispatchReport, PushMessage};
pub use outbox::{MemoryOutbox, Outbox, PendingNotification, Redriver};
pub use signer::{sign_assertion, CredentialError, ServiceAccount, SignedAssertion};
pub use token::{AccessToken, AuthError, TokenError, TokenSource};
