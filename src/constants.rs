//! Application-wide constants for attendance-notify.
//!
//! This module centralizes magic numbers, provider endpoints, and the fixed
//! strings that end up in a notification. Constants are grouped by domain.
//!
//! # Categories
//!
//! - **Timeouts**: Network timeouts and token validity windows
//! - **Provider**: OAuth2 / FCM endpoints and scopes
//! - **Message**: Notification title, phrases, and fallbacks
//! - **Outbox**: Re-drive limits and cadence

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// HTTP client request timeout for outbound calls.
///
/// Applies to data-store lookups, the token exchange, and the push send.
/// A hung provider call fails the invocation instead of holding its task
/// open indefinitely.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifetime of a signed service assertion, in seconds.
///
/// `exp` is always exactly `iat + ASSERTION_LIFETIME_SECS`.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Lifetime assumed for an access token whose response omits `expires_in`.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Remaining validity below which a cached access token is refreshed.
pub const ACCESS_TOKEN_REFRESH_SKEW_SECS: i64 = 60;

// ============================================================================
// Provider
// ============================================================================

/// Default OAuth2 token endpoint (also the assertion audience).
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 scope required to send FCM messages.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// JWT-bearer grant type for the token exchange.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Default base URL of the FCM HTTP v1 API.
pub const DEFAULT_FCM_API_BASE: &str = "https://fcm.googleapis.com";

// ============================================================================
// Message
// ============================================================================

/// Notification title shown to the guardian.
pub const NOTIFICATION_TITLE: &str = "🔔 Attendance Alert";

/// Body phrase for a late arrival.
pub const PHRASE_LATE: &str = "arrived late to class";

/// Body phrase for every other status.
pub const PHRASE_ABSENT: &str = "was absent from class";

/// Teacher label used when the teacher profile cannot be read.
pub const TEACHER_PLACEHOLDER: &str = "A teacher";

/// Student label used when the student row has no name.
pub const STUDENT_PLACEHOLDER: &str = "Your student";

/// Deep link used when no application base URL is configured.
pub const FALLBACK_APP_URL: &str = "https://red-estudiantil-pwa.vercel.app";

// ============================================================================
// Outbox
// ============================================================================

/// Maximum number of parked notifications held in memory.
pub const OUTBOX_CAPACITY: usize = 1024;

/// Attempts after which a parked notification is dropped.
pub const MAX_REDRIVE_ATTEMPTS: u32 = 5;

/// Base interval between re-drive passes.
pub const REDRIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound of the random jitter added to each re-drive interval.
pub const REDRIVE_JITTER_MAX: Duration = Duration::from_secs(10);

// ============================================================================
// Server
// ============================================================================

/// Default listen address for the trigger endpoint.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Path of the trigger endpoint.
pub const TRIGGER_PATH: &str = "/push-notification";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_lifetime_is_one_hour() {
        assert_eq!(ASSERTION_LIFETIME_SECS, 3600);
    }

    #[test]
    fn test_refresh_skew_smaller_than_token_lifetime() {
        assert!(ACCESS_TOKEN_REFRESH_SKEW_SECS < DEFAULT_ACCESS_TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn test_jitter_does_not_exceed_interval() {
        assert!(REDRIVE_JITTER_MAX <= REDRIVE_INTERVAL);
    }
}
