//! Notification composition and FCM HTTP v1 delivery.
//!
//! Turns a resolved recipient and an attendance status into a push
//! message, then submits it to the project-scoped send endpoint with a
//! bearer token. The provider's JSON answer is passed back verbatim.

// Rust guideline compliant 2026-02

use serde::{Deserialize, Serialize};

use crate::constants::{NOTIFICATION_TITLE, PHRASE_ABSENT, PHRASE_LATE};
use crate::model::AttendanceStatus;
use crate::resolver::Recipient;

/// Body phrase for a status: late arrivals are called out, everything
/// else reads as an absence.
pub fn status_phrase(status: &AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Tarde => PHRASE_LATE,
        _ => PHRASE_ABSENT,
    }
}

/// `"<student> <phrase>. Teacher: <teacher>"`.
pub fn notification_body(student_name: &str, status: &AttendanceStatus, teacher_name: &str) -> String {
    format!(
        "{student_name} {}. Teacher: {teacher_name}",
        status_phrase(status)
    )
}

/// Send endpoint for `project_id` under `api_base`.
pub fn send_url(api_base: &str, project_id: &str) -> String {
    format!(
        "{}/v1/projects/{project_id}/messages:send",
        api_base.trim_end_matches('/')
    )
}

/// Visible part of the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
}

/// Web-push options; `link` opens the app when the notification is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcmOptions {
    /// Deep link into the application.
    pub link: String,
}

/// Web-push specific overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebpushConfig {
    /// FCM options for web clients.
    pub fcm_options: FcmOptions,
}

/// One message addressed to a device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// FCM registration token of the guardian's device.
    pub token: String,
    /// Title and body.
    pub notification: Notification,
    /// Web-push deep link.
    pub webpush: WebpushConfig,
}

/// Request body of `messages:send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// The message envelope.
    pub message: Message,
}

impl PushMessage {
    /// Device token this message is addressed to.
    pub fn device_token(&self) -> &str {
        &self.message.token
    }
}

/// Compose the notification for a resolved recipient.
pub fn compose(recipient: &Recipient, status: &AttendanceStatus, link: &str) -> PushMessage {
    PushMessage {
        message: Message {
            token: recipient.device_token.clone(),
            notification: Notification {
                title: NOTIFICATION_TITLE.to_string(),
                body: notification_body(&recipient.student_name, status, &recipient.teacher_name),
            },
            webpush: WebpushConfig {
                fcm_options: FcmOptions {
                    link: link.to_string(),
                },
            },
        },
    }
}

/// What the provider said about one send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    /// HTTP status of the send call.
    pub status: u16,
    /// Provider response body; non-JSON text is kept as a JSON string.
    pub body: serde_json::Value,
}

impl DispatchReport {
    /// Whether the provider accepted the message.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the provider says the device token is no longer registered.
    pub fn is_stale_token(&self) -> bool {
        if self.status == 404 {
            return true;
        }
        let details = self.body["error"]["details"].as_array();
        details.is_some_and(|details| {
            details
                .iter()
                .any(|d| d["errorCode"].as_str() == Some("UNREGISTERED"))
        })
    }

    /// Whether the provider refused the access token itself.
    pub fn is_auth_rejected(&self) -> bool {
        self.status == 401
    }

    /// Whether a later attempt could succeed (rate limit or provider fault).
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

/// The send request never produced a response.
#[derive(Debug, thiserror::Error)]
#[error("push send failed: {0}")]
pub struct DispatchError(pub String);

/// Truncate a device token for logs.
pub fn short_token(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map_or(token.len(), |(idx, _)| idx);
    &token[..end]
}

/// POST `message` to `url` with `access_token`.
///
/// Any HTTP answer, successful or not, is returned as a report; only a
/// missing answer is an error.
pub async fn send(
    client: &reqwest::Client,
    url: &str,
    access_token: &str,
    message: &PushMessage,
) -> Result<DispatchReport, DispatchError> {
    let response = client
        .post(url)
        .bearer_auth(access_token)
        .json(message)
        .send()
        .await
        .map_err(|e| DispatchError(e.to_string()))?;

    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| DispatchError(e.to_string()))?;
    let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));

    let report = DispatchReport { status, body };
    let token = short_token(message.device_token());

    if report.is_success() {
        log::info!("[Dispatch] Notification accepted for {token}...: {}", report.body);
    } else if report.is_stale_token() {
        log::warn!(
            "[Dispatch] Device token {token}... is no longer registered (HTTP {status}): {}",
            report.body
        );
    } else {
        log::error!("[Dispatch] Send failed for {token}... (HTTP {status}): {}", report.body);
    }

    Ok(report)
}
