//! Trigger payload and data-store record types.
//!
//! The pipeline never writes these back; it only reads what the data store
//! hands it (the inserted attendance row) and what it can look up
//! (students and profiles).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attendance status as recorded by the teacher.
///
/// Serialized as the lowercase wire string. Values outside the known set are
/// preserved in [`AttendanceStatus::Other`] so an unexpected status still
/// produces a notification. A null or missing status is `Other("")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceStatus {
    /// Student was present.
    Presente,
    /// Student arrived late.
    Tarde,
    /// Student was absent.
    Falta,
    /// Any other status string.
    Other(String),
}

impl AttendanceStatus {
    /// Wire representation of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Presente => "presente",
            Self::Tarde => "tarde",
            Self::Falta => "falta",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for AttendanceStatus {
    fn from(s: &str) -> Self {
        match s {
            "presente" => Self::Presente,
            "tarde" => Self::Tarde,
            "falta" => Self::Falta,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Default for AttendanceStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.map_or_else(Self::default, |s| Self::from(s.as_str())))
    }
}

/// One inserted attendance row, as delivered by the insert trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Student the record is about.
    pub student_id: String,
    /// Teacher who took attendance; only used to word the message.
    #[serde(default)]
    pub teacher_id: Option<String>,
    /// Recorded status.
    #[serde(default)]
    pub status: AttendanceStatus,
    /// Insert timestamp, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Request body posted by the data store's database webhook.
///
/// Only `record` is read. The webhook also sends `type`, `table`, `schema`
/// and `old_record`, which are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerPayload {
    /// The inserted row, if the invocation carries one.
    #[serde(default)]
    pub record: Option<AttendanceEvent>,
}

impl TriggerPayload {
    /// Parse a raw request body.
    ///
    /// An empty (or whitespace-only) body is a payload without a record.
    pub fn parse(body: &[u8]) -> serde_json::Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }
}

/// Row of the `students` table, restricted to the selected columns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudentRecord {
    /// Display name used in the notification body.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Guardian profile id; may be unset for unlinked students.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Row of the `profiles` table, restricted to the selected columns.
///
/// The same table backs guardians and teachers; lookups select only what
/// they need, so every column is optional here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileRecord {
    /// Display name (teacher lookups).
    #[serde(default)]
    pub full_name: Option<String>,
    /// FCM registration token (guardian lookups).
    #[serde(default)]
    pub fcm_token: Option<String>,
}
