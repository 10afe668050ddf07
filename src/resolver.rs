//! Recipient resolution: student → guardian → device token.
//!
//! Lookups run strictly in order and stop at the first hard failure. The
//! teacher lookup is best-effort and only affects the message text.

use std::fmt;

use crate::constants::{STUDENT_PLACEHOLDER, TEACHER_PLACEHOLDER};
use crate::model::AttendanceEvent;
use crate::notifications::dispatch::short_token;
use crate::store::{RecipientStore, StoreError};

/// Everything needed to address and word one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Student display name.
    pub student_name: String,
    /// Guardian's FCM registration token (never empty).
    pub device_token: String,
    /// Teacher display name or the generic placeholder.
    pub teacher_name: String,
}

/// Successful resolution states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A device token was found; the notification can be sent.
    Ready(Recipient),
    /// The guardian never enabled notifications. Not an error.
    NoDeviceToken,
}

/// Which lookup came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The `students` row.
    Student,
    /// The guardian's `profiles` row.
    Guardian,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Student => "student",
            Self::Guardian => "guardian",
        })
    }
}

/// Resolution failed before a recipient could be determined.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A referenced row does not exist.
    #[error("{which} not found: {id}")]
    NotFound {
        /// Failing lookup.
        which: Lookup,
        /// Id that was looked up.
        id: String,
    },
    /// The data store could not answer.
    #[error("{which} lookup failed: {source}")]
    Store {
        /// Failing lookup.
        which: Lookup,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

/// Resolve the recipient of an attendance event. Pure read.
pub async fn resolve(
    store: &dyn RecipientStore,
    event: &AttendanceEvent,
) -> Result<Resolution, ResolveError> {
    let student = store
        .student(&event.student_id)
        .await
        .map_err(|source| ResolveError::Store {
            which: Lookup::Student,
            source,
        })?
        .ok_or_else(|| ResolveError::NotFound {
            which: Lookup::Student,
            id: event.student_id.clone(),
        })?;

    let Some(parent_id) = student.parent_id.filter(|id| !id.is_empty()) else {
        return Err(ResolveError::NotFound {
            which: Lookup::Guardian,
            id: format!("<none for student {}>", event.student_id),
        });
    };

    let guardian = store
        .guardian(&parent_id)
        .await
        .map_err(|source| ResolveError::Store {
            which: Lookup::Guardian,
            source,
        })?
        .ok_or_else(|| ResolveError::NotFound {
            which: Lookup::Guardian,
            id: parent_id.clone(),
        })?;

    let Some(device_token) = guardian
        .fcm_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
    else {
        log::info!("[Resolver] Guardian {parent_id} has no device token configured");
        return Ok(Resolution::NoDeviceToken);
    };

    let teacher_name = lookup_teacher_name(store, event.teacher_id.as_deref())
        .await
        .unwrap_or_else(|| TEACHER_PLACEHOLDER.to_string());

    log::debug!(
        "[Resolver] Student {} → guardian {parent_id} → token {}...",
        event.student_id,
        short_token(&device_token)
    );

    Ok(Resolution::Ready(Recipient {
        student_name: non_blank(student.full_name)
            .unwrap_or_else(|| STUDENT_PLACEHOLDER.to_string()),
        device_token,
        teacher_name,
    }))
}

/// Best-effort teacher display name. Never fails the resolution.
async fn lookup_teacher_name(
    store: &dyn RecipientStore,
    teacher_id: Option<&str>,
) -> Option<String> {
    let Some(teacher_id) = teacher_id.filter(|id| !id.is_empty()) else {
        log::warn!("[Resolver] Attendance record has no teacher id");
        return None;
    };

    match store.teacher(teacher_id).await {
        Ok(Some(profile)) => non_blank(profile.full_name),
        Ok(None) => {
            log::warn!("[Resolver] Teacher {teacher_id} not found");
            None
        }
        Err(e) => {
            log::warn!("[Resolver] Could not read teacher {teacher_id}: {e}");
            None
        }
    }
}

fn non_blank(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.trim().is_empty())
}
