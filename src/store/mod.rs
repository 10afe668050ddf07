//! Read access to the hosted data store.
//!
//! The pipeline needs three point lookups by primary key: a student, the
//! guardian's profile, and the teacher's profile. [`RecipientStore`] is the
//! seam; [`PostgrestStore`] is the production implementation over the data
//! store's REST interface.
//!
//! # Modules
//!
//! - [`postgrest`] - HTTP client for the data store's REST API

// Rust guideline compliant 2026-02

pub mod postgrest;

use async_trait::async_trait;

use crate::model::{ProfileRecord, StudentRecord};

pub use postgrest::PostgrestStore;

/// A lookup could not be answered.
///
/// Distinct from "no such row", which is `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Request failed before a response arrived.
    #[error("data store unreachable: {0}")]
    Transport(String),
    /// Data store answered with a non-success status.
    #[error("data store returned HTTP {status}: {body}")]
    Status {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Response body did not match the expected rows.
    #[error("unexpected data store response: {0}")]
    Decode(String),
    /// A primary-key lookup matched several rows.
    #[error("{table} lookup for {id} matched {count} rows")]
    Ambiguous {
        /// Table queried.
        table: &'static str,
        /// Id looked up.
        id: String,
        /// Rows returned.
        count: usize,
    },
}

/// Point lookups the recipient resolver depends on.
///
/// Each returns zero or one row. Implementations must not write.
#[async_trait]
pub trait RecipientStore: Send + Sync + std::fmt::Debug {
    /// Student by id (`full_name`, `parent_id`).
    async fn student(&self, id: &str) -> Result<Option<StudentRecord>, StoreError>;

    /// Profile by id, selecting the guardian's device token.
    async fn guardian(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError>;

    /// Profile by id, selecting the teacher's display name.
    async fn teacher(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store for unit tests.

    use super::{async_trait, ProfileRecord, RecipientStore, StoreError, StudentRecord};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub(crate) struct MemoryStore {
        pub students: HashMap<String, StudentRecord>,
        pub profiles: HashMap<String, ProfileRecord>,
        pub fail_teacher_lookup: bool,
        pub fail_student_lookup: bool,
        pub lookups: AtomicUsize,
    }

    impl MemoryStore {
        pub(crate) fn with_student(mut self, id: &str, name: &str, parent: Option<&str>) -> Self {
            self.students.insert(
                id.to_string(),
                StudentRecord {
                    full_name: Some(name.to_string()),
                    parent_id: parent.map(String::from),
                },
            );
            self
        }

        pub(crate) fn with_unnamed_student(mut self, id: &str, parent: &str) -> Self {
            self.students.insert(
                id.to_string(),
                StudentRecord {
                    full_name: None,
                    parent_id: Some(parent.to_string()),
                },
            );
            self
        }

        pub(crate) fn with_profile(mut self, id: &str, name: Option<&str>, token: Option<&str>) -> Self {
            self.profiles.insert(
                id.to_string(),
                ProfileRecord {
                    full_name: name.map(String::from),
                    fcm_token: token.map(String::from),
                },
            );
            self
        }

        pub(crate) fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecipientStore for MemoryStore {
        async fn student(&self, id: &str) -> Result<Option<StudentRecord>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail_student_lookup {
                return Err(StoreError::Transport("connection refused".to_string()));
            }
            Ok(self.students.get(id).cloned())
        }

        async fn guardian(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.profiles.get(id).cloned())
        }

        async fn teacher(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail_teacher_lookup {
                return Err(StoreError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(self.profiles.get(id).cloned())
        }
    }
}
