//! Attendance notify - push alerts for attendance events.
//!
//! This crate provides the server-side pipeline that runs after a teacher
//! records attendance: it finds the student's guardian, authenticates to
//! the push provider as a service account, and delivers a notification to
//! the guardian's device.
//!
//! # Architecture
//!
//! The crate follows a resolve → sign → exchange → dispatch pipeline:
//!
//! - **Resolver** - Student → guardian → device token lookups
//! - **Signer** - RS256 service assertion from the service-account key
//! - **Token** - OAuth2 JWT-bearer exchange, cached per issuer
//! - **Dispatch** - Message composition and FCM HTTP v1 send
//! - **Pipeline** - Orchestration into a typed [`Outcome`]
//! - **HTTP** - Trigger endpoint called by the data store's webhook
//!
//! # Modules
//!
//! - [`model`] - Trigger payload and record types
//! - [`store`] - Data store lookups
//! - [`resolver`] - Recipient resolution
//! - [`notifications`] - Signing, token exchange, dispatch, outbox
//! - [`pipeline`] - Orchestration
//! - [`http`] - Axum router
//! - [`config`] - Configuration loading

// Library modules
pub mod config;
pub mod constants;
pub mod http;
pub mod model;
pub mod notifications;
pub mod pipeline;
pub mod resolver;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use model::{AttendanceEvent, AttendanceStatus, TriggerPayload};
pub use pipeline::{Outcome, Pipeline};
pub use resolver::{Recipient, Resolution};
