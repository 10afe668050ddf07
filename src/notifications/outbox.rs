//! Parking and re-driving notifications that could not be delivered.
//!
//! An invocation never retries inline. When the token exchange or the send
//! fails in a way that might succeed later, the composed message is parked
//! in an [`Outbox`]; a background [`Redriver`] retries parked messages with
//! a jittered interval, outside any invocation.

// Rust guideline compliant 2026-02

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::dispatch::{send, short_token, PushMessage};
use super::signer::ServiceAccount;
use super::token::TokenSource;
use crate::constants::{MAX_REDRIVE_ATTEMPTS, OUTBOX_CAPACITY, REDRIVE_INTERVAL, REDRIVE_JITTER_MAX};

/// A composed notification waiting for another delivery attempt.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    /// Stable id for log correlation.
    pub id: Uuid,
    /// The exact message to resend.
    pub message: PushMessage,
    /// Delivery attempts made so far.
    pub attempts: u32,
    /// Why the last attempt failed.
    pub last_error: String,
    /// When the notification was first parked.
    pub created_at: DateTime<Utc>,
}

impl PendingNotification {
    /// Park a message after its first failed attempt.
    pub fn new(message: PushMessage, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            attempts: 1,
            last_error: error.into(),
            created_at: Utc::now(),
        }
    }
}

/// Queue of notifications awaiting re-delivery.
#[async_trait]
pub trait Outbox: Send + Sync + std::fmt::Debug {
    /// Park a notification.
    async fn push(&self, pending: PendingNotification);

    /// Take every parked notification.
    async fn drain(&self) -> Vec<PendingNotification>;

    /// Number of parked notifications.
    async fn len(&self) -> usize;

    /// Whether nothing is parked.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local bounded outbox. Oldest entries are dropped when full.
#[derive(Debug)]
pub struct MemoryOutbox {
    queue: Mutex<VecDeque<PendingNotification>>,
    capacity: usize,
}

impl Default for MemoryOutbox {
    fn default() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }
}

impl MemoryOutbox {
    /// Outbox holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    async fn push(&self, pending: PendingNotification) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                log::warn!(
                    "[Outbox] Full ({} entries), dropping oldest notification {}",
                    self.capacity,
                    dropped.id
                );
            }
        }
        log::info!(
            "[Outbox] Parked notification {} for {}... (attempt {}): {}",
            pending.id,
            short_token(pending.message.device_token()),
            pending.attempts,
            pending.last_error
        );
        queue.push_back(pending);
    }

    async fn drain(&self) -> Vec<PendingNotification> {
        self.queue.lock().await.drain(..).collect()
    }

    async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

/// Summary of one re-drive pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedriveStats {
    /// Delivered this pass.
    pub delivered: usize,
    /// Parked again for a later pass.
    pub requeued: usize,
    /// Dropped after exhausting attempts or a permanent rejection.
    pub dropped: usize,
}

/// Background re-driver for an [`Outbox`].
#[derive(Debug)]
pub struct Redriver {
    outbox: Arc<dyn Outbox>,
    tokens: Arc<TokenSource>,
    account: Arc<ServiceAccount>,
    client: reqwest::Client,
    send_url: String,
}

impl Redriver {
    /// Create a re-driver sending to `send_url` as `account`.
    pub fn new(
        outbox: Arc<dyn Outbox>,
        tokens: Arc<TokenSource>,
        account: Arc<ServiceAccount>,
        client: reqwest::Client,
        send_url: String,
    ) -> Self {
        Self {
            outbox,
            tokens,
            account,
            client,
            send_url,
        }
    }

    /// Retry every parked notification once.
    pub async fn run_once(&self) -> RedriveStats {
        let pending = self.outbox.drain().await;
        let mut stats = RedriveStats::default();
        if pending.is_empty() {
            return stats;
        }

        log::info!("[Outbox] Re-driving {} notification(s)", pending.len());

        let token = match self.tokens.access_token(&self.account).await {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("[Outbox] No access token for re-drive: {e}");
                None
            }
        };

        for mut item in pending {
            let error = match &token {
                None => "no access token".to_string(),
                Some(token) => {
                    match send(&self.client, &self.send_url, token.secret(), &item.message).await {
                        Ok(report) if report.is_success() => {
                            log::info!("[Outbox] Delivered notification {}", item.id);
                            stats.delivered += 1;
                            continue;
                        }
                        Ok(report) if report.is_auth_rejected() => {
                            // Next pass signs and exchanges a fresh token.
                            self.tokens.invalidate(&self.account).await;
                            format!("HTTP {}: {}", report.status, report.body)
                        }
                        Ok(report) if !report.is_retryable() => {
                            log::warn!(
                                "[Outbox] Dropping notification {}: provider rejected it (HTTP {})",
                                item.id,
                                report.status
                            );
                            stats.dropped += 1;
                            continue;
                        }
                        Ok(report) => format!("HTTP {}: {}", report.status, report.body),
                        Err(e) => e.to_string(),
                    }
                }
            };

            item.attempts += 1;
            item.last_error = error;
            if item.attempts >= MAX_REDRIVE_ATTEMPTS {
                log::error!(
                    "[Outbox] Giving up on notification {} after {} attempts: {}",
                    item.id,
                    item.attempts,
                    item.last_error
                );
                stats.dropped += 1;
            } else {
                self.outbox.push(item).await;
                stats.requeued += 1;
            }
        }

        stats
    }

    /// Re-drive until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let delay = REDRIVE_INTERVAL + jitter(REDRIVE_JITTER_MAX);
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    let stats = self.run_once().await;
                    if stats != RedriveStats::default() {
                        log::info!("[Outbox] Re-drive pass: {stats:?}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("[Outbox] Re-driver stopped");
    }
}

/// Uniform random delay in `[0, max]`.
fn jitter(max: Duration) -> Duration {
    let millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(0..=millis))
}
