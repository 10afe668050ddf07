//! HTTP client for the data store's REST API.
//!
//! This module provides [`PostgrestStore`], which answers the resolver's
//! point lookups with `GET {url}/rest/v1/{table}?select=...&id=eq.{id}`,
//! authenticated with the service-role key.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use zeroize::Zeroizing;

use super::{RecipientStore, StoreError};
use crate::model::{ProfileRecord, StudentRecord};

/// REST client for the hosted data store.
///
/// Encapsulates HTTP client configuration and the service credential. The
/// credential bypasses row-level security, so it is never logged.
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    service_key: Zeroizing<String>,
}

impl fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PostgrestStore {
    /// Creates a store client with a pre-configured HTTP client.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `base_url` - Project URL of the data store
    /// * `service_key` - Service-role key
    pub fn new(client: reqwest::Client, base_url: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: Zeroizing::new(service_key.to_string()),
        }
    }

    /// Returns the data store URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch at most one row of `table` by primary key.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        table: &'static str,
        columns: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let url = format!("{}/rest/v1/{table}", self.base_url);
        let id_filter = format!("eq.{id}");

        log::debug!("[Store] GET {table} id={id}");

        let response = self
            .client
            .get(&url)
            .query(&[("select", columns), ("id", id_filter.as_str())])
            .header("apikey", self.service_key.as_str())
            .bearer_auth(self.service_key.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut rows: Vec<T> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(StoreError::Ambiguous {
                table,
                id: id.to_string(),
                count,
            }),
        }
    }
}

#[async_trait]
impl RecipientStore for PostgrestStore {
    async fn student(&self, id: &str) -> Result<Option<StudentRecord>, StoreError> {
        self.fetch_one("students", "full_name,parent_id", id).await
    }

    async fn guardian(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        self.fetch_one("profiles", "fcm_token", id).await
    }

    async fn teacher(&self, id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        self.fetch_one("profiles", "full_name", id).await
    }
}
