//! Configuration loading.
//!
//! Settings come from an optional JSON file, then environment variables
//! override them. Secrets (the data-store service key and the inline
//! service-account JSON) are environment-only and never serialized.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BIND_ADDR, DEFAULT_FCM_API_BASE, FALLBACK_APP_URL};
use crate::notifications::ServiceAccount;

/// Environment variable naming the optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "ATTENDANCE_NOTIFY_CONFIG";

/// Process-wide configuration, read once at startup and never mutated.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Project URL of the hosted data store.
    pub supabase_url: String,
    /// Service-role key - NOT serialized to disk (env only).
    #[serde(skip)]
    pub service_role_key: String,
    /// Application base URL used as the notification deep link.
    pub app_url: Option<String>,
    /// Path to the push provider's service-account JSON file.
    pub service_account_file: Option<PathBuf>,
    /// Inline service-account JSON - NOT serialized (env only).
    #[serde(skip)]
    pub service_account_json: Option<String>,
    /// Base URL of the FCM HTTP v1 API.
    pub fcm_api_base: String,
    /// Listen address of the trigger endpoint.
    pub bind_addr: String,
    /// Reuse access tokens until shortly before they expire.
    pub cache_access_tokens: bool,
    /// Park retryable delivery failures and re-drive them in the background.
    pub enable_outbox: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            service_role_key: String::new(),
            app_url: None,
            service_account_file: None,
            service_account_json: None,
            fcm_api_base: DEFAULT_FCM_API_BASE.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cache_access_tokens: true,
            enable_outbox: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("supabase_url", &self.supabase_url)
            .field("service_role_key", &redacted(&self.service_role_key))
            .field("app_url", &self.app_url)
            .field("service_account_file", &self.service_account_file)
            .field(
                "service_account_json",
                &self.service_account_json.as_deref().map(redacted),
            )
            .field("fcm_api_base", &self.fcm_api_base)
            .field("bind_addr", &self.bind_addr)
            .field("cache_access_tokens", &self.cache_access_tokens)
            .field("enable_outbox", &self.enable_outbox)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Loads configuration from file (if any), with environment overrides.
    ///
    /// File selection: `path`, else `ATTENDANCE_NOTIFY_CONFIG`, else none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key/value source (the process environment
    /// in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("MY_SUPABASE_URL") {
            self.supabase_url = url;
        }

        if let Some(key) = lookup("MY_SERVICE_ROLE_KEY") {
            self.service_role_key = key;
        }

        if let Some(url) = lookup("APP_URL") {
            self.app_url = Some(url);
        }

        if let Some(path) = lookup("FCM_SERVICE_ACCOUNT_FILE") {
            self.service_account_file = Some(PathBuf::from(path));
        }

        if let Some(json) = lookup("FCM_SERVICE_ACCOUNT_JSON") {
            self.service_account_json = Some(json);
        }

        if let Some(base) = lookup("FCM_API_BASE") {
            self.fcm_api_base = base;
        }

        if let Some(bind) = lookup("ATTENDANCE_NOTIFY_BIND") {
            self.bind_addr = bind;
        }

        if let Some(value) = lookup("ATTENDANCE_NOTIFY_CACHE_TOKENS") {
            match parse_bool(&value) {
                Some(flag) => self.cache_access_tokens = flag,
                None => log::warn!("Ignoring ATTENDANCE_NOTIFY_CACHE_TOKENS={value:?}"),
            }
        }

        if let Some(value) = lookup("ATTENDANCE_NOTIFY_OUTBOX") {
            match parse_bool(&value) {
                Some(flag) => self.enable_outbox = flag,
                None => log::warn!("Ignoring ATTENDANCE_NOTIFY_OUTBOX={value:?}"),
            }
        }
    }

    /// Deep link for notifications, falling back to the public app URL.
    pub fn deep_link(&self) -> &str {
        self.app_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(FALLBACK_APP_URL)
    }

    /// Check that everything needed to serve is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.supabase_url.trim().is_empty() {
            missing.push("MY_SUPABASE_URL");
        }
        if self.service_role_key.trim().is_empty() {
            missing.push("MY_SERVICE_ROLE_KEY");
        }
        if self.service_account_json.is_none() && self.service_account_file.is_none() {
            missing.push("FCM_SERVICE_ACCOUNT_FILE or FCM_SERVICE_ACCOUNT_JSON");
        }
        if !missing.is_empty() {
            anyhow::bail!("Missing configuration: {}", missing.join(", "));
        }
        Ok(())
    }

    /// Load the push provider service account.
    ///
    /// Inline JSON wins over the file path.
    pub fn service_account(&self) -> Result<ServiceAccount> {
        if let Some(json) = &self.service_account_json {
            return ServiceAccount::from_json(json)
                .context("FCM_SERVICE_ACCOUNT_JSON is not a valid service account");
        }
        let path = self
            .service_account_file
            .as_deref()
            .context("No service account configured")?;
        ServiceAccount::from_file(path)
            .with_context(|| format!("Failed to load service account from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fcm_api_base, "https://fcm.googleapis.com");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.cache_access_tokens);
        assert!(!config.enable_outbox);
        assert_eq!(config.deep_link(), FALLBACK_APP_URL);
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            ("MY_SUPABASE_URL", "https://db.example.com"),
            ("MY_SERVICE_ROLE_KEY", "svc"),
            ("APP_URL", "https://app.example.com"),
            ("FCM_SERVICE_ACCOUNT_FILE", "/run/secrets/sa.json"),
            ("ATTENDANCE_NOTIFY_CACHE_TOKENS", "false"),
            ("ATTENDANCE_NOTIFY_OUTBOX", "on"),
            ("ATTENDANCE_NOTIFY_BIND", "127.0.0.1:9000"),
        ]));
        assert_eq!(config.supabase_url, "https://db.example.com");
        assert_eq!(config.service_role_key, "svc");
        assert_eq!(config.deep_link(), "https://app.example.com");
        assert_eq!(
            config.service_account_file.as_deref(),
            Some(Path::new("/run/secrets/sa.json"))
        );
        assert!(!config.cache_access_tokens);
        assert!(config.enable_outbox);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bool_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("ATTENDANCE_NOTIFY_OUTBOX", "maybe")]));
        assert!(!config.enable_outbox);
    }

    #[test]
    fn test_blank_app_url_falls_back() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[("APP_URL", "  ")]));
        assert_eq!(config.deep_link(), FALLBACK_APP_URL);
    }

    #[test]
    fn test_validate_lists_missing_values() {
        let err = Config::default().validate().unwrap_err().to_string();
        assert!(err.contains("MY_SUPABASE_URL"));
        assert!(err.contains("MY_SERVICE_ROLE_KEY"));
        assert!(err.contains("FCM_SERVICE_ACCOUNT_FILE"));
    }

    #[test]
    fn test_serialization_excludes_secrets() {
        let mut config = Config::default();
        config.service_role_key = "secret_key".to_string();
        config.service_account_json = Some("{\"private_key\":\"pk\"}".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret_key"));
        assert!(!json.contains("private_key"));

        let debug = format!("{config:?}");
        assert!(!debug.contains("secret_key"));
        assert!(!debug.contains("\"pk\""));
    }

    #[test]
    fn test_load_from_file_with_partial_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"supabase_url": "https://file.example.com", "enable_outbox": true}"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.supabase_url, "https://file.example.com");
        assert!(config.enable_outbox);
        assert_eq!(config.fcm_api_base, DEFAULT_FCM_API_BASE);
    }

    #[test]
    fn test_inline_service_account_wins() {
        let mut config = Config::default();
        config.service_account_json =
            Some(include_str!("../tests/fixtures/service_account.json").to_string());
        config.service_account_file = Some(PathBuf::from("/does/not/exist.json"));
        let account = config.service_account().unwrap();
        assert_eq!(account.project_id(), "attendance-test");
    }

    #[test]
    fn test_missing_service_account_file_errors() {
        let mut config = Config::default();
        config.service_account_file = Some(PathBuf::from("/does/not/exist.json"));
        assert!(config.service_account().is_err());
    }
}
