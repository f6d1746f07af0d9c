//! Runtime settings: defaults, YAML file, environment overrides.
//!
//! Precedence, lowest first: built-in defaults, a YAML file, `VEO_*`
//! environment variables, explicit builder calls.

use crate::{Error, ErrorContext, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://genaipro.vn/api/v1";

/// Keyring service holding the API key (account name `api_key`).
pub const KEYRING_SERVICE: &str = "genaipro-veo";
const KEYRING_ACCOUNT: &str = "api_key";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub http_read_timeout_secs: u64,
    pub stream_idle_timeout_secs: u64,
    pub max_retries: u32,
    pub requests_per_minute: u32,
    pub max_concurrent_jobs: usize,
    pub progress_dir: PathBuf,
    pub max_upload_size_mb: u64,
    pub proxy_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_read_timeout_secs: 300,
            stream_idle_timeout_secs: 30,
            max_retries: 3,
            requests_per_minute: 10,
            max_concurrent_jobs: 5,
            progress_dir: PathBuf::from("data/automation_progress"),
            max_upload_size_mb: 50,
            proxy_url: None,
        }
    }
}

impl Settings {
    /// Defaults overridden by `VEO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut s = Self::default();
        s.apply_env()?;
        Ok(s)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid settings file: {}", e),
                ErrorContext::new().with_source("settings_yaml"),
            )
        })
    }

    /// Load a YAML file, then apply environment overrides on top.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read settings file: {}", e),
                ErrorContext::new().with_field_path(path.display().to_string()),
            )
        })?;
        let mut s = Self::from_yaml_str(&text)?;
        s.apply_env()?;
        Ok(s)
    }

    /// `VEO_API_KEY` is not copied into `api_key`; [`resolve_api_key`](Self::resolve_api_key)
    /// reads it after the keyring.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_str("VEO_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = env_parse("VEO_HTTP_READ_TIMEOUT_SECS")? {
            self.http_read_timeout_secs = v;
        }
        if let Some(v) = env_parse("VEO_STREAM_IDLE_TIMEOUT_SECS")? {
            self.stream_idle_timeout_secs = v;
        }
        if let Some(v) = env_parse("VEO_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_parse("VEO_REQUESTS_PER_MINUTE")? {
            self.requests_per_minute = v;
        }
        if let Some(v) = env_parse("VEO_MAX_CONCURRENT_JOBS")? {
            self.max_concurrent_jobs = v;
        }
        if let Some(v) = env_str("VEO_PROGRESS_DIR") {
            self.progress_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("VEO_MAX_UPLOAD_SIZE_MB")? {
            self.max_upload_size_mb = v;
        }
        if let Some(v) = env_str("VEO_PROXY_URL") {
            self.proxy_url = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url: {}", e),
                ErrorContext::new()
                    .with_field_path("settings.base_url")
                    .with_details(self.base_url.clone()),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "base url must be http or https",
                ErrorContext::new().with_field_path("settings.base_url"),
            ));
        }
        if self.stream_idle_timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "stream idle timeout must be greater than zero",
                ErrorContext::new().with_field_path("settings.stream_idle_timeout_secs"),
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::configuration_with_context(
                "at least one attempt is required",
                ErrorContext::new().with_field_path("settings.max_retries"),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(Error::configuration_with_context(
                "max concurrent jobs must be greater than zero",
                ErrorContext::new().with_field_path("settings.max_concurrent_jobs"),
            ));
        }
        Ok(())
    }

    pub fn http_read_timeout(&self) -> Duration {
        Duration::from_secs(self.http_read_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }

    /// Resolve the API key: explicit value, then OS keyring, then `VEO_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String> {
        let explicit = self.api_key.as_deref();
        // The keyring is only consulted when no explicit key is set.
        let keyring = match explicit.filter(|k| !k.trim().is_empty()) {
            Some(_) => None,
            None => keyring_api_key(),
        };
        pick_api_key(explicit, keyring, || env_str("VEO_API_KEY")).ok_or_else(|| {
            Error::configuration_with_context(
                "no API key configured",
                ErrorContext::new()
                    .with_field_path("settings.api_key")
                    .with_details("set VEO_API_KEY or store a key in the OS keyring"),
            )
        })
    }
}

fn pick_api_key(
    explicit: Option<&str>,
    keyring: Option<String>,
    env: impl FnOnce() -> Option<String>,
) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    if let Some(key) = keyring {
        debug!(service = KEYRING_SERVICE, "using API key from keyring");
        return Some(key);
    }
    env()
}

fn keyring_api_key() -> Option<String> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT).ok()?;
    entry
        .get_password()
        .ok()
        .filter(|k| !k.trim().is_empty())
}

fn env_str(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_str(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid value for {}: {}", name, e),
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(raw),
            )
        }),
    }
}
