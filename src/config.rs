//! Viewer configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_UPLOAD_PATH: &str = "/upload";
pub const DEFAULT_RECONNECT_MS: u64 = 3000;
pub const DEFAULT_DESCRIPTION_SUFFIX: &str = ".urdf";
pub const DEFAULT_MODEL: &str = "/assets/iiwa14_glb.urdf";
pub const DEFAULT_DIR_PAGE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The channel endpoint is not a `ws://` or `wss://` URL.
    #[error("invalid websocket url '{0}' (expected ws:// or wss://)")]
    InvalidWsUrl(String),
    /// The server base is not an `http://` or `https://` URL.
    #[error("invalid server url '{0}' (expected http:// or https://)")]
    InvalidServerUrl(String),
    #[error("description suffix must not be empty")]
    EmptySuffix,
    #[error("directory page size must be at least 1")]
    ZeroPageSize,
}

/// Values given on the command line; each one wins over its environment
/// variable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub ws_url: Option<String>,
    pub server_url: Option<String>,
    pub reconnect_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Joint-state channel endpoint.
    pub ws_url: String,
    /// Base for uploads and for model URLs that are not absolute.
    pub server_url: String,
    pub upload_path: String,
    /// Constant delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// File-name suffix identifying the description file in a drop.
    pub description_suffix: String,
    /// Model loaded at startup before any drop.
    pub default_model: String,
    /// Entries returned per directory page by filesystem readers.
    pub dir_page_size: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_owned(),
            server_url: DEFAULT_SERVER_URL.to_owned(),
            upload_path: DEFAULT_UPLOAD_PATH.to_owned(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_MS),
            description_suffix: DEFAULT_DESCRIPTION_SUFFIX.to_owned(),
            default_model: DEFAULT_MODEL.to_owned(),
            dir_page_size: DEFAULT_DIR_PAGE_SIZE,
        }
    }
}

impl ViewerConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `ROBOTVIEW_WS_URL`
    /// - `ROBOTVIEW_SERVER_URL`
    /// - `ROBOTVIEW_UPLOAD_PATH`
    /// - `ROBOTVIEW_RECONNECT_MS`: default 3000
    /// - `ROBOTVIEW_DESCRIPTION_SUFFIX`: default `.urdf`
    /// - `ROBOTVIEW_DEFAULT_MODEL`
    /// - `ROBOTVIEW_DIR_PAGE_SIZE`: default 100
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the resulting config fails [`Self::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&ConfigOverrides::default())
    }

    /// Like [`Self::from_env`], with `overrides` applied on top of the
    /// environment before validation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the merged config fails [`Self::validate`].
    pub fn from_env_with(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::env_values();
        if let Some(ws_url) = &overrides.ws_url {
            config.ws_url.clone_from(ws_url);
        }
        if let Some(server_url) = &overrides.server_url {
            config.server_url = server_url.trim_end_matches('/').to_owned();
        }
        if let Some(ms) = overrides.reconnect_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    fn env_values() -> Self {
        Self {
            ws_url: env_string("ROBOTVIEW_WS_URL", DEFAULT_WS_URL),
            server_url: env_string("ROBOTVIEW_SERVER_URL", DEFAULT_SERVER_URL)
                .trim_end_matches('/')
                .to_owned(),
            upload_path: env_string("ROBOTVIEW_UPLOAD_PATH", DEFAULT_UPLOAD_PATH),
            reconnect_delay: Duration::from_millis(env_parse("ROBOTVIEW_RECONNECT_MS", DEFAULT_RECONNECT_MS)),
            description_suffix: env_string("ROBOTVIEW_DESCRIPTION_SUFFIX", DEFAULT_DESCRIPTION_SUFFIX),
            default_model: env_string("ROBOTVIEW_DEFAULT_MODEL", DEFAULT_MODEL),
            dir_page_size: env_parse("ROBOTVIEW_DIR_PAGE_SIZE", DEFAULT_DIR_PAGE_SIZE),
        }
    }

    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidWsUrl(self.ws_url.clone()));
        }
        if !is_absolute_http(&self.server_url) {
            return Err(ConfigError::InvalidServerUrl(self.server_url.clone()));
        }
        if self.description_suffix.is_empty() {
            return Err(ConfigError::EmptySuffix);
        }
        if self.dir_page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }

    /// Full URL of the multipart upload endpoint.
    #[must_use]
    pub fn upload_url(&self) -> String {
        resolve_against(&self.server_url, &self.upload_path)
    }
}

/// Resolve a model or endpoint reference against the server base.
///
/// Absolute `http(s)://` references are returned unchanged.
#[must_use]
pub fn resolve_against(base: &str, reference: &str) -> String {
    if is_absolute_http(reference) {
        return reference.to_owned();
    }
    let base = base.trim_end_matches('/');
    if reference.starts_with('/') {
        format!("{base}{reference}")
    } else {
        format!("{base}/{reference}")
    }
}

fn is_absolute_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
