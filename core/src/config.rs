//! Backend address and host-header settings.
//!
//! The dispatcher asks its `SettingsSource` on every server-context call, so
//! a source backed by the process environment picks up changes without the
//! client caching anything.

use crate::error::ConfigError;

pub const DEFAULT_INTERNAL_API_HOST: &str = "localhost";
pub const DEFAULT_INTERNAL_API_PORT: u16 = 8089;

/// Where the backend lives on the internal network, and which host name the
/// backend expects to see in forwarded requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub internal_api_host: String,
    pub internal_api_port: u16,
    /// Value for the outgoing `Host` header in the server context (`APP_HOST`).
    pub app_host: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            internal_api_host: DEFAULT_INTERNAL_API_HOST.to_string(),
            internal_api_port: DEFAULT_INTERNAL_API_PORT,
            app_host: None,
        }
    }
}

impl Settings {
    pub fn new(internal_api_host: &str, internal_api_port: u16) -> Self {
        Self {
            internal_api_host: internal_api_host.to_string(),
            internal_api_port,
            app_host: None,
        }
    }

    pub fn with_app_host(mut self, app_host: &str) -> Self {
        self.app_host = Some(app_host.to_string());
        self
    }

    /// Read `INTERNAL_API_HOST`, `INTERNAL_API_PORT` and `APP_HOST`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let internal_api_host = lookup("INTERNAL_API_HOST")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_INTERNAL_API_HOST.to_string());
        let internal_api_port = match lookup("INTERNAL_API_PORT").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_INTERNAL_API_PORT,
        };
        let app_host = lookup("APP_HOST").filter(|v| !v.is_empty());
        Ok(Self {
            internal_api_host,
            internal_api_port,
            app_host,
        })
    }
}

/// Supplies settings at call time.
pub trait SettingsSource: Send + Sync {
    fn settings(&self) -> Result<Settings, ConfigError>;
}

impl SettingsSource for Settings {
    fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(self.clone())
    }
}

/// Re-reads the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn settings(&self) -> Result<Settings, ConfigError> {
        Settings::from_env()
    }
}
