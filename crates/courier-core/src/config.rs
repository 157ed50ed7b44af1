//! Courier configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Path to the JSON document store.
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_store_path() -> String {
    "~/.courier/store.json".into()
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            gateway: GatewayConfig::default(),
            transport: TransportConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl CourierConfig {
    /// Load config from the default path (~/.courier/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::CourierError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::CourierError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Courier home directory (~/.courier).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".courier")
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Browser-driven transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebDriver endpoint the browser session is driven through.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Browser profile dir — keeps the messaging session logged in.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    /// Country code prefixed onto bare local numbers.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// How long to wait for the QR scan / chat pane on connect.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
    /// How long to wait for the send button once a chat is open.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    /// Where failure screenshots are written.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,
}

fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".into()
}
fn default_profile_dir() -> String {
    "~/.courier/profile".into()
}
fn default_country_code() -> String {
    "91".into()
}
fn default_login_timeout() -> u64 {
    120
}
fn default_send_timeout() -> u64 {
    30
}
fn default_screenshot_dir() -> String {
    "~/.courier/screenshots".into()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            profile_dir: default_profile_dir(),
            country_code: default_country_code(),
            login_timeout_secs: default_login_timeout(),
            send_timeout_secs: default_send_timeout(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Polling interval for recurring triggers.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// Cadence of the observability summary line.
    #[serde(default = "default_summary")]
    pub summary_secs: u64,
    /// Cadence of the store-driven recovery pass.
    #[serde(default = "default_reconcile")]
    pub reconcile_secs: u64,
    /// Back-off after a failed tick.
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
}

fn default_tick() -> u64 {
    1
}
fn default_summary() -> u64 {
    30
}
fn default_reconcile() -> u64 {
    300
}
fn default_backoff() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick(),
            summary_secs: default_summary(),
            reconcile_secs: default_reconcile(),
            backoff_secs: default_backoff(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CourierConfig::default();
        assert_eq!(cfg.gateway.port, 5000);
        assert_eq!(cfg.scheduler.tick_secs, 1);
        assert_eq!(cfg.scheduler.summary_secs, 30);
        assert_eq!(cfg.transport.country_code, "91");
    }

    #[test]
    fn test_partial_toml() {
        let cfg: CourierConfig = toml::from_str(
            r#"
            [gateway]
            port = 8080

            [transport]
            country_code = "1"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gateway.port, 8080);
        assert_eq!(cfg.gateway.host, "0.0.0.0");
        assert_eq!(cfg.transport.country_code, "1");
        assert_eq!(cfg.scheduler.backoff_secs, 5);
    }
}
