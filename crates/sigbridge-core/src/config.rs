//! SigBridge configuration system.
//!
//! TOML file at `~/.sigbridge/config.toml`; credentials may be overridden
//! through environment variables so hosted deployments never write them to
//! disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub market: MarketConfig,
}

impl BridgeConfig {
    /// Load config from the default path, falling back to defaults when the
    /// file does not exist. Environment overrides are applied either way.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Credentials from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(channel) = std::env::var("TELEGRAM_CHANNEL_ID")
            && let Ok(id) = channel.parse()
        {
            self.telegram.channel_id = id;
        }
        if let Ok(key) = std::env::var("FCM_SERVER_KEY") {
            self.firebase.server_key = key;
        }
        if let Ok(project) = std::env::var("FIREBASE_PROJECT_ID") {
            self.firebase.project_id = project;
        }
        if let Ok(token) = std::env::var("FIREBASE_ACCESS_TOKEN") {
            self.firebase.access_token = token;
        }
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sigbridge")
            .join("config.toml")
    }
}

/// Telegram stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel whose posts carry the signals.
    #[serde(default)]
    pub channel_id: i64,
    /// Long-poll window for `getUpdates`.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Ceiling on connect and subscribe calls; expiry is retryable.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_poll_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    15
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: 0,
            poll_timeout_secs: default_poll_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Firebase project credentials for FCM sends and Firestore roster queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub project_id: String,
    /// FCM server key (`Authorization: key=...`).
    #[serde(default)]
    pub server_key: String,
    /// OAuth bearer token for Firestore REST queries. Minting and refreshing
    /// it belongs to the deployment environment.
    #[serde(default)]
    pub access_token: String,
}

/// Delivery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Notifications expire after this many seconds so stale signals are
    /// dropped by the transport instead of delivered late.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Android notification channel.
    #[serde(default = "default_channel")]
    pub channel_id: String,
    /// Per-recipient send ceiling; expiry counts as a transient failure.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_ttl() -> u64 {
    60
}
fn default_channel() -> String {
    "trading_signals".into()
}
fn default_send_timeout() -> u64 {
    10
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            channel_id: default_channel(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Market timezone. Signals quote wall-clock times in WIB (UTC+7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_offset")]
    pub utc_offset_hours: i32,
}

fn default_offset() -> i32 {
    7
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.delivery.ttl_secs, 60);
        assert_eq!(config.delivery.channel_id, "trading_signals");
        assert_eq!(config.market.utc_offset_hours, 7);
        assert_eq!(config.telegram.poll_timeout_secs, 30);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            channel_id = -1003193908746
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.channel_id, -1003193908746);
        assert_eq!(config.delivery.ttl_secs, 60);
    }
}
