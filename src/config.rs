use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::Quotas;

/// Broker configuration, persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default = "default_max_queues")]
    pub max_queues: usize,
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,
    #[serde(default = "default_max_subscriptions_per_topic")]
    pub max_subscriptions_per_topic: usize,
    #[serde(default = "default_max_rules_per_subscription")]
    pub max_rules_per_subscription: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: default_max_message_bytes(),
            max_queues: default_max_queues(),
            max_topics: default_max_topics(),
            max_subscriptions_per_topic: default_max_subscriptions_per_topic(),
            max_rules_per_subscription: default_max_rules_per_subscription(),
            sweep_interval_secs: default_sweep_interval_secs(),
            log_to_file: false,
        }
    }
}

// 256 KiB, matching the standard-tier Service Bus message cap.
fn default_max_message_bytes() -> usize {
    256 * 1024
}

fn default_max_queues() -> usize {
    10_000
}

fn default_max_topics() -> usize {
    10_000
}

fn default_max_subscriptions_per_topic() -> usize {
    2_000
}

fn default_max_rules_per_subscription() -> usize {
    2_000
}

fn default_sweep_interval_secs() -> u64 {
    10
}

impl BrokerConfig {
    /// Standard config file path: ~/.config/localbus-broker/config.toml
    pub fn config_path() -> PathBuf {
        dirs_fallback().join("localbus-broker").join("config.toml")
    }

    /// Load config from disk. Returns defaults if the file doesn't exist
    /// or fails to parse.
    pub fn load() -> Self {
        let path = Self::config_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            toml::from_str(&content).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn quotas(&self) -> Quotas {
        Quotas {
            max_queues: self.max_queues,
            max_topics: self.max_topics,
            max_subscriptions_per_topic: self.max_subscriptions_per_topic,
            max_rules_per_subscription: self.max_rules_per_subscription,
        }
    }
}

/// Cross-platform config directory fallback.
fn dirs_fallback() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config");
        }
    }

    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_size_ceilings() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.max_message_bytes, 256 * 1024);
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(10));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: BrokerConfig = toml::from_str("max_queues = 5").unwrap();
        assert_eq!(cfg.max_queues, 5);
        assert_eq!(cfg.max_topics, default_max_topics());
    }
}
