//! Maintenance loop configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the background consolidation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Enable the background loop. When disabled the caller is
    /// responsible for invoking `consolidate` itself.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between consolidation passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl MaintenanceConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval_secs must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MaintenanceConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_invalid() {
        let config = MaintenanceConfig {
            interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let parsed: MaintenanceConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.enabled);
        assert_eq!(parsed.interval_secs, 300);
    }
}
