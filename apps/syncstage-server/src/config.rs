//! Server configuration.
//!
//! Supports loading from a YAML file with environment variable overrides,
//! mirroring how `syncstage_core::Config` itself documents its defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP/WebSocket server to. 0 = auto-allocate.
    /// Override: `SYNCSTAGE_BIND_PORT`
    pub bind_port: u16,

    /// How long an empty room survives before being reaped, in seconds.
    /// Override: `SYNCSTAGE_ROOM_REAP_GRACE_PERIOD_SECS`
    pub room_reap_grace_period_secs: u64,

    /// How often the reaper sweeps for stale rooms, in seconds.
    /// Override: `SYNCSTAGE_REAP_INTERVAL_SECS`
    pub reap_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 0,
            room_reap_grace_period_secs: 300,
            reap_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SYNCSTAGE_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }
        if let Ok(val) = std::env::var("SYNCSTAGE_ROOM_REAP_GRACE_PERIOD_SECS") {
            if let Ok(secs) = val.parse() {
                self.room_reap_grace_period_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("SYNCSTAGE_REAP_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.reap_interval_secs = secs;
            }
        }
    }

    /// Converts to `syncstage_core`'s `Config` type.
    pub fn to_core_config(&self) -> syncstage_core::Config {
        syncstage_core::Config {
            preferred_port: self.bind_port,
            room_reap_grace_period_secs: self.room_reap_grace_period_secs,
            reap_interval_secs: self.reap_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_core_defaults() {
        let config = ServerConfig::default();
        let core = config.to_core_config();
        let core_default = syncstage_core::Config::default();
        assert_eq!(core.preferred_port, core_default.preferred_port);
        assert_eq!(
            core.room_reap_grace_period_secs,
            core_default.room_reap_grace_period_secs
        );
        assert_eq!(core.reap_interval_secs, core_default.reap_interval_secs);
    }

    #[test]
    fn bind_port_env_override_takes_effect() {
        std::env::set_var("SYNCSTAGE_BIND_PORT", "5555");
        let mut config = ServerConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.bind_port, 5555);
        std::env::remove_var("SYNCSTAGE_BIND_PORT");
    }
}
