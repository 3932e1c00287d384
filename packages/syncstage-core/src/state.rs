//! Core application configuration.

use serde::{Deserialize, Serialize};

/// Runtime configuration for the room coordination engine.
///
/// All fields have sensible defaults; the server binary layers YAML and
/// environment-variable overrides on top of [`Config::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preferred bind port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    /// How long an empty room (zero connected clients) survives before
    /// `PlaybackRegistry::reap` drops it.
    pub room_reap_grace_period_secs: u64,

    /// How often `PlaybackRegistry::reap` runs, in seconds.
    pub reap_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            room_reap_grace_period_secs: 300,
            reap_interval_secs: 60,
        }
    }
}
