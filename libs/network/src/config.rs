//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inbound acceptance for peer dispatchers.
///
/// `key` is the shared secret every connecting peer must present in its
/// hello; empty means unauthenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub key: String,
}

/// One outbound peer the engine should connect to at start. A registry of
/// intent: recording it performs no network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub key: String,
}

/// Link-level tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Outbound connect attempt timeout.
    pub connect_timeout: Duration,
    /// Delay between redial attempts after a failed or dropped link.
    pub reconnect_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(3),
        }
    }
}
