//! Dispatcher configuration.
//!
//! Loadable from TOML; every field has a default so an empty document is a
//! valid config. The listen address and peer list recorded here are inputs
//! to the engine at start, equivalent to calling `set_listen_address` /
//! `register_remote_peer` before `start`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use network::{EngineConfig, ListenConfig, PeerConfig};

use crate::error::DispatchError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Cadence of the cycle-timer scan driver.
    pub timer_interval: Duration,
    /// Inbound acceptance for peer dispatchers.
    pub listen: Option<ListenConfig>,
    /// Outbound peers dialed at start.
    pub peers: Vec<PeerConfig>,
    /// Link engine tuning.
    pub engine: EngineConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timer_interval: Duration::from_millis(5),
            listen: None,
            peers: Vec::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, DispatchError> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = DispatcherConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.timer_interval, Duration::from_millis(5));
        assert!(cfg.listen.is_none());
        assert!(cfg.peers.is_empty());
    }

    #[test]
    fn full_document_parses() {
        let cfg = DispatcherConfig::from_toml_str(
            r#"
            timer_interval = { secs = 0, nanos = 10000000 }

            [listen]
            ip = "0.0.0.0"
            port = 7400
            key = "sesame"

            [[peers]]
            ip = "10.0.0.2"
            port = 7400
            key = "sesame"

            [engine]
            connect_timeout = { secs = 2, nanos = 0 }
            reconnect_interval = { secs = 1, nanos = 0 }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timer_interval, Duration::from_millis(10));
        assert_eq!(cfg.listen.as_ref().unwrap().port, 7400);
        assert_eq!(cfg.peers.len(), 1);
        assert_eq!(cfg.engine.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn bad_document_is_an_error() {
        assert!(DispatcherConfig::from_toml_str("timer_interval = \"fast\"").is_err());
    }
}
