//! Connection settings for the TCP-backed connectors.

use std::time::Duration;

/// Where and how patiently to dial the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    /// Daemon address, `host:port`.
    pub addr: String,

    /// How long to wait for the TCP connection before giving up.
    pub connect_timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:4223".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_local_daemon() {
        let config = ConnectConfig::default();
        assert_eq!(config.addr, "127.0.0.1:4223");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
