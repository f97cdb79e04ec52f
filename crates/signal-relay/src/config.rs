//! Relay service configuration

use crate::mailbox::MailboxConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the relay service
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP API binds to
    pub bind_addr: SocketAddr,
    /// Base URL used when shaping join links for the notification service
    pub join_base_url: String,
    /// Retention and expiry windows for the mailbox
    pub mailbox: MailboxConfig,
    /// How often the retention sweep runs
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8090".parse().expect("valid default bind addr"),
            join_base_url: "http://localhost:8090".to_string(),
            mailbox: MailboxConfig::default(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RelayConfig {
    /// Set the bind address
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the join-link base URL
    pub fn with_join_base_url(mut self, base: impl Into<String>) -> Self {
        self.join_base_url = base.into();
        self
    }

    /// Set the sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
