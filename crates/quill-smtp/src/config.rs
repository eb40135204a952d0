//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport security for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Plain TCP only (not recommended).
    None,
    /// Implicit TLS, falling back to plain TCP if the TLS connect times out.
    #[default]
    Tls,
}

/// SMTP server and session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Security mode.
    pub security: Security,
    /// Port for implicit TLS.
    pub tls_port: u16,
    /// Port for plain TCP.
    pub plain_port: u16,
    /// Bound on establishing the connection, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Quiet period that ends a reply block, in milliseconds.
    pub read_timeout_ms: u64,
    /// Identifier sent with EHLO.
    pub client_id: String,
    /// Debug mode: requests delivery status notifications when the
    /// server offers DSN.
    pub debug: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            security: Security::Tls,
            tls_port: Self::DEFAULT_TLS_PORT,
            plain_port: Self::DEFAULT_PLAIN_PORT,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 1_000,
            client_id: "localhost".to_string(),
            debug: false,
        }
    }
}

impl SmtpConfig {
    /// Implicit TLS SMTP port.
    pub const DEFAULT_TLS_PORT: u16 = 465;
    /// Plain SMTP port.
    pub const DEFAULT_PLAIN_PORT: u16 = 25;

    /// Creates a default configuration for `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the reply-block quiet period.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
