//! `[serve]` section configuration.
//!
//! Contains proxy front settings.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "0.0.0.0"   # Network interface (127.0.0.1 = localhost only)
//! workers = 4             # Concurrent request handlers
//! upstream_timeout_ms = 60000  # Per-request backend limit (default: none)
//! ```
//!
//! The listening port is the host side of `[backend] publish`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::Deserialize;

use crate::config::{ConfigDiagnostics, FieldPath};

/// Proxy front settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `0.0.0.0` (default): all interfaces
    /// - `127.0.0.1`: localhost only
    pub interface: IpAddr,

    /// Size of the request handler pool.
    pub workers: usize,

    /// Total time allowed for one forwarded request, including the response
    /// body. Unset means no limit, so long polls and large downloads pass.
    pub upstream_timeout_ms: Option<u64>,
}

impl ServeConfig {
    pub const WORKERS: FieldPath = FieldPath::new("serve.workers");

    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.workers == 0 {
            diag.error(Self::WORKERS, "must be at least 1");
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            workers: 4,
            upstream_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use crate::config::{ConfigDiagnostics, test_parse_config};

    #[test]
    fn test_serve_config() {
        let config = test_parse_config("[serve]\ninterface = \"127.0.0.1\"\nworkers = 8");

        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.serve.workers, 8);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.serve.workers, 4);
        assert_eq!(config.serve.upstream_timeout(), None);
    }

    #[test]
    fn test_upstream_timeout() {
        let config = test_parse_config("[serve]\nupstream_timeout_ms = 2500");
        assert_eq!(
            config.serve.upstream_timeout(),
            Some(std::time::Duration::from_millis(2500))
        );
    }

    #[test]
    fn test_serve_config_ipv6() {
        let config = test_parse_config("[serve]\ninterface = \"::1\"");
        assert_eq!(
            config.serve.interface,
            IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1))
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = test_parse_config("[serve]\nworkers = 0");
        let mut diag = ConfigDiagnostics::new();
        config.serve.validate(&mut diag);
        assert_eq!(diag.len(), 1);
        assert_eq!(diag.errors()[0].field.as_str(), "serve.workers");
    }
}
