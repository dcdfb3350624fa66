//! # Runtime configuration.
//!
//! Provides [`Config`] centralized settings for the host runtime, the command server
//! and the focus supervisor.
//!
//! ## Sentinel values
//! - `port = 0` → ephemeral port chosen by the OS
//! - `max_line_length = 0` → unlimited line length
//! - `worker_threads = 0` → tokio default (one per core)

use std::net::{IpAddr, Ipv4Addr};

use crate::focus::GrantPolicy;
use crate::server::DEFAULT_PORT;

/// Global configuration for the focusvisor runtime.
///
/// ## Field semantics
/// - `host`/`port`: listening address of the command server
/// - `grant_policy`: what a grant does while a focus task is still active
/// - `drain_connections_on_stop`: whether `stop()` also closes accepted connections
/// - `max_line_length`: longest accepted request line (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `worker_threads`: host runtime worker count (`0` = tokio default)
///
/// Read sentinel fields through the accessors (`line_limit`, `runtime_workers`, ...)
/// instead of comparing against `0` at call sites.
#[derive(Clone, Debug)]
pub struct Config {
    /// Interface the command server binds to.
    pub host: IpAddr,

    /// Port the command server binds to.
    pub port: u16,

    /// Behaviour of a grant that arrives while a focus task is active.
    pub grant_policy: GrantPolicy,

    /// Close accepted connections when the server stops.
    ///
    /// Off by default: stopping only closes the listener and already accepted
    /// connections run until their peer disconnects.
    pub drain_connections_on_stop: bool,

    /// Maximum request line length in bytes (`0` = unlimited).
    pub max_line_length: usize,

    /// Number of events the bus retains for slow receivers.
    ///
    /// Receivers more than `bus_capacity` events behind will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Number of worker threads of the host runtime (`0` = tokio default).
    pub worker_threads: usize,
}

impl Config {
    /// Returns the line length limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → lines longer than `n` bytes terminate the connection
    #[inline]
    pub fn line_limit(&self) -> Option<usize> {
        if self.max_line_length == 0 {
            None
        } else {
            Some(self.max_line_length)
        }
    }

    /// Returns the host runtime worker count as an `Option`.
    #[inline]
    pub fn runtime_workers(&self) -> Option<usize> {
        if self.worker_threads == 0 {
            None
        } else {
            Some(self.worker_threads)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Defaults:
    ///
    /// - `host = 0.0.0.0`, `port = 12345`
    /// - `grant_policy = GrantPolicy::Reject`
    /// - `drain_connections_on_stop = false`
    /// - `max_line_length = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `worker_threads = 0` (tokio default)
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            grant_policy: GrantPolicy::default(),
            drain_connections_on_stop: false,
            max_line_length: 0,
            bus_capacity: 1024,
            worker_threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 12345);
        assert_eq!(cfg.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(cfg.grant_policy, GrantPolicy::Reject);
        assert!(!cfg.drain_connections_on_stop);
    }

    #[test]
    fn test_sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.line_limit(), None);
        assert_eq!(cfg.runtime_workers(), None);

        cfg.max_line_length = 64;
        cfg.worker_threads = 2;
        cfg.bus_capacity = 0;
        assert_eq!(cfg.line_limit(), Some(64));
        assert_eq!(cfg.runtime_workers(), Some(2));
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
