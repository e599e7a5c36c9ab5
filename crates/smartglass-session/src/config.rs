//! Tunable timeouts, retry counts, and transport addresses for a
//! [`crate::engine::SessionEngine`].
//!
//! No on-disk format is read or written by this crate; `SessionConfig` is
//! `Serialize`/`Deserialize` only so a caller that wants to persist its own
//! tuning can do so.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The well-known SmartGlass UDP port.
pub const SMARTGLASS_PORT: u16 = 5050;

fn default_broadcast() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(255, 255, 255, 255), SMARTGLASS_PORT)
}

fn default_multicast() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), SMARTGLASS_PORT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Destination for broadcast `DiscoveryRequest`/`PowerOnRequest` packets.
    #[serde(default = "default_broadcast")]
    pub broadcast_addr: SocketAddrV4,
    /// Destination for multicast `DiscoveryRequest`/`PowerOnRequest` packets.
    #[serde(default = "default_multicast")]
    pub multicast_addr: SocketAddrV4,
    /// How many times `discover`/`power_on` resend their request.
    #[serde(default = "default_discover_tries")]
    pub discover_tries: u32,
    /// Spacing between `DiscoveryRequest` resends.
    #[serde(default = "default_discover_spacing")]
    pub discover_spacing: Duration,
    /// How long `discover` collects responses before returning.
    #[serde(default = "default_discover_wait")]
    pub discover_wait: Duration,
    /// Spacing between `PowerOnRequest` resends.
    #[serde(default = "default_power_on_spacing")]
    pub power_on_spacing: Duration,
    /// Default timeout for a blocking `send_message`.
    #[serde(default = "default_blocking_send_timeout")]
    pub blocking_send_timeout: Duration,
    /// Default retry count for a blocking `send_message`.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
    /// How often the heartbeat task pings the console while connected.
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period: Duration,
    /// How many times `connect` resends an unacknowledged `ConnectRequest`
    /// group before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Largest a packed `ConnectRequest` may be before its auth payload is
    /// fragmented across multiple packets.
    #[serde(default = "default_connect_max_unfragmented_size")]
    pub connect_max_unfragmented_size: usize,
}

fn default_discover_tries() -> u32 {
    3
}

fn default_discover_spacing() -> Duration {
    Duration::from_millis(500)
}

fn default_discover_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_power_on_spacing() -> Duration {
    Duration::from_millis(100)
}

fn default_blocking_send_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_send_retries() -> u32 {
    3
}

fn default_heartbeat_period() -> Duration {
    Duration::from_secs(3)
}

fn default_connect_retries() -> u32 {
    3
}

fn default_connect_max_unfragmented_size() -> usize {
    1024
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: default_broadcast(),
            multicast_addr: default_multicast(),
            discover_tries: default_discover_tries(),
            discover_spacing: default_discover_spacing(),
            discover_wait: default_discover_wait(),
            power_on_spacing: default_power_on_spacing(),
            blocking_send_timeout: default_blocking_send_timeout(),
            send_retries: default_send_retries(),
            heartbeat_period: default_heartbeat_period(),
            connect_retries: default_connect_retries(),
            connect_max_unfragmented_size: default_connect_max_unfragmented_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_timeouts() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.blocking_send_timeout, Duration::from_secs(5));
        assert_eq!(cfg.send_retries, 3);
        assert_eq!(cfg.heartbeat_period, Duration::from_secs(3));
        assert_eq!(cfg.discover_wait, Duration::from_secs(5));
        assert_eq!(cfg.connect_retries, 3);
    }

    #[test]
    fn serializes_round_trip() {
        let cfg = SessionConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let restored: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.send_retries, cfg.send_retries);
    }
}
