//! Client and server configuration.

use std::time::Duration;

use roomcast_room::RoomConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Payloads buffered for one client before the room evicts it.
    ///
    /// Default: 32.
    pub outbound_capacity: usize,

    /// Longest a single write to the connection may take. A write that
    /// runs over is skipped; the client stays connected.
    ///
    /// Default: 30 seconds.
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 32,
            write_timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings for [`RoomcastServer`](crate::RoomcastServer).
///
/// Usually filled in through
/// [`RoomcastServerBuilder`](crate::RoomcastServerBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long a new connection has to send its handshake.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,

    pub client: ClientConfig,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            client: ClientConfig::default(),
            room: RoomConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.outbound_capacity, 32);
        assert_eq!(config.write_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.room.mailbox_size, 64);
    }

    #[test]
    fn test_server_config_deserialize() {
        let json = r#"{
            "bind_addr": "0.0.0.0:9000",
            "handshake_timeout": { "secs": 2, "nanos": 0 },
            "client": {
                "outbound_capacity": 8,
                "write_timeout": { "secs": 1, "nanos": 0 }
            },
            "room": { "mailbox_size": 16 }
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.client.outbound_capacity, 8);
        assert_eq!(config.room.mailbox_size, 16);
    }
}
