use ciak_core::PortPlan;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables shared by the lobby, the room and every peer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub base_port: u16,
    pub max_peers: u16,
    pub connect_retries: u32,
    pub retry_backoff_ms: u64,
    pub accept_timeout_ms: u64,
    pub lobby_port: u16,
    pub event_buffer: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            base_port: 50000,
            max_peers: 3,
            connect_retries: 5,
            retry_backoff_ms: 200,
            accept_timeout_ms: 30_000,
            lobby_port: 49999,
            event_buffer: 256,
        }
    }
}

impl MeshConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn port_plan(&self) -> PortPlan {
        PortPlan::new(self.base_port, self.max_peers)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}
