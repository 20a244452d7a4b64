use anyhow::{Result, bail};
use ciak_core::PeerDescriptor;
use ciak_mesh::{MeshConfig, RoomEvent, RoomHandle, RoomSnapshot};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::mock_media::MockMediaEngine;

/// Timeout for a link to reach the established state (ms).
pub const ESTABLISH_TIMEOUT_MS: u64 = 10000;

/// Timeout for a single room event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 5000;

pub fn localhost(port: u16, listen: bool) -> PeerDescriptor {
    PeerDescriptor::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port, listen)
}

/// Config for a room on `base_port`, with short timeouts so failures show up fast.
pub fn test_config(base_port: u16, max_peers: u16) -> MeshConfig {
    MeshConfig {
        base_port,
        max_peers,
        connect_retries: 20,
        retry_backoff_ms: 50,
        accept_timeout_ms: 5000,
        ..MeshConfig::default()
    }
}

pub struct TestDevice {
    pub handle: RoomHandle,
    pub events: mpsc::Receiver<RoomEvent>,
    pub media: MockMediaEngine,
}

impl TestDevice {
    pub fn start(config: MeshConfig, media: MockMediaEngine, peers: Vec<PeerDescriptor>) -> Self {
        let (handle, events) = RoomHandle::start(config, Arc::new(media.clone()), peers);
        Self {
            handle,
            events,
            media,
        }
    }

    pub async fn wait_for(
        &mut self,
        predicate: impl Fn(&RoomEvent) -> bool,
        timeout_ms: u64,
    ) -> Result<RoomEvent> {
        wait_for_event(&mut self.events, predicate, timeout_ms).await
    }

    pub async fn wait_for_mesh(&mut self, peers: usize) -> Result<()> {
        self.wait_for(
            |e| matches!(e, RoomEvent::MeshReady { peers: n } if *n == peers),
            ESTABLISH_TIMEOUT_MS,
        )
        .await
        .map(|_| ())
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        self.handle.snapshot().await.expect("room should be running")
    }

    /// Poll snapshots until `predicate` holds.
    pub async fn wait_until(
        &self,
        predicate: impl Fn(&RoomSnapshot) -> bool,
        timeout_ms: u64,
    ) -> Result<RoomSnapshot> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        loop {
            let snapshot = self.handle.snapshot().await?;
            if predicate(&snapshot) {
                return Ok(snapshot);
            }
            if start.elapsed() > timeout {
                bail!("Timeout waiting for room state, last: {:?}", snapshot);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Drain room events until one matches `predicate`.
pub async fn wait_for_event(
    events: &mut mpsc::Receiver<RoomEvent>,
    predicate: impl Fn(&RoomEvent) -> bool,
    timeout_ms: u64,
) -> Result<RoomEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);

    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(event)) if predicate(&event) => return Ok(event),
            Ok(Some(event)) => {
                tracing::debug!("[RoomHelper] skipping {:?}", event);
            }
            Ok(None) => bail!("Room event channel closed"),
            Err(_) => bail!("Timeout waiting for room event"),
        }
    }
}
