use ciak_mesh::{MeshError, RoomEvent};

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, MockMediaEngine, TestDevice, localhost, test_config};

#[tokio::test]
async fn test_unreachable_peer_is_dropped() {
    init_tracing();

    let mut config = test_config(51200, 3);
    config.connect_retries = 2;
    config.retry_backoff_ms = 20;

    let mut device = TestDevice::start(config, MockMediaEngine::new(), vec![localhost(51201, false)]);

    let lost = device
        .wait_for(|e| matches!(e, RoomEvent::PeerLost { .. }), EVENT_TIMEOUT_MS)
        .await
        .expect("unreachable peer should be reported");

    match lost {
        RoomEvent::PeerLost {
            descriptor, error, ..
        } => {
            assert_eq!(descriptor.port, 51201);
            assert!(matches!(error, Some(MeshError::Connect { .. })));
        }
        other => panic!("unexpected event {:?}", other),
    }

    // The room survives losing its only peer.
    let snapshot = device.snapshot().await;
    assert!(snapshot.sessions.is_empty());
    assert!(!snapshot.closed);

    device.handle.dispose().await;
}
