use ciak_mesh::RoomEvent;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, MediaCall, MockMediaEngine, TestDevice, localhost, test_config};

#[tokio::test]
async fn test_engine_start_failure_is_fatal() {
    init_tracing();

    let mut device = TestDevice::start(
        test_config(51300, 2),
        MockMediaEngine::failing(),
        vec![localhost(51301, true)],
    );

    let fatal = device
        .wait_for(|e| matches!(e, RoomEvent::Fatal(_)), EVENT_TIMEOUT_MS)
        .await
        .expect("start failure should be reported");
    match fatal {
        RoomEvent::Fatal(reason) => assert!(reason.contains("camera unavailable")),
        other => panic!("unexpected event {:?}", other),
    }

    device
        .wait_for(|e| matches!(e, RoomEvent::Closed { .. }), EVENT_TIMEOUT_MS)
        .await
        .expect("room should close after a fatal error");

    let calls = device.media.calls().await;
    assert!(!calls.iter().any(|c| matches!(c, MediaCall::PeerCreated(_))));
    assert_eq!(calls, vec![MediaCall::Shutdown]);
    assert!(device.handle.snapshot().await.is_err());
}
