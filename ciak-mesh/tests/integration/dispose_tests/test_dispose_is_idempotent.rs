use ciak_mesh::RoomEvent;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, MediaCall, MockMediaEngine, TestDevice, localhost, test_config};

#[tokio::test]
async fn test_dispose_is_idempotent() {
    init_tracing();

    let mut device = TestDevice::start(
        test_config(51900, 2),
        MockMediaEngine::new(),
        vec![localhost(51901, true)],
    );
    device
        .wait_for(
            |e| matches!(e, RoomEvent::SessionOpened { .. }),
            EVENT_TIMEOUT_MS,
        )
        .await
        .unwrap();

    device.handle.dispose().await;
    device.handle.dispose().await;

    device
        .wait_for(|e| matches!(e, RoomEvent::Closed { .. }), EVENT_TIMEOUT_MS)
        .await
        .expect("room should close once");

    // Nothing follows Closed.
    assert!(device.events.recv().await.is_none());
    assert_eq!(
        device
            .media
            .count(|c| matches!(c, MediaCall::Shutdown))
            .await,
        1
    );
    assert!(device.handle.add_peers(vec![localhost(51902, true)]).await.is_err());
}
