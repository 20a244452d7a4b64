use ciak_mesh::RoomEvent;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, MockMediaEngine, TestDevice, localhost, test_config};

#[tokio::test]
async fn test_add_user_is_idempotent() {
    init_tracing();

    let peer = localhost(51501, true);
    let mut device = TestDevice::start(test_config(51500, 2), MockMediaEngine::new(), vec![peer]);

    device
        .wait_for(
            |e| matches!(e, RoomEvent::SessionOpened { .. }),
            EVENT_TIMEOUT_MS,
        )
        .await
        .expect("first session should open");

    device.handle.add_peers(vec![peer, peer]).await.unwrap();
    let snapshot = device.snapshot().await;
    assert_eq!(snapshot.sessions.len(), 1, "duplicate addUser must not open a second session");
    assert_eq!(snapshot.sessions[0].descriptor, peer);

    // max_peers of 2 leaves room for a single remote device.
    device
        .handle
        .add_peers(vec![localhost(51502, true)])
        .await
        .unwrap();
    assert_eq!(device.snapshot().await.sessions.len(), 1);

    device.handle.dispose().await;
}
