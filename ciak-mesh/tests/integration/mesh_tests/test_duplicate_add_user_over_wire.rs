use std::time::Duration;

use ciak_core::{FramedMessage, codec};
use ciak_mesh::RoomEvent;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::integration::init_tracing;
use crate::utils::{EVENT_TIMEOUT_MS, MockMediaEngine, TestDevice, localhost, test_config};

#[tokio::test]
async fn test_duplicate_add_user_over_wire() {
    init_tracing();

    // A bare socket stands in for the admin and relays the same peer twice.
    let listener = TcpListener::bind(("127.0.0.1", 52101)).await.unwrap();
    let mut device = TestDevice::start(
        test_config(52100, 4),
        MockMediaEngine::new(),
        vec![localhost(52101, false)],
    );

    let (mut admin, _) = tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), listener.accept())
        .await
        .expect("device should dial the admin")
        .unwrap();

    let relayed = localhost(52105, true);
    let line = codec::encode(&FramedMessage::AddUser(relayed)).unwrap();
    for _ in 0..2 {
        admin.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
    }
    admin.flush().await.unwrap();

    device
        .wait_for(
            |e| matches!(e, RoomEvent::SessionOpened { descriptor, .. } if *descriptor == relayed),
            EVENT_TIMEOUT_MS,
        )
        .await
        .expect("relayed peer should get a session");

    let snapshot = device
        .wait_until(|s| s.sessions.len() == 2, EVENT_TIMEOUT_MS)
        .await
        .expect("admin link plus one relayed link");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot_after = device.snapshot().await;
    assert_eq!(snapshot_after.sessions.len(), 2, "second addUser must be ignored");
    assert_eq!(
        snapshot
            .sessions
            .iter()
            .filter(|s| s.descriptor == relayed)
            .count(),
        1
    );

    device.handle.dispose().await;
}
