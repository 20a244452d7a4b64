use ciak_core::Director;
use ciak_mesh::RoomEvent;

use crate::integration::{create_test_pair, init_tracing};
use crate::utils::{ESTABLISH_TIMEOUT_MS, EVENT_TIMEOUT_MS, MediaCall};

#[tokio::test]
async fn test_director_handoff() {
    init_tracing();

    let (mut admin, mut joiner) = create_test_pair(51600);

    admin.wait_for_mesh(1).await.expect("admin should reach the mesh");
    joiner.wait_for_mesh(1).await.expect("joiner should reach the mesh");
    assert_eq!(admin.media.remote_offers().await, 0);

    joiner.handle.take_director().await.expect("joiner should take the director role");

    joiner
        .wait_for(
            |e| matches!(e, RoomEvent::DirectorChanged(Director::Local)),
            EVENT_TIMEOUT_MS,
        )
        .await
        .expect("joiner should report itself as director");

    let changed = admin
        .wait_for(
            |e| matches!(e, RoomEvent::DirectorChanged(Director::Remote(_))),
            EVENT_TIMEOUT_MS,
        )
        .await
        .expect("admin should learn about the new director");
    assert!(matches!(changed, RoomEvent::DirectorChanged(Director::Remote(_))));

    let admin_view = admin
        .wait_until(|s| !s.sharing && s.sharing_sessions() == 0, EVENT_TIMEOUT_MS)
        .await
        .expect("admin should stop sharing");
    assert_eq!(admin_view.director, Director::Remote(admin_view.sessions[0].peer_id));

    let joiner_view = joiner
        .wait_until(|s| s.sharing && s.sharing_sessions() == 1, EVENT_TIMEOUT_MS)
        .await
        .expect("joiner should share video");
    assert_eq!(joiner_view.director, Director::Local);
    assert_eq!(joiner_view.established(), 1);

    // Exactly one renegotiation reaches the old director.
    assert!(
        admin
            .media
            .wait_for(
                1,
                |c| matches!(c, MediaCall::RemoteDescription { kind: ciak_core::SdpType::Offer, .. }),
                ESTABLISH_TIMEOUT_MS,
            )
            .await
    );
    assert!(
        admin
            .media
            .wait_for(1, |c| matches!(c, MediaCall::VideoStopped(_)), EVENT_TIMEOUT_MS)
            .await
    );
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(admin.media.remote_offers().await, 1);

    admin.handle.dispose().await;
    joiner.handle.dispose().await;
}
