use ciak_core::Director;
use ciak_mesh::{NegotiationState, RoomEvent};

use crate::integration::{create_test_pair, init_tracing};
use crate::utils::{EVENT_TIMEOUT_MS, MediaCall};

#[tokio::test]
async fn test_two_peers_establish() {
    init_tracing();

    let (mut admin, mut joiner) = create_test_pair(51000);

    admin.wait_for_mesh(1).await.expect("admin should reach the mesh");
    joiner.wait_for_mesh(1).await.expect("joiner should reach the mesh");

    let admin_view = admin.snapshot().await;
    let joiner_view = joiner.snapshot().await;

    assert!(admin_view.is_admin, "the listening side of the first link is admin");
    assert!(admin_view.sharing, "the admin starts as director");
    assert_eq!(admin_view.director, Director::Local);
    assert_eq!(admin_view.sessions.len(), 1);
    assert_eq!(admin_view.sessions[0].state, NegotiationState::Established);
    assert!(admin_view.sessions[0].is_sharing_video);

    assert!(!joiner_view.is_admin);
    assert!(!joiner_view.sharing);
    assert_eq!(
        joiner_view.director,
        Director::Remote(joiner_view.sessions[0].peer_id)
    );
    assert_eq!(joiner_view.established(), 1);

    // The joiner answered the admin's offer; the admin never saw an offer.
    assert_eq!(joiner.media.remote_offers().await, 1);
    assert_eq!(admin.media.remote_offers().await, 0);

    // Candidates flow both ways over the framed channel.
    assert!(
        admin
            .media
            .wait_for(1, |c| matches!(c, MediaCall::RemoteCandidate(_)), EVENT_TIMEOUT_MS)
            .await,
        "admin should receive the joiner's candidate"
    );
    assert!(
        joiner
            .media
            .wait_for(1, |c| matches!(c, MediaCall::RemoteCandidate(_)), EVENT_TIMEOUT_MS)
            .await,
        "joiner should receive the admin's candidate"
    );

    admin.handle.dispose().await;
    joiner
        .wait_for(|e| matches!(e, RoomEvent::PeerLost { .. }), EVENT_TIMEOUT_MS)
        .await
        .expect("joiner should notice the admin leaving");
    joiner.handle.dispose().await;
}
