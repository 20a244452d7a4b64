use std::time::Duration;

use ciak_core::{Director, PeerId, PortPlan};
use ciak_mesh::{MeshError, RoomEvent};

use crate::integration::init_tracing;
use crate::utils::{
    ESTABLISH_TIMEOUT_MS, EVENT_TIMEOUT_MS, MockMediaEngine, TestDevice, localhost, test_config,
};

/// Offers applied on the session towards `peer_id`.
async fn offers_from(device: &TestDevice, peer_id: PeerId) -> usize {
    device
        .media
        .count(|c| {
            matches!(
                c,
                crate::utils::MediaCall::RemoteDescription { peer_id: id, kind: ciak_core::SdpType::Offer }
                    if *id == peer_id
            )
        })
        .await
}

#[tokio::test]
async fn test_handoff_in_full_mesh() {
    init_tracing();

    let base = 52000;
    let plan = PortPlan::new(base, 3);
    let star_b = plan.star_port(1).unwrap();
    let star_c = plan.star_port(2).unwrap();
    let mesh = plan.mesh_port(1, 2).unwrap();

    let mut admin = TestDevice::start(
        test_config(base, 3),
        MockMediaEngine::new(),
        vec![localhost(star_b, true), localhost(star_c, true)],
    );
    let mut b = TestDevice::start(test_config(base, 3), MockMediaEngine::new(), vec![localhost(star_b, false)]);
    let mut c = TestDevice::start(test_config(base, 3), MockMediaEngine::new(), vec![localhost(star_c, false)]);

    admin.wait_for_mesh(2).await.expect("admin should see both joiners");
    b.wait_for_mesh(2).await.expect("b should link to admin and c");
    c.wait_for_mesh(2).await.expect("c should link to admin and b");

    let admin_to_c = admin
        .snapshot()
        .await
        .sessions
        .iter()
        .find(|s| s.descriptor.port == star_c)
        .map(|s| s.peer_id)
        .expect("admin should hold a session to c");
    let b_to_c = b
        .snapshot()
        .await
        .sessions
        .iter()
        .find(|s| s.descriptor.port == mesh)
        .map(|s| s.peer_id)
        .expect("b should hold a mesh session to c");
    let admin_before = offers_from(&admin, admin_to_c).await;
    let b_before = offers_from(&b, b_to_c).await;

    c.handle.take_director().await.expect("c should take the director role");
    c.wait_for(
        |e| matches!(e, RoomEvent::SegmentStarted(segment) if segment.is_local()),
        EVENT_TIMEOUT_MS,
    )
    .await
    .expect("c should start a local segment");

    for (device, peer_id, before) in [(&admin, admin_to_c, admin_before), (&b, b_to_c, b_before)] {
        let start = std::time::Instant::now();
        while offers_from(device, peer_id).await < before + 1 {
            assert!(
                start.elapsed() < Duration::from_millis(ESTABLISH_TIMEOUT_MS),
                "every old peer should receive a re-offer"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    c.wait_until(|s| s.sharing && s.sharing_sessions() == 2, EVENT_TIMEOUT_MS)
        .await
        .expect("c should share video on both links");
    tokio::time::sleep(Duration::from_millis(300)).await;

    // One re-offer per old peer, no more.
    assert_eq!(offers_from(&admin, admin_to_c).await, admin_before + 1);
    assert_eq!(offers_from(&b, b_to_c).await, b_before + 1);
    assert!(matches!(c.handle.take_director().await, Err(MeshError::AlreadyDirector)));

    let admin_view = admin.snapshot().await;
    assert!(!admin_view.sharing);
    assert_eq!(admin_view.sharing_sessions(), 0);
    assert_eq!(admin_view.director, Director::Remote(admin_to_c));
    let b_view = b.snapshot().await;
    assert!(!b_view.sharing);
    assert_eq!(b_view.director, Director::Remote(b_to_c));

    admin.handle.dispose().await;
    let closed = admin
        .wait_for(|e| matches!(e, RoomEvent::Closed { .. }), EVENT_TIMEOUT_MS)
        .await
        .expect("admin should close");
    let RoomEvent::Closed { segments } = closed else {
        unreachable!();
    };
    assert_eq!(segments.len(), 2, "admin directed, then followed c");
    assert!(segments[0].is_local());
    assert_eq!(segments[1].source, Director::Remote(admin_to_c));
    assert!(segments.iter().all(|s| s.length.is_some()));

    b.handle.dispose().await;
    c.handle.dispose().await;
}
