use ciak_core::{Director, PortPlan};
use ciak_mesh::NegotiationState;

use crate::integration::init_tracing;
use crate::utils::{MockMediaEngine, TestDevice, localhost, test_config};

#[tokio::test]
async fn test_three_devices_form_mesh() {
    init_tracing();

    let base = 51400;
    let plan = PortPlan::new(base, 3);
    let star_b = plan.star_port(1).unwrap();
    let star_c = plan.star_port(2).unwrap();

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

    let mesh = plan.mesh_port(1, 2).unwrap();

    let b_view = b.snapshot().await;
    assert_eq!(b_view.sessions.len(), 2);
    assert_eq!(b_view.established(), 2);
    // The earlier joiner listens on the pair's mesh port.
    let b_to_c = b_view
        .sessions
        .iter()
        .find(|s| s.descriptor.port == mesh)
        .expect("b should hold a mesh session");
    assert!(b_to_c.descriptor.is_initiator);

    let c_view = c.snapshot().await;
    assert_eq!(c_view.sessions.len(), 2);
    let c_to_b = c_view
        .sessions
        .iter()
        .find(|s| s.descriptor.port == mesh)
        .expect("c should hold a mesh session");
    assert!(!c_to_b.descriptor.is_initiator);
    assert_eq!(c_to_b.state, NegotiationState::Established);

    // Only the admin directs; every joiner sees it as remote.
    let admin_view = admin.snapshot().await;
    assert!(admin_view.sharing);
    assert_eq!(admin_view.director, Director::Local);
    assert_eq!(admin_view.sharing_sessions(), 2);
    for view in [&b_view, &c_view] {
        assert!(!view.sharing);
        assert_eq!(view.sharing_sessions(), 0);
        assert!(matches!(view.director, Director::Remote(_)));
    }

    for device in [&admin, &b, &c] {
        device.handle.dispose().await;
    }
}
