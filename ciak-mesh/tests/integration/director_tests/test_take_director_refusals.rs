use std::time::Duration;

use ciak_mesh::MeshError;

use crate::integration::{create_test_pair_with, init_tracing};
use crate::utils::{EVENT_TIMEOUT_MS, MockMediaEngine};

#[tokio::test]
async fn test_take_director_refusals() {
    init_tracing();

    let (mut admin, mut joiner) = create_test_pair_with(
        51700,
        MockMediaEngine::with_answer_delay(Duration::from_millis(1000)),
        MockMediaEngine::new(),
    );

    admin.wait_for_mesh(1).await.expect("admin should reach the mesh");
    joiner.wait_for_mesh(1).await.expect("joiner should reach the mesh");

    let already = admin.handle.take_director().await;
    assert!(matches!(already, Err(MeshError::AlreadyDirector)));

    joiner.handle.take_director().await.expect("first handoff should start");

    // The admin holds its answer back, so the renegotiation is still open.
    let second = joiner.handle.take_director().await;
    assert!(matches!(second, Err(MeshError::HandoffInProgress)));

    joiner
        .wait_until(|s| s.sharing && s.sharing_sessions() == 1, EVENT_TIMEOUT_MS)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let settled = joiner.handle.take_director().await;
    assert!(matches!(settled, Err(MeshError::AlreadyDirector)));

    // At most one device directs at any time.
    let admin_view = admin.snapshot().await;
    let joiner_view = joiner.snapshot().await;
    assert!(!(admin_view.sharing && joiner_view.sharing));

    joiner.handle.dispose().await;
    let closed = joiner.handle.take_director().await;
    assert!(matches!(closed, Err(MeshError::RoomClosed)));

    admin.handle.dispose().await;
}
