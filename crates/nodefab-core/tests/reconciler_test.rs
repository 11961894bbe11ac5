//! Integration tests for `Reconciler` driven directly against the
//! in-memory driver and store.
//!
//! Each test plays the event chain by hand: run a bootstrap pass, flip
//! the simulated switch, run the next pass, and assert on the driver's
//! operation log.
#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use nodefab_core::{
    BootstrapConfig, INTEGRATION_BRIDGE, MemoryNodeStore, NodeRecord, NodeState, NodeStore,
    Reconciler, StaticGate,
};
use nodefab_driver::{DriverOp, MemoryDriver, SwitchDriver};

// ── Helpers ─────────────────────────────────────────────────────────

const MGMT: IpAddr = IpAddr::V4(Ipv4Addr::new(172, 16, 0, 11));
const DATA: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 11));
const MEMBERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(10, 10, 0, 2)),
    IpAddr::V4(Ipv4Addr::new(10, 10, 0, 3)),
];

fn setup() -> (Arc<MemoryDriver>, Arc<MemoryNodeStore>, Reconciler) {
    let driver = Arc::new(MemoryDriver::new());
    let store = Arc::new(MemoryNodeStore::new());
    let reconciler = Reconciler::new(
        driver.clone(),
        store.clone(),
        Arc::new(StaticGate::leader(MEMBERS.to_vec())),
        BootstrapConfig::default(),
    );
    (driver, store, reconciler)
}

/// Fetch the current record for `hostname`, run one bootstrap pass, and
/// return the record the pass left behind.
async fn step(reconciler: &Reconciler, store: &MemoryNodeStore, hostname: &str) -> NodeRecord {
    let node = store.node_by_hostname(hostname).await.unwrap();
    reconciler.bootstrap(&node).await.unwrap();
    store.node_by_hostname(hostname).await.unwrap()
}

/// Run bootstrap passes until `hostname` reaches `COMPLETE`, mimicking
/// the event chain that re-invokes the reconciler after every driver
/// action. Panics if the node stops converging.
async fn converge(reconciler: &Reconciler, store: &MemoryNodeStore, hostname: &str) -> NodeRecord {
    for _ in 0..8 {
        let node = store.node_by_hostname(hostname).await.unwrap();
        if node.state == NodeState::Complete {
            return node;
        }
        reconciler.bootstrap(&node).await.unwrap();
    }
    panic!("{hostname} failed to reach COMPLETE");
}

// ── Forward path ────────────────────────────────────────────────────

#[tokio::test]
async fn test_bootstrap_walks_a_node_to_complete() {
    let (driver, store, reconciler) = setup();
    let node = NodeRecord::new("worker-1", MGMT, Some(DATA));
    store.create_node(node.clone()).await.unwrap();

    // INIT, channel down: the pass dials and stops.
    let after = step(&reconciler, &store, "worker-1").await;
    assert_eq!(after.state, NodeState::Init);
    assert_eq!(
        driver.take_operations(),
        vec![DriverOp::Connect {
            management: MGMT,
            port: 6640,
        }]
    );

    // Channel up: the next pass creates the integration bridge.
    driver.open_channel(MGMT);
    let after = step(&reconciler, &store, "worker-1").await;
    assert_eq!(after.state, NodeState::Init);
    assert_eq!(
        driver.take_operations(),
        vec![DriverOp::CreateBridge {
            channel: node.switch_device.clone(),
            name: INTEGRATION_BRIDGE.to_owned(),
        }]
    );

    // Bridge available: INIT is done, advance without touching the
    // switch.
    let after = step(&reconciler, &store, "worker-1").await;
    assert_eq!(after.state, NodeState::DeviceCreated);
    assert!(driver.take_operations().is_empty());

    // DEVICE_CREATED: one tunnel interface per kind, in order.
    let after = step(&reconciler, &store, "worker-1").await;
    assert_eq!(after.state, NodeState::DeviceCreated);
    let interfaces: Vec<String> = driver
        .take_operations()
        .into_iter()
        .map(|op| match op {
            DriverOp::AddTunnel { interface, .. } => interface,
            other => panic!("unexpected driver call: {other:?}"),
        })
        .collect();
    assert_eq!(interfaces, vec!["vxlan", "gre", "geneve"]);

    // All interfaces enabled: DEVICE_CREATED is done, advance.
    let after = step(&reconciler, &store, "worker-1").await;
    assert_eq!(after.state, NodeState::Complete);
    assert!(driver.take_operations().is_empty());

    // COMPLETE is a resting state; further passes change nothing.
    let after = step(&reconciler, &store, "worker-1").await;
    assert_eq!(after.state, NodeState::Complete);
    assert!(driver.take_operations().is_empty());

    assert_eq!(driver.bridge_count(), 1);
    let mut ports = driver.port_names(&node.integration_bridge);
    ports.sort();
    assert_eq!(ports, vec!["geneve", "gre", "vxlan"]);
}

#[tokio::test]
async fn test_node_without_data_address_completes_without_tunnels() {
    let (driver, store, reconciler) = setup();
    store
        .create_node(NodeRecord::new("gateway-1", MGMT, None))
        .await
        .unwrap();
    driver.open_channel(MGMT);

    let node = converge(&reconciler, &store, "gateway-1").await;
    assert_eq!(node.state, NodeState::Complete);

    assert!(
        driver
            .operations()
            .iter()
            .all(|op| !matches!(op, DriverOp::AddTunnel { .. }))
    );
    assert!(driver.port_names(&node.integration_bridge).is_empty());
}

// ── Idempotence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_replayed_bootstrap_adds_nothing() {
    let (driver, store, reconciler) = setup();
    store
        .create_node(NodeRecord::new("worker-1", MGMT, Some(DATA)))
        .await
        .unwrap();
    driver.open_channel(MGMT);
    let node = converge(&reconciler, &store, "worker-1").await;

    // Converged: every further pass is a read-only no-op.
    driver.take_operations();
    for _ in 0..3 {
        reconciler.bootstrap(&node).await.unwrap();
    }
    assert!(driver.operations().is_empty());
    assert_eq!(driver.bridge_count(), 1);
}

#[tokio::test]
async fn test_interrupted_provisioning_resumes_without_duplicates() {
    let (driver, store, reconciler) = setup();
    store
        .create_node(NodeRecord::new("worker-1", MGMT, Some(DATA)))
        .await
        .unwrap();
    driver.open_channel(MGMT);

    // First pass creates the bridge, then the process "restarts": a
    // fresh reconciler with no memory of the first one's progress.
    let node = store.node_by_hostname("worker-1").await.unwrap();
    reconciler.bootstrap(&node).await.unwrap();
    drop(reconciler);

    let reconciler = Reconciler::new(
        driver.clone(),
        store.clone(),
        Arc::new(StaticGate::leader(MEMBERS.to_vec())),
        BootstrapConfig::default(),
    );
    let node = converge(&reconciler, &store, "worker-1").await;
    assert_eq!(node.state, NodeState::Complete);

    // Completion is read from the live switch, so the bridge from
    // before the restart is found rather than recreated.
    let creates = driver
        .operations()
        .iter()
        .filter(|op| matches!(op, DriverOp::CreateBridge { .. }))
        .count();
    assert_eq!(creates, 1);
}

// ── Completion predicates ───────────────────────────────────────────

#[tokio::test]
async fn test_init_completion_needs_channel_and_bridge() {
    let (driver, store, reconciler) = setup();
    let node = NodeRecord::new("worker-1", MGMT, Some(DATA));
    store.create_node(node.clone()).await.unwrap();

    assert!(!reconciler.state_complete(&node).await);

    driver.open_channel(MGMT);
    reconciler.bootstrap(&node).await.unwrap();
    assert!(reconciler.state_complete(&node).await);

    // Bridge still present but the channel dropped: INIT is not done.
    driver.close_channel(&node.switch_device);
    assert!(!reconciler.state_complete(&node).await);
}

#[tokio::test]
async fn test_tunnel_completion_needs_an_available_bridge() {
    let (driver, store, reconciler) = setup();
    store
        .create_node(NodeRecord::new("worker-1", MGMT, Some(DATA)))
        .await
        .unwrap();
    driver.open_channel(MGMT);
    let node = converge(&reconciler, &store, "worker-1").await;

    let rewound = node.with_state(NodeState::DeviceCreated);
    assert!(reconciler.state_complete(&rewound).await);

    // The ports are still configured, but an unavailable bridge makes
    // every interface read as disabled.
    driver.set_bridge_available(&node.integration_bridge, false);
    assert!(!reconciler.state_complete(&rewound).await);
}

// ── Error containment ───────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_tunnel_adds_leave_state_untouched() {
    let (driver, store, reconciler) = setup();
    let node = NodeRecord::new("worker-1", MGMT, Some(DATA));
    store.create_node(node.clone()).await.unwrap();
    store
        .update_node(node.with_state(NodeState::DeviceCreated))
        .await
        .unwrap();

    // Live channel, but the integration bridge was never created: every
    // tunnel add fails with an unknown-bridge rejection.
    driver.open_channel(MGMT);
    let parked = store.node_by_hostname("worker-1").await.unwrap();
    reconciler.bootstrap(&parked).await.unwrap();

    let adds = driver
        .operations()
        .iter()
        .filter(|op| matches!(op, DriverOp::AddTunnel { .. }))
        .count();
    assert_eq!(adds, 3);

    let after = store.node_by_hostname("worker-1").await.unwrap();
    assert_eq!(after.state, NodeState::DeviceCreated);
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_teardown_drops_bridge_then_disconnects() {
    let (driver, store, reconciler) = setup();
    store
        .create_node(NodeRecord::new("worker-1", MGMT, Some(DATA)))
        .await
        .unwrap();
    driver.open_channel(MGMT);
    let node = converge(&reconciler, &store, "worker-1").await;

    driver.take_operations();
    reconciler.teardown(&node).await;

    assert_eq!(
        driver.take_operations(),
        vec![
            DriverOp::DropBridge {
                channel: node.switch_device.clone(),
                name: INTEGRATION_BRIDGE.to_owned(),
            },
            DriverOp::Disconnect {
                channel: node.switch_device.clone(),
            },
        ]
    );
    assert_eq!(driver.bridge_count(), 0);
    assert!(!driver.is_connected(&node.switch_device).await);
}

#[tokio::test]
async fn test_teardown_disconnects_even_when_the_drop_fails() {
    let (driver, store, reconciler) = setup();
    store
        .create_node(NodeRecord::new("worker-1", MGMT, Some(DATA)))
        .await
        .unwrap();
    driver.open_channel(MGMT);
    let node = converge(&reconciler, &store, "worker-1").await;

    driver.take_operations();
    driver.refuse_bridge_drops();
    reconciler.teardown(&node).await;

    // The failed drop is logged and skipped; the channel still closes.
    assert_eq!(
        driver.take_operations(),
        vec![
            DriverOp::DropBridge {
                channel: node.switch_device.clone(),
                name: INTEGRATION_BRIDGE.to_owned(),
            },
            DriverOp::Disconnect {
                channel: node.switch_device.clone(),
            },
        ]
    );
    assert_eq!(driver.bridge_count(), 1);
    assert!(!driver.is_connected(&node.switch_device).await);
}

#[tokio::test]
async fn test_teardown_without_channel_touches_nothing() {
    let (driver, store, reconciler) = setup();
    let node = NodeRecord::new("worker-1", MGMT, Some(DATA));
    store.create_node(node.clone()).await.unwrap();

    reconciler.teardown(&node).await;
    assert!(driver.operations().is_empty());
}
