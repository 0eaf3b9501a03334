//! End-to-end driver scenarios
//!
//! Drives [`TorSyncDriver`] through platform events against an in-memory
//! store, a fake inventory and a recording executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use torsync::TorSyncDriver;
use torsync_common::driver::MechanismDriver;
use torsync_common::error::DriverError;
use torsync_common::lock::MemoryLockService;
use torsync_common::model::{Port, RequestContext, SwitchTarget};
use torsync_common::platform::{NetworkContext, PortContext};
use torsync_common::store::MemoryStore;
use torsync_test::{
    trunk, vlan_network, FakeInventory, PortBuilder, RecordingExecutor, SwitchCall, SwitchOp,
    PHYSNET,
};

struct Fixture {
    store: Arc<MemoryStore>,
    executor: Arc<RecordingExecutor>,
    locks: Arc<MemoryLockService>,
    driver: TorSyncDriver,
}

impl Fixture {
    fn new(inventory: FakeInventory, executor: RecordingExecutor) -> Self {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(executor);
        let locks = Arc::new(MemoryLockService::new());
        let driver = TorSyncDriver::new(
            store.clone(),
            store.clone(),
            Arc::new(inventory),
            executor.clone(),
            locks.clone(),
        );
        Self {
            store,
            executor,
            locks,
            driver,
        }
    }

    fn port_ctx(&self, port: Port) -> PortContext {
        let network = vlan_network(&port.network_id, PHYSNET, 100);
        PortContext::new(port, RequestContext::new()).with_network(network)
    }
}

fn leaf_inventory() -> FakeInventory {
    FakeInventory::new()
        .with_host("leaf-1")
        .with_host("leaf-2")
        .with_mapping("compute-1", None, &[("leaf-1", "eth5")])
}

fn default_fixture() -> Fixture {
    let fixture = Fixture::new(
        leaf_inventory(),
        RecordingExecutor::new(["leaf-1", "leaf-2"]),
    );
    fixture.store.insert_network(vlan_network("net-1", PHYSNET, 100));
    fixture
}

#[tokio::test]
async fn test_resolution_preserves_link_order() {
    let fixture = default_fixture();
    let port = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-2", "eth3")
        .with_link("leaf-1", "eth1")
        .build();

    let resolution = fixture
        .driver
        .reconciler()
        .resolver()
        .resolve(&port, None)
        .unwrap();
    assert_eq!(
        resolution.targets,
        vec![
            SwitchTarget::new("leaf-2", "eth3"),
            SwitchTarget::new("leaf-1", "eth1")
        ]
    );
}

#[tokio::test]
async fn test_empty_link_info_rejected() {
    let fixture = default_fixture();
    let port = PortBuilder::baremetal("p1", "net-1")
        .with_empty_link_info()
        .build();
    fixture.store.insert_port(port.clone());

    let err = fixture
        .driver
        .on_port_bind_requested(&fixture.port_ctx(port))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::LocalLinkInfoMissing { .. }));
    assert!(fixture.executor.calls().is_empty());
}

#[tokio::test]
async fn test_baremetal_empty_port_id_fails_before_switch_changes() {
    let fixture = default_fixture();
    let port = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-1", "eth1")
        .with_link("leaf-2", "")
        .build();
    fixture.store.insert_port(port.clone());

    let err = fixture
        .driver
        .on_port_bind_requested(&fixture.port_ctx(port))
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::LocalLinkInfoMissing { .. }));
    assert!(fixture.executor.calls().is_empty());
    assert!(fixture.locks.is_empty());
}

#[tokio::test]
async fn test_bind_is_idempotent() {
    let fixture = default_fixture();
    let port = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-1", "eth1")
        .build();
    fixture.store.insert_port(port.clone());

    for _ in 0..2 {
        let bound = fixture
            .driver
            .on_port_bind_requested(&fixture.port_ctx(port.clone()))
            .await
            .unwrap();
        assert!(bound);
    }

    let access = SwitchCall::ConfAccessPort {
        switch: "leaf-1".to_string(),
        port: "eth1".to_string(),
        vlan: 100,
    };
    assert_eq!(fixture.executor.calls(), vec![access.clone(), access]);
    assert!(fixture.locks.is_empty());
}

#[tokio::test]
async fn test_create_vlan_once_on_managing_host() {
    let fixture = Fixture::new(
        FakeInventory::new()
            .with_host("leaf-1")
            .with_unmanaged_host("leaf-2"),
        RecordingExecutor::new(["leaf-1", "leaf-2"]),
    );
    let network = vlan_network("net-1", PHYSNET, 100);
    fixture.store.insert_network(network.clone());

    fixture
        .driver
        .on_network_created(&NetworkContext::new(network, RequestContext::new()))
        .await
        .unwrap();
    assert_eq!(
        fixture.executor.calls(),
        vec![SwitchCall::CreateVlan {
            switch: "leaf-1".to_string(),
            vlan: 100
        }]
    );
}

#[tokio::test]
async fn test_network_delete_skipped_for_live_segmentation_id() {
    let fixture = default_fixture();
    fixture.store.insert_network(vlan_network("net-2", PHYSNET, 100));

    fixture
        .driver
        .on_network_deleted(&NetworkContext::new(
            vlan_network("net-1", PHYSNET, 100),
            RequestContext::new(),
        ))
        .await
        .unwrap();
    assert_eq!(fixture.executor.count(SwitchOp::DeleteVlan), 0);
}

#[tokio::test]
async fn test_shared_vlan_kept_while_another_port_uses_it() {
    let fixture = default_fixture();
    let vm1 = PortBuilder::normal("vm-1", "net-1", "compute-1").build();
    let vm2 = PortBuilder::normal("vm-2", "net-1", "compute-1").build();
    fixture.store.insert_port(vm2);

    fixture
        .driver
        .on_port_deleted(&fixture.port_ctx(vm1))
        .await
        .unwrap();
    assert_eq!(fixture.executor.count(SwitchOp::DeleteTrunkVlan), 0);
    assert_eq!(fixture.executor.count(SwitchOp::DeletePort), 0);

    let vm2 = fixture.store.remove_port("vm-2").unwrap();
    fixture
        .driver
        .on_port_deleted(&fixture.port_ctx(vm2))
        .await
        .unwrap();
    assert_eq!(
        fixture.executor.calls(),
        vec![SwitchCall::DeleteTrunkVlan {
            switch: "leaf-1".to_string(),
            port: "eth5".to_string(),
            vlan: 100
        }]
    );
}

#[tokio::test]
async fn test_baremetal_detached_port_teardown() {
    let fixture = default_fixture();
    let original = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-1", "eth1")
        .build();
    fixture.store.insert_port(
        PortBuilder::baremetal("p2", "net-1")
            .with_link("leaf-1", "eth1")
            .build(),
    );
    let current = PortBuilder::baremetal("p1", "net-1").unbound().build();
    fixture.store.insert_port(current.clone());

    // Update-driven unbind of p1 while p2 still sits on leaf-1/eth1.
    let ctx = fixture.port_ctx(current).with_original(original);
    fixture.driver.on_port_updated(&ctx).await.unwrap();

    // Unbinding is a delete, so the exclusive port is torn down.
    assert_eq!(fixture.executor.count(SwitchOp::DeletePort), 1);
    fixture.executor.clear();

    // A stale non-delete reconcile of the detached port leaves it alone.
    let stale = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-1", "eth1")
        .build();
    let op = torsync::EnsurePort::new(SwitchTarget::new("leaf-1", "eth1"))
        .with_segment(Some(PHYSNET), Some(100));
    fixture
        .driver
        .reconciler()
        .ensure_port(&stale, &RequestContext::new(), &op, None)
        .await
        .unwrap();
    assert!(fixture.executor.calls().is_empty());
}

#[tokio::test]
async fn test_trunk_parent_configured_as_trunk() {
    let fixture = default_fixture();
    let parent = PortBuilder::baremetal("parent", "net-1")
        .with_link("leaf-1", "eth1")
        .build();
    fixture.store.insert_port(parent.clone());
    fixture
        .store
        .insert_trunk(trunk("t1", "parent", &[("sp-1", 300), ("sp-2", 200), ("sp-3", 300)]));

    fixture
        .driver
        .on_port_bind_requested(&fixture.port_ctx(parent))
        .await
        .unwrap();
    assert_eq!(
        fixture.executor.calls(),
        vec![SwitchCall::ConfTrunkPort {
            switch: "leaf-1".to_string(),
            port: "eth1".to_string(),
            native: 100,
            tagged: vec![300, 200],
        }]
    );
    assert_eq!(fixture.executor.count(SwitchOp::ConfAccessPort), 0);
}

#[tokio::test]
async fn test_subport_change_reapplies_trunk() {
    let fixture = default_fixture();
    fixture.store.insert_port(
        PortBuilder::baremetal("parent", "net-1")
            .with_link("leaf-1", "eth1")
            .build(),
    );
    fixture
        .store
        .insert_trunk(trunk("t1", "parent", &[("sp-1", 200)]));

    let request = RequestContext::new();
    fixture
        .driver
        .on_subports_changed("parent", &request)
        .await
        .unwrap();
    fixture
        .store
        .insert_trunk(trunk("t1", "parent", &[("sp-1", 200), ("sp-2", 201)]));
    fixture
        .driver
        .on_subports_changed("parent", &request)
        .await
        .unwrap();

    let tagged: Vec<Vec<u16>> = fixture
        .executor
        .calls_of(SwitchOp::ConfTrunkPort)
        .into_iter()
        .map(|call| match call {
            SwitchCall::ConfTrunkPort { tagged, .. } => tagged,
            other => panic!("unexpected call {:?}", other),
        })
        .collect();
    assert_eq!(tagged, vec![vec![200], vec![200, 201]]);

    fixture
        .driver
        .on_subports_changed("missing", &request)
        .await
        .unwrap();
    assert_eq!(fixture.executor.count(SwitchOp::ConfTrunkPort), 2);
}

#[tokio::test]
async fn test_configuration_failure_is_not_fatal() {
    let fixture = default_fixture();
    fixture
        .executor
        .fail_on(Some("leaf-1"), Some(SwitchOp::ConfAccessPort));
    let port = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-1", "eth1")
        .build();
    fixture.store.insert_port(port.clone());

    let ctx = fixture.port_ctx(port);
    let err = fixture.driver.on_port_bind_requested(&ctx).await.unwrap_err();
    assert!(matches!(err, DriverError::Configuration { .. }));
    assert!(!err.is_fatal());
    assert!(ctx.bound_segment().is_none());
    assert!(fixture.locks.is_empty());
}

#[tokio::test]
async fn test_same_port_reconciliations_serialized() {
    let delay = Duration::from_millis(50);
    let fixture = Fixture::new(
        leaf_inventory(),
        RecordingExecutor::new(["leaf-1", "leaf-2"]).with_delay(delay),
    );
    fixture.store.insert_network(vlan_network("net-1", PHYSNET, 100));
    let port = PortBuilder::baremetal("p1", "net-1")
        .with_link("leaf-1", "eth1")
        .build();
    fixture.store.insert_port(port.clone());

    let ctx_a = fixture.port_ctx(port.clone());
    let ctx_b = fixture.port_ctx(port);
    let started = Instant::now();
    let (a, b) = tokio::join!(
        fixture.driver.on_port_bind_requested(&ctx_a),
        fixture.driver.on_port_bind_requested(&ctx_b)
    );
    assert!(a.unwrap());
    assert!(b.unwrap());
    assert!(started.elapsed() >= delay * 2);
    assert_eq!(fixture.executor.count(SwitchOp::ConfAccessPort), 2);
    assert!(fixture.locks.is_empty());
}

#[tokio::test]
async fn test_vm_port_lifecycle() {
    let fixture = default_fixture();
    let bound = PortBuilder::normal("vm-1", "net-1", "compute-1").build();
    fixture.store.insert_port(bound.clone());

    let ctx = fixture.port_ctx(bound.clone()).with_original(bound.clone());
    fixture.driver.on_port_updated(&ctx).await.unwrap();
    assert_eq!(
        fixture.store.completed_provisioning(),
        vec![("vm-1".to_string(), "TORSYNC".to_string())]
    );

    let unbound = PortBuilder::normal("vm-1", "net-1", "compute-1")
        .unbound()
        .build();
    fixture.store.insert_port(unbound.clone());
    let ctx = fixture.port_ctx(unbound).with_original(bound);
    fixture.driver.on_port_updated(&ctx).await.unwrap();

    assert_eq!(
        fixture.executor.calls(),
        vec![
            SwitchCall::AddTrunkVlan {
                switch: "leaf-1".to_string(),
                port: "eth5".to_string(),
                vlan: 100
            },
            SwitchCall::DeleteTrunkVlan {
                switch: "leaf-1".to_string(),
                port: "eth5".to_string(),
                vlan: 100
            },
        ]
    );
}
