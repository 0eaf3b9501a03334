//! Scenario replay.
//!
//! A scenario is a JSON document holding an entity snapshot and an ordered
//! list of platform events:
//!
//! ```json
//! {
//!   "entities": { "networks": [...], "ports": [...], "trunks": [...] },
//!   "events": [
//!     { "event": "network_created", "network": { ... } },
//!     { "event": "port_bind", "port": { ... } },
//!     { "event": "port_deleted", "port_id": "p1" }
//!   ]
//! }
//! ```
//!
//! Each event first applies its change to the in-memory store, the way the
//! platform commits before notifying drivers, then dispatches to the driver.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use torsync_common::driver::MechanismDriver;
use torsync_common::error::DriverResult;
use torsync_common::model::{BindingStatus, Network, Port, RequestContext, Trunk};
use torsync_common::platform::{EntityStore, NetworkContext, PortContext};
use torsync_common::store::{EntitySnapshot, MemoryStore};
use tracing::{info, warn};

use crate::mech_driver::TorSyncDriver;

/// Errors loading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A platform event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    NetworkCreated { network: Network },
    NetworkDeleted { network_id: String },
    PortBind { port: Port },
    PortUpdated { port: Port },
    PortDeleted { port_id: String },
    SubportsChanged { trunk: Trunk },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::NetworkCreated { .. } => "network_created",
            Event::NetworkDeleted { .. } => "network_deleted",
            Event::PortBind { .. } => "port_bind",
            Event::PortUpdated { .. } => "port_updated",
            Event::PortDeleted { .. } => "port_deleted",
            Event::SubportsChanged { .. } => "subports_changed",
        }
    }
}

/// Initial entities plus the events to replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub entities: EntitySnapshot,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(contents)?)
    }
}

/// Result of one replayed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// A bind request the driver declined.
    Declined,
    /// The event referenced an entity missing from the store.
    Skipped { reason: String },
    Failed { fatal: bool, error: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventReport {
    pub index: usize,
    pub event: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Replays events against a store and driver.
pub struct Replayer {
    store: Arc<MemoryStore>,
    driver: TorSyncDriver,
}

impl Replayer {
    pub fn new(store: Arc<MemoryStore>, driver: TorSyncDriver) -> Self {
        Self { store, driver }
    }

    /// Replays every event in order. Failures are reported and do not stop
    /// the replay.
    pub async fn run(&self, events: Vec<Event>) -> Vec<EventReport> {
        let mut reports = Vec::with_capacity(events.len());
        for (index, event) in events.into_iter().enumerate() {
            let name = event.name();
            let outcome = self.replay(event).await;
            match &outcome {
                Outcome::Failed { fatal, error } => {
                    warn!(index, event = name, fatal, error = %error, "Event failed")
                }
                other => info!(index, event = name, outcome = ?other, "Event replayed"),
            }
            reports.push(EventReport {
                index,
                event: name,
                outcome,
            });
        }
        reports
    }

    async fn replay(&self, event: Event) -> Outcome {
        let request = RequestContext::new();
        match event {
            Event::NetworkCreated { network } => {
                self.store.insert_network(network.clone());
                let ctx = NetworkContext::new(network, request);
                outcome(self.driver.on_network_created(&ctx).await)
            }
            Event::NetworkDeleted { network_id } => {
                let Some(network) = self.store.remove_network(&network_id) else {
                    return skipped(format!("network '{}' not found", network_id));
                };
                let ctx = NetworkContext::new(network, request);
                outcome(self.driver.on_network_deleted(&ctx).await)
            }
            Event::PortBind { port } => {
                self.store.insert_port(port.clone());
                let ctx = self.port_context(port, request);
                match self.driver.on_port_bind_requested(&ctx).await {
                    Ok(true) => {
                        self.commit_binding(&ctx);
                        Outcome::Applied
                    }
                    Ok(false) => Outcome::Declined,
                    Err(e) => failed(e),
                }
            }
            Event::PortUpdated { port } => {
                let original = self.store.get_port(&request, &port.id);
                self.store.insert_port(port.clone());
                let mut ctx = self.port_context(port, request);
                ctx.original = original;
                outcome(self.driver.on_port_updated(&ctx).await)
            }
            Event::PortDeleted { port_id } => {
                let Some(port) = self.store.remove_port(&port_id) else {
                    return skipped(format!("port '{}' not found", port_id));
                };
                let ctx = self.port_context(port, request);
                outcome(self.driver.on_port_deleted(&ctx).await)
            }
            Event::SubportsChanged { trunk } => {
                let parent_port_id = trunk.port_id.clone();
                self.store.insert_trunk(trunk);
                outcome(
                    self.driver
                        .on_subports_changed(&parent_port_id, &request)
                        .await,
                )
            }
        }
    }

    /// Stores the VIF type the driver bound the port with, as the platform
    /// would on commit.
    fn commit_binding(&self, ctx: &PortContext) {
        let Some(bound) = ctx.bound_segment() else {
            return;
        };
        let mut port = ctx.current.clone();
        if let Some(binding) = port
            .bindings
            .iter_mut()
            .find(|b| b.status == BindingStatus::Active)
        {
            binding.vif_type = bound.vif_type;
        }
        self.store.insert_port(port);
    }

    fn port_context(&self, port: Port, request: RequestContext) -> PortContext {
        let network = self.store.get_network(&request, &port.network_id);
        let ctx = PortContext::new(port, request);
        match network {
            Some(network) => ctx.with_network(network),
            None => ctx,
        }
    }
}

fn outcome(result: DriverResult<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::Applied,
        Err(e) => failed(e),
    }
}

fn failed(e: torsync_common::error::DriverError) -> Outcome {
    Outcome::Failed {
        fatal: e.is_fatal(),
        error: e.to_string(),
    }
}

fn skipped(reason: String) -> Outcome {
    Outcome::Skipped { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use torsync_common::lock::MemoryLockService;
    use torsync_test::{FakeInventory, RecordingExecutor, SwitchCall, SwitchOp};

    const SCENARIO: &str = r#"
{
  "entities": {
    "networks": [
      {
        "id": "net-1",
        "segments": [
          {
            "id": "seg-1",
            "network_id": "net-1",
            "network_type": "vlan",
            "physical_network": "physnet1",
            "segmentation_id": 100
          }
        ]
      }
    ]
  },
  "events": [
    {
      "event": "port_bind",
      "port": {
        "id": "p1",
        "network_id": "net-1",
        "device_owner": "baremetal:none",
        "bindings": [
          {
            "host": "node-1",
            "vnic_type": "baremetal",
            "vif_type": "unbound",
            "status": "ACTIVE",
            "profile": {
              "local_link_information": [
                { "switch_info": "leaf-1", "port_id": "eth1" }
              ]
            }
          }
        ]
      }
    },
    { "event": "port_deleted", "port_id": "p1" },
    { "event": "port_deleted", "port_id": "p1" },
    { "event": "network_deleted", "network_id": "net-1" }
  ]
}
"#;

    fn replayer(store: Arc<MemoryStore>, executor: Arc<RecordingExecutor>) -> Replayer {
        let inventory = FakeInventory::new().with_host("leaf-1");
        let driver = TorSyncDriver::new(
            store.clone(),
            store.clone(),
            Arc::new(inventory),
            executor,
            Arc::new(MemoryLockService::new()),
        );
        Replayer::new(store, driver)
    }

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json_str(SCENARIO).unwrap();
        assert_eq!(scenario.entities.networks.len(), 1);
        assert_eq!(scenario.events.len(), 4);
        assert_eq!(scenario.events[0].name(), "port_bind");
        assert_eq!(
            scenario.events[1],
            Event::PortDeleted {
                port_id: "p1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_event() {
        let err = Scenario::from_json_str(r#"{ "events": [ { "event": "reboot" } ] }"#);
        assert!(matches!(err, Err(ScenarioError::Parse(_))));
    }

    #[tokio::test]
    async fn test_replay_scenario() {
        let scenario = Scenario::from_json_str(SCENARIO).unwrap();
        let store = Arc::new(MemoryStore::from_snapshot(scenario.entities));
        let executor = Arc::new(RecordingExecutor::new(["leaf-1"]));
        let reports = replayer(store.clone(), executor.clone())
            .run(scenario.events)
            .await;

        let outcomes: Vec<_> = reports.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Applied,
                Outcome::Applied,
                Outcome::Skipped {
                    reason: "port 'p1' not found".to_string()
                },
                Outcome::Applied,
            ]
        );
        assert_eq!(
            executor.calls(),
            vec![
                SwitchCall::ConfAccessPort {
                    switch: "leaf-1".to_string(),
                    port: "eth1".to_string(),
                    vlan: 100
                },
                SwitchCall::DeletePort {
                    switch: "leaf-1".to_string(),
                    port: "eth1".to_string()
                },
                SwitchCall::DeleteVlan {
                    switch: "leaf-1".to_string(),
                    vlan: 100
                },
            ]
        );
        assert_eq!(store.provisioning_blocks("p1"), vec!["TORSYNC"]);
    }

    #[tokio::test]
    async fn test_failure_reported_and_replay_continues() {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(RecordingExecutor::new(["leaf-1"]));
        executor.fail_on(None, Some(SwitchOp::CreateVlan));
        let network = torsync_test::vlan_network("net-1", "physnet1", 100);

        let reports = replayer(store, executor.clone())
            .run(vec![
                Event::NetworkCreated { network },
                Event::NetworkDeleted {
                    network_id: "net-1".to_string(),
                },
            ])
            .await;

        assert!(reports[0].outcome.is_failure());
        assert!(matches!(reports[0].outcome, Outcome::Failed { fatal: true, .. }));
        assert_eq!(reports[1].outcome, Outcome::Applied);
        assert_eq!(executor.count(SwitchOp::DeleteVlan), 1);
    }

    #[test]
    fn test_report_serialization() {
        let report = EventReport {
            index: 2,
            event: "port_bind",
            outcome: Outcome::Failed {
                fatal: false,
                error: "boom".to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index": 2,
                "event": "port_bind",
                "outcome": "failed",
                "fatal": false,
                "error": "boom"
            })
        );
    }
}
