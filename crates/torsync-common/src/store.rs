//! In-memory entity store.
//!
//! Backs the replay tool and tests. Entities are keyed by id and listed in
//! id order so scans are deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::model::{Network, NetworkSegment, Port, RequestContext, Trunk};
use crate::platform::{EntityStore, Provisioning};

/// Serializable set of platform entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub trunks: Vec<Trunk>,
}

#[derive(Debug, Default)]
struct StoreState {
    networks: BTreeMap<String, Network>,
    ports: BTreeMap<String, Port>,
    trunks: BTreeMap<String, Trunk>,
    blocks: BTreeMap<String, BTreeSet<String>>,
    completed: Vec<(String, String)>,
}

/// Thread-safe in-memory [`EntityStore`] and [`Provisioning`] sink.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the entities of a snapshot.
    pub fn from_snapshot(snapshot: EntitySnapshot) -> Self {
        let store = Self::new();
        store.load(snapshot);
        store
    }

    /// Inserts (or replaces) every entity of the snapshot.
    pub fn load(&self, snapshot: EntitySnapshot) {
        let mut state = self.write();
        for network in snapshot.networks {
            state.networks.insert(network.id.clone(), network);
        }
        for port in snapshot.ports {
            state.ports.insert(port.id.clone(), port);
        }
        for trunk in snapshot.trunks {
            state.trunks.insert(trunk.id.clone(), trunk);
        }
    }

    pub fn insert_network(&self, network: Network) {
        self.write().networks.insert(network.id.clone(), network);
    }

    pub fn remove_network(&self, network_id: &str) -> Option<Network> {
        self.write().networks.remove(network_id)
    }

    pub fn insert_port(&self, port: Port) {
        self.write().ports.insert(port.id.clone(), port);
    }

    pub fn remove_port(&self, port_id: &str) -> Option<Port> {
        self.write().ports.remove(port_id)
    }

    pub fn insert_trunk(&self, trunk: Trunk) {
        self.write().trunks.insert(trunk.id.clone(), trunk);
    }

    pub fn remove_trunk(&self, trunk_id: &str) -> Option<Trunk> {
        self.write().trunks.remove(trunk_id)
    }

    /// Entities holding a provisioning block on the port.
    pub fn provisioning_blocks(&self, port_id: &str) -> Vec<String> {
        self.read()
            .blocks
            .get(port_id)
            .map(|entities| entities.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `(port_id, entity)` pairs reported complete, in call order.
    pub fn completed_provisioning(&self) -> Vec<(String, String)> {
        self.read().completed.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EntityStore for MemoryStore {
    fn get_port(&self, _ctx: &RequestContext, port_id: &str) -> Option<Port> {
        self.read().ports.get(port_id).cloned()
    }

    fn list_ports(&self, _ctx: &RequestContext) -> Vec<Port> {
        self.read().ports.values().cloned().collect()
    }

    fn get_network(&self, _ctx: &RequestContext, network_id: &str) -> Option<Network> {
        self.read().networks.get(network_id).cloned()
    }

    fn list_segments(
        &self,
        _ctx: &RequestContext,
        physical_network: Option<&str>,
    ) -> Vec<NetworkSegment> {
        self.read()
            .networks
            .values()
            .flat_map(|n| n.segments.iter())
            .filter(|s| s.physical_network.as_deref() == physical_network)
            .cloned()
            .collect()
    }

    fn get_trunk_by_parent(&self, _ctx: &RequestContext, port_id: &str) -> Option<Trunk> {
        self.read()
            .trunks
            .values()
            .find(|t| t.port_id == port_id)
            .cloned()
    }
}

impl Provisioning for MemoryStore {
    fn add_provisioning_block(&self, _ctx: &RequestContext, port_id: &str, entity: &str) {
        self.write()
            .blocks
            .entry(port_id.to_string())
            .or_default()
            .insert(entity.to_string());
    }

    fn provisioning_complete(&self, _ctx: &RequestContext, port_id: &str, entity: &str) {
        let mut state = self.write();
        if let Some(entities) = state.blocks.get_mut(port_id) {
            entities.remove(entity);
            if entities.is_empty() {
                state.blocks.remove(port_id);
            }
        }
        state
            .completed
            .push((port_id.to_string(), entity.to_string()));
    }
}
