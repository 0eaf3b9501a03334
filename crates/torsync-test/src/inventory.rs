//! Fake inventory provider

use std::collections::{BTreeMap, HashMap};

use torsync_common::inventory::{host_mapping_key, Inventory};
use torsync_common::model::SwitchTarget;

#[derive(Debug, Clone)]
struct FakeHost {
    manage_vlans: bool,
    physical_networks: Vec<String>,
}

/// Inventory built in code for tests.
#[derive(Debug, Clone, Default)]
pub struct FakeInventory {
    hosts: BTreeMap<String, FakeHost>,
    mappings: HashMap<String, Vec<SwitchTarget>>,
    aliases: HashMap<String, String>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a VLAN-managing switch carrying every physical network.
    pub fn with_host(self, name: &str) -> Self {
        self.with_host_config(name, true, &[])
    }

    /// Adds a switch whose VLANs are not managed by the driver.
    pub fn with_unmanaged_host(self, name: &str) -> Self {
        self.with_host_config(name, false, &[])
    }

    /// Adds a switch restricted to the given physical networks.
    pub fn with_host_config(mut self, name: &str, manage_vlans: bool, physnets: &[&str]) -> Self {
        self.hosts.insert(
            name.to_string(),
            FakeHost {
                manage_vlans,
                physical_networks: physnets.iter().map(|p| p.to_string()).collect(),
            },
        );
        self
    }

    /// Maps a compute host (and optional PCI slot) to switch targets.
    pub fn with_mapping(
        mut self,
        host_id: &str,
        pci_slot: Option<&str>,
        targets: &[(&str, &str)],
    ) -> Self {
        self.mappings.insert(
            host_mapping_key(host_id, pci_slot),
            targets
                .iter()
                .map(|(switch, port)| SwitchTarget::new(*switch, *port))
                .collect(),
        );
        self
    }

    /// Registers a MAC alias for a switch.
    pub fn with_alias(mut self, mac: &str, name: &str) -> Self {
        self.aliases.insert(mac.to_lowercase(), name.to_string());
        self
    }
}

impl Inventory for FakeInventory {
    fn hosts(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    fn is_vlan_managed(&self, host: &str) -> bool {
        self.hosts.get(host).is_some_and(|h| h.manage_vlans)
    }

    fn participates(&self, host: &str, physical_network: Option<&str>) -> bool {
        let Some(h) = self.hosts.get(host) else {
            return false;
        };
        if h.physical_networks.is_empty() {
            return true;
        }
        physical_network.is_some_and(|p| h.physical_networks.iter().any(|hp| hp == p))
    }

    fn resolve_host_mapping(&self, host_id: &str, pci_slot: Option<&str>) -> Vec<SwitchTarget> {
        self.mappings
            .get(&host_mapping_key(host_id, pci_slot))
            .cloned()
            .unwrap_or_default()
    }

    fn resolve_mac_alias(&self, mac: &str) -> Option<String> {
        self.aliases.get(&mac.to_lowercase()).cloned()
    }
}
