//! Inventory provider backed by the driver configuration.

use std::collections::{BTreeMap, HashMap};

use torsync_common::inventory::{host_mapping_key, Inventory};
use torsync_common::model::SwitchTarget;

use crate::config::{DriverConfig, HostConfig};

/// [`Inventory`] built once from a [`DriverConfig`].
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    hosts: BTreeMap<String, HostConfig>,
    port_mappings: BTreeMap<String, Vec<SwitchTarget>>,
    mac_aliases: HashMap<String, String>,
}

impl StaticInventory {
    pub fn from_config(config: &DriverConfig) -> Self {
        let mac_aliases = config
            .hosts
            .iter()
            .filter_map(|(name, host)| {
                host.mac
                    .as_deref()
                    .filter(|mac| !mac.is_empty())
                    .map(|mac| (mac.to_lowercase(), name.clone()))
            })
            .collect();

        Self {
            hosts: config.hosts.clone(),
            port_mappings: config.port_mappings.clone(),
            mac_aliases,
        }
    }

    /// Configuration of one switch.
    pub fn host(&self, name: &str) -> Option<&HostConfig> {
        self.hosts.get(name)
    }
}

impl Inventory for StaticInventory {
    fn hosts(&self) -> Vec<String> {
        self.hosts.keys().cloned().collect()
    }

    fn is_vlan_managed(&self, host: &str) -> bool {
        self.hosts.get(host).is_some_and(|h| h.manage_vlans)
    }

    fn participates(&self, host: &str, physical_network: Option<&str>) -> bool {
        match self.hosts.get(host) {
            Some(h) if h.physical_networks.is_empty() => true,
            Some(h) => physical_network
                .is_some_and(|physnet| h.physical_networks.iter().any(|p| p == physnet)),
            None => false,
        }
    }

    fn resolve_host_mapping(&self, host_id: &str, pci_slot: Option<&str>) -> Vec<SwitchTarget> {
        self.port_mappings
            .get(&host_mapping_key(host_id, pci_slot))
            .cloned()
            .unwrap_or_default()
    }

    fn resolve_mac_alias(&self, mac: &str) -> Option<String> {
        self.mac_aliases.get(&mac.to_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> StaticInventory {
        let config = DriverConfig::from_yaml_str(
            r#"
hosts:
  leaf-1:
    mac: "52:54:00:AA:BB:01"
  leaf-2:
    manage_vlans: false
    physical_networks: [physnet2]
port_mappings:
  compute-1:
    - { switch: leaf-1, port: eth1 }
    - { switch: leaf-2, port: eth1 }
  compute-1-0000:03:00.1:
    - { switch: leaf-1, port: eth7 }
"#,
        )
        .unwrap();
        StaticInventory::from_config(&config)
    }

    #[test]
    fn test_hosts_and_flags() {
        let inv = inventory();
        assert_eq!(inv.hosts(), vec!["leaf-1", "leaf-2"]);
        assert!(inv.is_vlan_managed("leaf-1"));
        assert!(!inv.is_vlan_managed("leaf-2"));
        assert!(!inv.is_vlan_managed("leaf-9"));
    }

    #[test]
    fn test_participates() {
        let inv = inventory();
        assert!(inv.participates("leaf-1", Some("physnet1")));
        assert!(inv.participates("leaf-1", None));
        assert!(inv.participates("leaf-2", Some("physnet2")));
        assert!(!inv.participates("leaf-2", Some("physnet1")));
        assert!(!inv.participates("leaf-9", Some("physnet1")));
    }

    #[test]
    fn test_host_mapping_keeps_order() {
        let inv = inventory();
        assert_eq!(
            inv.resolve_host_mapping("compute-1", None),
            vec![
                SwitchTarget::new("leaf-1", "eth1"),
                SwitchTarget::new("leaf-2", "eth1"),
            ]
        );
        assert_eq!(
            inv.resolve_host_mapping("compute-1", Some("0000:03:00.1")),
            vec![SwitchTarget::new("leaf-1", "eth7")]
        );
        assert!(inv.resolve_host_mapping("compute-2", None).is_empty());
    }

    #[test]
    fn test_mac_alias_case_insensitive() {
        let inv = inventory();
        assert_eq!(
            inv.resolve_mac_alias("52:54:00:aa:bb:01").as_deref(),
            Some("leaf-1")
        );
        assert_eq!(
            inv.resolve_mac_alias("52:54:00:AA:BB:01").as_deref(),
            Some("leaf-1")
        );
        assert_eq!(inv.resolve_mac_alias("52:54:00:aa:bb:99"), None);
    }
}
