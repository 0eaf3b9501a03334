//! Inventory provider interface.

use crate::model::SwitchTarget;

/// Static knowledge about the managed switches.
pub trait Inventory: Send + Sync {
    /// Names of all inventory switches.
    fn hosts(&self) -> Vec<String>;

    /// Returns true if the driver manages VLANs on the switch.
    fn is_vlan_managed(&self, host: &str) -> bool;

    /// Returns true if the switch carries the physical network.
    fn participates(&self, host: &str, physical_network: Option<&str>) -> bool;

    /// Switch targets statically mapped to a compute host (and, for SR-IOV
    /// ports, the virtual function's PCI slot). Unmapped hosts yield an
    /// empty list.
    fn resolve_host_mapping(&self, host_id: &str, pci_slot: Option<&str>) -> Vec<SwitchTarget>;

    /// Inventory name of the switch with the given MAC address.
    fn resolve_mac_alias(&self, mac: &str) -> Option<String>;
}

/// Mapping key of a compute host: `host`, or `host-<pci_slot>` for a
/// virtual function.
pub fn host_mapping_key(host_id: &str, pci_slot: Option<&str>) -> String {
    match pci_slot {
        Some(pci) if !pci.is_empty() => format!("{}-{}", host_id, pci),
        _ => host_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_mapping_key() {
        assert_eq!(host_mapping_key("compute-1", None), "compute-1");
        assert_eq!(host_mapping_key("compute-1", Some("")), "compute-1");
        assert_eq!(
            host_mapping_key("compute-1", Some("0000:03:00.1")),
            "compute-1-0000:03:00.1"
        );
    }
}
