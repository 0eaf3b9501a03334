//! Entity builders for driver tests
//!
//! Provides reusable networks, ports and trunks in the shapes the platform
//! hands to the driver.

use torsync_common::model::{
    BindingProfile, BindingStatus, LocalLinkInfo, Network, NetworkSegment, Port, PortBinding,
    SubPort, Trunk, VifType, VnicType, DEVICE_OWNER_BAREMETAL, NETWORK_TYPE_VLAN,
};

/// Default physical network used by fixtures.
pub const PHYSNET: &str = "physnet1";

/// Network with a single VLAN segment.
pub fn vlan_network(id: &str, physical_network: &str, vlan_id: u16) -> Network {
    Network {
        id: id.to_string(),
        name: format!("{}-name", id),
        segments: vec![vlan_segment(&format!("{}-seg", id), id, physical_network, vlan_id)],
    }
}

/// Network with a single VXLAN segment (not managed by the driver).
pub fn vxlan_network(id: &str, vni: u16) -> Network {
    Network {
        id: id.to_string(),
        name: format!("{}-name", id),
        segments: vec![NetworkSegment {
            id: format!("{}-seg", id),
            network_id: id.to_string(),
            network_type: "vxlan".to_string(),
            physical_network: None,
            segmentation_id: Some(vni),
        }],
    }
}

/// VLAN segment.
pub fn vlan_segment(id: &str, network_id: &str, physical_network: &str, vlan_id: u16) -> NetworkSegment {
    NetworkSegment {
        id: id.to_string(),
        network_id: network_id.to_string(),
        network_type: NETWORK_TYPE_VLAN.to_string(),
        physical_network: Some(physical_network.to_string()),
        segmentation_id: Some(vlan_id),
    }
}

/// Trunk with VLAN subports `(port_id, vlan_id)` in the given order.
pub fn trunk(id: &str, parent_port_id: &str, sub_ports: &[(&str, u16)]) -> Trunk {
    Trunk {
        id: id.to_string(),
        port_id: parent_port_id.to_string(),
        sub_ports: sub_ports
            .iter()
            .map(|(port_id, vlan_id)| SubPort {
                port_id: port_id.to_string(),
                segmentation_type: NETWORK_TYPE_VLAN.to_string(),
                segmentation_id: *vlan_id,
            })
            .collect(),
    }
}

/// Builder for [`Port`] snapshots.
#[derive(Debug, Clone)]
pub struct PortBuilder {
    port: Port,
}

impl PortBuilder {
    fn with_binding(
        id: &str,
        network_id: &str,
        device_owner: &str,
        binding: PortBinding,
    ) -> Self {
        Self {
            port: Port {
                id: id.to_string(),
                network_id: network_id.to_string(),
                device_owner: device_owner.to_string(),
                device_id: format!("{}-device", id),
                bindings: vec![binding],
            },
        }
    }

    /// Bound baremetal port without local link information.
    pub fn baremetal(id: &str, network_id: &str) -> Self {
        Self::with_binding(
            id,
            network_id,
            DEVICE_OWNER_BAREMETAL,
            PortBinding {
                host: format!("{}-node", id),
                vnic_type: VnicType::Baremetal,
                vif_type: VifType::Other,
                profile: None,
                status: BindingStatus::Active,
            },
        )
    }

    /// Bound VM port on a compute host.
    pub fn normal(id: &str, network_id: &str, host: &str) -> Self {
        Self::compute(id, network_id, host, VnicType::Normal)
    }

    /// Bound SR-IOV port on a compute host.
    pub fn direct(id: &str, network_id: &str, host: &str) -> Self {
        Self::compute(id, network_id, host, VnicType::Direct)
    }

    fn compute(id: &str, network_id: &str, host: &str, vnic_type: VnicType) -> Self {
        Self::with_binding(
            id,
            network_id,
            "compute:nova",
            PortBinding {
                host: host.to_string(),
                vnic_type,
                vif_type: VifType::Agent,
                profile: None,
                status: BindingStatus::Active,
            },
        )
    }

    /// Appends a local link entry naming the switch by `switch_info`.
    pub fn with_link(self, switch_info: &str, port_id: &str) -> Self {
        self.with_link_info(LocalLinkInfo {
            switch_info: Some(switch_info.to_string()),
            switch_id: None,
            port_id: Some(port_id.to_string()),
        })
    }

    /// Appends a local link entry.
    pub fn with_link_info(mut self, entry: LocalLinkInfo) -> Self {
        self.profile_mut()
            .local_link_information
            .get_or_insert_with(Vec::new)
            .push(entry);
        self
    }

    /// Sets an empty local link list.
    pub fn with_empty_link_info(mut self) -> Self {
        self.profile_mut().local_link_information = Some(Vec::new());
        self
    }

    pub fn with_pci_slot(mut self, pci_slot: &str) -> Self {
        self.profile_mut().pci_slot = Some(pci_slot.to_string());
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        for binding in &mut self.port.bindings {
            binding.host = host.to_string();
        }
        self
    }

    pub fn with_vif_type(mut self, vif_type: VifType) -> Self {
        for binding in &mut self.port.bindings {
            binding.vif_type = vif_type;
        }
        self
    }

    pub fn with_device_owner(mut self, device_owner: &str) -> Self {
        self.port.device_owner = device_owner.to_string();
        self
    }

    /// Marks the port unbound: no host and no profile.
    pub fn unbound(mut self) -> Self {
        for binding in &mut self.port.bindings {
            binding.host.clear();
            binding.profile = None;
            binding.vif_type = VifType::Unbound;
        }
        self
    }

    /// Marks every binding inactive.
    pub fn inactive(mut self) -> Self {
        for binding in &mut self.port.bindings {
            binding.status = BindingStatus::Inactive;
        }
        self
    }

    pub fn without_bindings(mut self) -> Self {
        self.port.bindings.clear();
        self
    }

    pub fn build(self) -> Port {
        self.port
    }

    fn profile_mut(&mut self) -> &mut BindingProfile {
        if self.port.bindings.is_empty() {
            self.port.bindings.push(PortBinding {
                host: String::new(),
                vnic_type: VnicType::Other,
                vif_type: VifType::Unbound,
                profile: None,
                status: BindingStatus::Active,
            });
        }
        self.port.bindings[0]
            .profile
            .get_or_insert_with(BindingProfile::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torsync_common::model::PortKind;

    #[test]
    fn test_baremetal_builder() {
        let port = PortBuilder::baremetal("p1", "net-1")
            .with_link("leaf-1", "eth1")
            .with_link("leaf-2", "eth1")
            .build();
        assert_eq!(port.kind(), Some(PortKind::Baremetal));
        assert!(port.is_bound());
        let lli = port.active_binding().unwrap().local_link_information().unwrap();
        assert_eq!(lli.len(), 2);
    }

    #[test]
    fn test_unbound_builder() {
        let port = PortBuilder::normal("p1", "net-1", "compute-1").unbound().build();
        assert!(!port.is_bound());
        assert!(!port.has_attachment());
    }

    #[test]
    fn test_trunk_fixture() {
        let t = trunk("t1", "p1", &[("sp1", 200), ("sp2", 300)]);
        assert_eq!(t.tagged_vlans(100), vec![200, 300]);
    }
}
