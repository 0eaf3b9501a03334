//! Entity model shared by the driver, the platform adapter and tests.
//!
//! These are snapshots of the platform's entities (networks, segments,
//! ports, bindings, trunks). They are re-read on every decision and never
//! cached across events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Network type of a VLAN segment.
pub const NETWORK_TYPE_VLAN: &str = "vlan";

/// Device owner of ports created for baremetal nodes.
pub const DEVICE_OWNER_BAREMETAL: &str = "baremetal:none";

/// Device owner prefix of ports attached to compute instances.
pub const DEVICE_OWNER_COMPUTE_PREFIX: &str = "compute:";

/// Entity name used for this driver's provisioning blocks.
pub const PROVISIONING_ENTITY: &str = "TORSYNC";

/// One physical attachment point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwitchTarget {
    /// Inventory name of the switch.
    #[serde(rename = "switch")]
    pub switch_name: String,
    /// Port on the switch.
    #[serde(rename = "port")]
    pub switch_port: String,
}

impl SwitchTarget {
    /// Creates a new switch target.
    pub fn new(switch_name: impl Into<String>, switch_port: impl Into<String>) -> Self {
        Self {
            switch_name: switch_name.into(),
            switch_port: switch_port.into(),
        }
    }

    /// Returns true if this target is the given switch/port pair.
    pub fn is(&self, switch_name: &str, switch_port: &str) -> bool {
        self.switch_name == switch_name && self.switch_port == switch_port
    }
}

impl fmt::Display for SwitchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.switch_name, self.switch_port)
    }
}

/// Segmentation of the network a port is bound to.
///
/// `segmentation_id` is only set for VLAN segments; `None` means the
/// network is not managed by this driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationContext {
    pub segmentation_id: Option<u16>,
    pub network_type: String,
    pub physical_network: Option<String>,
}

/// A network segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    pub id: String,
    pub network_id: String,
    pub network_type: String,
    #[serde(default)]
    pub physical_network: Option<String>,
    #[serde(default)]
    pub segmentation_id: Option<u16>,
}

impl NetworkSegment {
    /// Returns true if this is a VLAN segment.
    pub fn is_vlan(&self) -> bool {
        self.network_type == NETWORK_TYPE_VLAN
    }
}

/// A logical network and its segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub segments: Vec<NetworkSegment>,
}

impl Network {
    /// Returns the active VLAN segment (the first segment of type `vlan`).
    pub fn vlan_segment(&self) -> Option<&NetworkSegment> {
        self.segments.iter().find(|s| s.is_vlan())
    }

    /// Returns the segmentation of the active segment.
    ///
    /// The active segment is the VLAN segment if there is one, otherwise
    /// the first segment. Returns `None` for a network without segments.
    pub fn segmentation(&self) -> Option<SegmentationContext> {
        let segment = self.vlan_segment().or_else(|| self.segments.first())?;
        Some(SegmentationContext {
            segmentation_id: if segment.is_vlan() {
                segment.segmentation_id
            } else {
                None
            },
            network_type: segment.network_type.clone(),
            physical_network: segment.physical_network.clone(),
        })
    }

    /// Returns the VLAN id carried by this network, if any.
    pub fn segmentation_id(&self) -> Option<u16> {
        self.vlan_segment().and_then(|s| s.segmentation_id)
    }

    /// Returns the physical network of the active VLAN segment.
    pub fn physical_network(&self) -> Option<&str> {
        self.vlan_segment()
            .and_then(|s| s.physical_network.as_deref())
    }
}

/// VNIC type of a port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VnicType {
    Baremetal,
    Normal,
    Direct,
    #[serde(other)]
    Other,
}

/// VIF type of a port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VifType {
    /// Bound by this driver.
    Other,
    Unbound,
    BindingFailed,
    /// Bound by another mechanism (ovs, bridge, ...).
    #[serde(other)]
    Agent,
}

/// Status of a port binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingStatus {
    Active,
    Inactive,
}

/// One entry of a binding profile's local link information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLinkInfo {
    #[serde(default)]
    pub switch_info: Option<String>,
    #[serde(default)]
    pub switch_id: Option<String>,
    #[serde(default)]
    pub port_id: Option<String>,
}

/// Binding profile of a port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_link_information: Option<Vec<LocalLinkInfo>>,
    /// PCI address of the virtual function for direct ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pci_slot: Option<String>,
}

/// A port binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Compute host id; empty when unbound.
    #[serde(default)]
    pub host: String,
    pub vnic_type: VnicType,
    pub vif_type: VifType,
    #[serde(default)]
    pub profile: Option<BindingProfile>,
    pub status: BindingStatus,
}

impl PortBinding {
    /// Returns the local link information of the profile, if present.
    pub fn local_link_information(&self) -> Option<&[LocalLinkInfo]> {
        self.profile
            .as_ref()
            .and_then(|p| p.local_link_information.as_deref())
    }

    /// Returns the PCI slot of the profile, if present.
    pub fn pci_slot(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.pci_slot.as_deref())
    }
}

/// Kind of attachment a supported port has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Exclusive switch port of a baremetal node.
    Baremetal,
    /// Virtual port on a compute host uplink shared with other ports.
    Normal,
    /// SR-IOV virtual function on a compute host.
    Direct,
}

impl PortKind {
    /// Returns true if the port owns its switch port exclusively.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, PortKind::Baremetal)
    }
}

/// A logical port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub device_owner: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub bindings: Vec<PortBinding>,
}

impl Port {
    /// Returns the active binding.
    pub fn active_binding(&self) -> Option<&PortBinding> {
        self.bindings
            .iter()
            .find(|b| b.status == BindingStatus::Active)
    }

    /// Returns the VNIC type of the active binding.
    pub fn vnic_type(&self) -> VnicType {
        self.active_binding()
            .map(|b| b.vnic_type)
            .unwrap_or(VnicType::Other)
    }

    /// Returns the attachment kind, or `None` for unsupported ports.
    pub fn kind(&self) -> Option<PortKind> {
        let compute = self.device_owner.starts_with(DEVICE_OWNER_COMPUTE_PREFIX);
        match self.vnic_type() {
            VnicType::Baremetal if self.device_owner == DEVICE_OWNER_BAREMETAL => {
                Some(PortKind::Baremetal)
            }
            VnicType::Normal if compute => Some(PortKind::Normal),
            VnicType::Direct if compute => Some(PortKind::Direct),
            _ => None,
        }
    }

    /// Returns true if this driver handles the port.
    pub fn is_supported(&self) -> bool {
        self.kind().is_some()
    }

    /// Returns true if the port is supported and bound.
    ///
    /// Baremetal ports are bound by this driver (`vif_type` other); virtual
    /// ports are bound by a host agent and count as bound once they have a
    /// host and a VIF type other than unbound/failed.
    pub fn is_bound(&self) -> bool {
        let Some(kind) = self.kind() else {
            return false;
        };
        let Some(binding) = self.active_binding() else {
            return false;
        };
        match kind {
            PortKind::Baremetal => binding.vif_type == VifType::Other,
            PortKind::Normal | PortKind::Direct => {
                !binding.host.is_empty()
                    && !matches!(binding.vif_type, VifType::Unbound | VifType::BindingFailed)
            }
        }
    }

    /// Returns true if the active binding still identifies a physical
    /// attachment (a host or local link information).
    pub fn has_attachment(&self) -> bool {
        self.active_binding().is_some_and(|b| {
            !b.host.is_empty() || b.local_link_information().is_some_and(|l| !l.is_empty())
        })
    }

    /// Returns the compute host of the active binding, if set.
    pub fn binding_host(&self) -> Option<&str> {
        self.active_binding()
            .map(|b| b.host.as_str())
            .filter(|h| !h.is_empty())
    }
}

/// A trunk subport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPort {
    pub port_id: String,
    #[serde(default = "default_segmentation_type")]
    pub segmentation_type: String,
    pub segmentation_id: u16,
}

fn default_segmentation_type() -> String {
    NETWORK_TYPE_VLAN.to_string()
}

/// A trunk: a parent port carrying tagged subports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    pub id: String,
    /// Parent port id.
    pub port_id: String,
    #[serde(default)]
    pub sub_ports: Vec<SubPort>,
}

impl Trunk {
    /// Returns the tagged VLAN ids of the VLAN subports, in subport order.
    ///
    /// Each id appears once. A subport id equal to `native_vlan` is left
    /// out, since the native VLAN is already carried untagged.
    pub fn tagged_vlans(&self, native_vlan: u16) -> Vec<u16> {
        let mut vlans = Vec::with_capacity(self.sub_ports.len());
        for sub in self
            .sub_ports
            .iter()
            .filter(|s| s.segmentation_type == NETWORK_TYPE_VLAN)
        {
            if sub.segmentation_id != native_vlan && !vlans.contains(&sub.segmentation_id) {
                vlans.push(sub.segmentation_id);
            }
        }
        vlans
    }
}

/// Opaque request token passed through to platform reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    /// Creates a context with a fresh request id.
    pub fn new() -> Self {
        Self {
            request_id: format!("req-{}", uuid::Uuid::new_v4()),
        }
    }

    /// Creates a context with the given request id.
    pub fn with_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
