//! Switch port resolution.
//!
//! Maps a logical port to the physical `(switch, port)` pairs it occupies,
//! in the order the binding profile (or the static host mapping) lists
//! them, together with the VLAN of the port's network.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use torsync_common::error::{DriverError, DriverResult};
use torsync_common::inventory::Inventory;
use torsync_common::model::{
    LocalLinkInfo, Network, Port, PortKind, SegmentationContext, SwitchTarget, NETWORK_TYPE_VLAN,
};

/// Colon or dash separated MAC address.
static MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[0-9a-f]{2}:){5}[0-9a-f]{2}$|^(?:[0-9a-f]{2}-){5}[0-9a-f]{2}$")
        .expect("Invalid regex pattern")
});

/// Returns true if `name` looks like a MAC address.
pub fn is_mac_address(name: &str) -> bool {
    MAC_RE.is_match(name)
}

/// Targets of a port and the segmentation to manage on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub targets: Vec<SwitchTarget>,
    /// `None` when no network was given or the network has no segments.
    pub segmentation: Option<SegmentationContext>,
}

impl Resolution {
    /// VLAN to manage, if the network's active segment is a VLAN.
    pub fn segmentation_id(&self) -> Option<u16> {
        self.segmentation.as_ref().and_then(|s| s.segmentation_id)
    }

    /// Physical network of the active VLAN segment.
    pub fn physical_network(&self) -> Option<&str> {
        self.segmentation
            .as_ref()
            .filter(|s| s.network_type == NETWORK_TYPE_VLAN)
            .and_then(|s| s.physical_network.as_deref())
    }
}

/// Resolves logical ports to switch targets.
#[derive(Clone)]
pub struct SwitchPortResolver {
    inventory: Arc<dyn Inventory>,
}

impl SwitchPortResolver {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self { inventory }
    }

    /// Resolves the port's targets and, if a network is given, its VLAN.
    ///
    /// Local link information from the active binding wins over the static
    /// host mapping. A malformed local link list fails the whole resolution.
    pub fn resolve(&self, port: &Port, network: Option<&Network>) -> DriverResult<Resolution> {
        Ok(Resolution {
            targets: self.targets(port)?,
            segmentation: network.and_then(Network::segmentation),
        })
    }

    fn targets(&self, port: &Port) -> DriverResult<Vec<SwitchTarget>> {
        let binding = port.active_binding();

        if let Some(links) = binding.and_then(|b| b.local_link_information()) {
            if links.is_empty() {
                return Err(DriverError::local_link_missing(&port.id));
            }
            return links
                .iter()
                .map(|link| self.link_target(port, link))
                .collect();
        }

        match port.kind() {
            Some(PortKind::Normal) | Some(PortKind::Direct) => {
                let Some(host) = port.binding_host() else {
                    return Ok(Vec::new());
                };
                let pci_slot = binding.and_then(|b| b.pci_slot());
                Ok(self
                    .inventory
                    .resolve_host_mapping(host, pci_slot)
                    .into_iter()
                    .map(|target| self.with_alias(target))
                    .collect())
            }
            _ => Err(DriverError::local_link_missing(&port.id)),
        }
    }

    fn link_target(&self, port: &Port, link: &LocalLinkInfo) -> DriverResult<SwitchTarget> {
        let name = link
            .switch_info
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| link.switch_id.as_deref().filter(|s| !s.is_empty()));
        let switch_port = link.port_id.as_deref().filter(|s| !s.is_empty());

        match (name, switch_port) {
            (Some(name), Some(switch_port)) => {
                Ok(self.with_alias(SwitchTarget::new(name, switch_port)))
            }
            _ => Err(DriverError::local_link_missing(&port.id)),
        }
    }

    fn with_alias(&self, mut target: SwitchTarget) -> SwitchTarget {
        if is_mac_address(&target.switch_name) {
            if let Some(alias) = self.inventory.resolve_mac_alias(&target.switch_name) {
                target.switch_name = alias;
            }
        }
        target
    }
}
