//! Virtual network platform interfaces.
//!
//! The platform owns the entities; the driver only reads them through
//! [`EntityStore`] and reports back through [`BindingContext`] and
//! [`Provisioning`]. Event contexts ([`PortContext`], [`NetworkContext`])
//! carry the snapshots the platform hands to each event.

use std::sync::Mutex;

use crate::model::{Network, NetworkSegment, Port, RequestContext, Trunk, VifType};

/// Read access to the platform's entities.
///
/// Every call reads live state; implementations must not cache across calls.
pub trait EntityStore: Send + Sync {
    /// Fetches a port by id.
    fn get_port(&self, ctx: &RequestContext, port_id: &str) -> Option<Port>;

    /// Lists all ports.
    fn list_ports(&self, ctx: &RequestContext) -> Vec<Port>;

    /// Fetches a network (with its segments) by id.
    fn get_network(&self, ctx: &RequestContext, network_id: &str) -> Option<Network>;

    /// Lists the segments on a physical network.
    fn list_segments(&self, ctx: &RequestContext, physical_network: Option<&str>)
        -> Vec<NetworkSegment>;

    /// Fetches the trunk whose parent is the given port.
    fn get_trunk_by_parent(&self, ctx: &RequestContext, port_id: &str) -> Option<Trunk>;
}

/// Binding callbacks of a port event.
pub trait BindingContext: Send + Sync {
    /// Returns true while the port still waits for a segment to be bound.
    fn needs_binding(&self) -> bool;

    /// Segments offered for binding, in preference order.
    fn segments_to_bind(&self) -> &[NetworkSegment];

    /// Marks the port bound on the given segment.
    fn set_binding(&self, segment_id: &str, vif_type: VifType);
}

/// Provisioning-block callbacks.
pub trait Provisioning: Send + Sync {
    /// Blocks the port from becoming active until completion is reported.
    fn add_provisioning_block(&self, ctx: &RequestContext, port_id: &str, entity: &str);

    /// Releases this driver's provisioning block on the port.
    fn provisioning_complete(&self, ctx: &RequestContext, port_id: &str, entity: &str);
}

/// Segment recorded by [`BindingContext::set_binding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSegment {
    pub segment_id: String,
    pub vif_type: VifType,
}

/// Context of a port event.
#[derive(Debug)]
pub struct PortContext {
    /// Port state after the change.
    pub current: Port,
    /// Port state before the change (updates only).
    pub original: Option<Port>,
    /// Network the port belongs to.
    pub network: Option<Network>,
    /// Segments offered for binding, in preference order.
    pub segments_to_bind: Vec<NetworkSegment>,
    pub request: RequestContext,
    bound: Mutex<Option<BoundSegment>>,
}

impl PortContext {
    pub fn new(current: Port, request: RequestContext) -> Self {
        Self {
            current,
            original: None,
            network: None,
            segments_to_bind: Vec::new(),
            request,
            bound: Mutex::new(None),
        }
    }

    pub fn with_original(mut self, original: Port) -> Self {
        self.original = Some(original);
        self
    }

    /// Sets the network and offers its segments for binding.
    pub fn with_network(mut self, network: Network) -> Self {
        self.segments_to_bind = network.segments.clone();
        self.network = Some(network);
        self
    }

    pub fn with_segments_to_bind(mut self, segments: Vec<NetworkSegment>) -> Self {
        self.segments_to_bind = segments;
        self
    }

    /// Returns the segment bound through this context, if any.
    pub fn bound_segment(&self) -> Option<BoundSegment> {
        self.bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl BindingContext for PortContext {
    fn needs_binding(&self) -> bool {
        !self.segments_to_bind.is_empty() && self.bound_segment().is_none()
    }

    fn segments_to_bind(&self) -> &[NetworkSegment] {
        &self.segments_to_bind
    }

    fn set_binding(&self, segment_id: &str, vif_type: VifType) {
        let mut bound = self
            .bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *bound = Some(BoundSegment {
            segment_id: segment_id.to_string(),
            vif_type,
        });
    }
}

/// Context of a network event.
#[derive(Debug, Clone)]
pub struct NetworkContext {
    pub current: Network,
    pub request: RequestContext,
}

impl NetworkContext {
    pub fn new(current: Network, request: RequestContext) -> Self {
        Self { current, request }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BindingStatus, PortBinding, VnicType};

    fn port() -> Port {
        Port {
            id: "port-1".to_string(),
            network_id: "net-1".to_string(),
            device_owner: "baremetal:none".to_string(),
            device_id: "node-1".to_string(),
            bindings: vec![PortBinding {
                host: "node-1".to_string(),
                vnic_type: VnicType::Baremetal,
                vif_type: VifType::Unbound,
                profile: None,
                status: BindingStatus::Active,
            }],
        }
    }

    fn network() -> Network {
        Network {
            id: "net-1".to_string(),
            name: "tenant".to_string(),
            segments: vec![NetworkSegment {
                id: "seg-1".to_string(),
                network_id: "net-1".to_string(),
                network_type: "vlan".to_string(),
                physical_network: Some("physnet1".to_string()),
                segmentation_id: Some(100),
            }],
        }
    }

    #[test]
    fn test_set_binding() {
        let ctx = PortContext::new(port(), RequestContext::with_id("req-1")).with_network(network());
        assert!(ctx.needs_binding());
        assert_eq!(ctx.segments_to_bind()[0].id, "seg-1");

        ctx.set_binding("seg-1", VifType::Other);
        assert!(!ctx.needs_binding());
        assert_eq!(
            ctx.bound_segment(),
            Some(BoundSegment {
                segment_id: "seg-1".to_string(),
                vif_type: VifType::Other,
            })
        );
    }

    #[test]
    fn test_no_segments_never_needs_binding() {
        let ctx = PortContext::new(port(), RequestContext::new());
        assert!(!ctx.needs_binding());
        assert!(ctx.bound_segment().is_none());
    }
}
