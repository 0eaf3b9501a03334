//! Switch port usage reference counting.
//!
//! Before a VLAN is stripped from a shared switch port (or an exclusive one
//! is torn down after losing its port), the live ports are scanned for
//! another active port still attached to the same switch port on the same
//! physical network and VLAN.

use std::sync::Arc;

use torsync_common::model::{RequestContext, SwitchTarget};
use torsync_common::platform::EntityStore;
use tracing::{debug, trace};

use crate::resolver::SwitchPortResolver;

/// Scans live ports for users of a switch port.
#[derive(Clone)]
pub struct UsageCounter {
    store: Arc<dyn EntityStore>,
    resolver: SwitchPortResolver,
}

impl UsageCounter {
    pub fn new(store: Arc<dyn EntityStore>, resolver: SwitchPortResolver) -> Self {
        Self { store, resolver }
    }

    /// Returns true if a port other than `excluded_port_id` still uses
    /// `target` for `(physical_network, segmentation_id)`.
    ///
    /// Ports without an active binding, without a resolvable attachment or
    /// whose network is gone are skipped.
    pub fn is_deleted_port_in_use(
        &self,
        ctx: &RequestContext,
        physical_network: Option<&str>,
        target: &SwitchTarget,
        segmentation_id: Option<u16>,
        excluded_port_id: &str,
    ) -> bool {
        for port in self.store.list_ports(ctx) {
            if port.id == excluded_port_id || port.active_binding().is_none() {
                continue;
            }

            let resolution = match self.resolver.resolve(&port, None) {
                Ok(resolution) => resolution,
                Err(e) => {
                    trace!(port_id = %port.id, error = %e, "Skipping port without attachment");
                    continue;
                }
            };
            if !resolution.targets.contains(target) {
                continue;
            }

            let Some(network) = self.store.get_network(ctx, &port.network_id) else {
                trace!(port_id = %port.id, network_id = %port.network_id, "Skipping port without network");
                continue;
            };
            let Some(segment) = network.vlan_segment() else {
                continue;
            };

            if segment.physical_network.as_deref() == physical_network
                && segment.segmentation_id == segmentation_id
            {
                debug!(
                    port_id = %port.id,
                    switch = %target.switch_name,
                    switch_port = %target.switch_port,
                    "Switch port still in use"
                );
                return true;
            }
        }
        false
    }
}
