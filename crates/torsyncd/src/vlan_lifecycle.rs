//! VLAN lifecycle on the inventory switches.
//!
//! Network creation creates the network's VLAN on every switch that manages
//! VLANs and carries the network's physical network; deletion removes it
//! again unless another live segment on the same physical network still
//! uses the VLAN id. Both run after the platform committed the change and
//! re-check live state before touching switches.

use std::sync::Arc;

use torsync_common::error::{DriverError, DriverResult};
use torsync_common::executor::SwitchExecutor;
use torsync_common::inventory::Inventory;
use torsync_common::platform::{EntityStore, NetworkContext};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VlanOp {
    Create,
    Delete,
}

impl VlanOp {
    fn as_str(&self) -> &'static str {
        match self {
            VlanOp::Create => "create",
            VlanOp::Delete => "delete",
        }
    }
}

/// Creates and deletes network VLANs on switches.
#[derive(Clone)]
pub struct VlanLifecycle {
    store: Arc<dyn EntityStore>,
    inventory: Arc<dyn Inventory>,
    executor: Arc<dyn SwitchExecutor>,
}

impl VlanLifecycle {
    pub fn new(
        store: Arc<dyn EntityStore>,
        inventory: Arc<dyn Inventory>,
        executor: Arc<dyn SwitchExecutor>,
    ) -> Self {
        Self {
            store,
            inventory,
            executor,
        }
    }

    /// Creates the VLAN of a newly created network.
    #[instrument(skip_all, fields(network_id = %ctx.current.id))]
    pub async fn create_network(&self, ctx: &NetworkContext) -> DriverResult<()> {
        let Some(segment) = ctx.current.vlan_segment() else {
            debug!("Not a VLAN network, nothing to create");
            return Ok(());
        };
        let Some(vlan_id) = segment.segmentation_id else {
            debug!("VLAN segment without segmentation id, nothing to create");
            return Ok(());
        };

        let Some(live) = self.store.get_network(&ctx.request, &ctx.current.id) else {
            debug!(vlan_id, "Network deleted before its VLAN was created");
            return Ok(());
        };
        if live.segmentation_id() != Some(vlan_id) {
            debug!(vlan_id, "Network segment replaced before its VLAN was created");
            return Ok(());
        }

        self.apply(VlanOp::Create, segment.physical_network.as_deref(), vlan_id)
            .await
    }

    /// Deletes the VLAN of a deleted network unless it is still live.
    #[instrument(skip_all, fields(network_id = %ctx.current.id))]
    pub async fn delete_network(&self, ctx: &NetworkContext) -> DriverResult<()> {
        let Some(segment) = ctx.current.vlan_segment() else {
            debug!("Not a VLAN network, nothing to delete");
            return Ok(());
        };
        let Some(vlan_id) = segment.segmentation_id else {
            debug!("VLAN segment without segmentation id, nothing to delete");
            return Ok(());
        };
        let physical_network = segment.physical_network.as_deref();

        let still_live = self
            .store
            .list_segments(&ctx.request, physical_network)
            .iter()
            .any(|s| s.is_vlan() && s.segmentation_id == Some(vlan_id));
        if still_live {
            debug!(vlan_id, "VLAN still used by another segment, keeping it");
            return Ok(());
        }

        self.apply(VlanOp::Delete, physical_network, vlan_id).await
    }

    /// Switches that manage VLANs and carry the physical network.
    pub fn vlan_hosts(&self, physical_network: Option<&str>) -> Vec<String> {
        self.inventory
            .hosts()
            .into_iter()
            .filter(|host| {
                self.inventory.is_vlan_managed(host)
                    && self.inventory.participates(host, physical_network)
            })
            .collect()
    }

    /// Runs the operation on every VLAN host. All hosts are attempted; the
    /// first failure is returned.
    async fn apply(
        &self,
        op: VlanOp,
        physical_network: Option<&str>,
        vlan_id: u16,
    ) -> DriverResult<()> {
        let mut first_error = None;

        for host in self.vlan_hosts(physical_network) {
            let result = match op {
                VlanOp::Create => self.executor.create_vlan(&host, vlan_id).await,
                VlanOp::Delete => self.executor.delete_vlan(&host, vlan_id).await,
            };
            match result {
                Ok(()) => info!(switch = %host, vlan_id, "VLAN {}d", op.as_str()),
                Err(e) => {
                    warn!(switch = %host, vlan_id, error = %e, "Failed to {} VLAN", op.as_str());
                    if first_error.is_none() {
                        first_error = Some(DriverError::switch_operation(
                            format!("{} vlan {}", op.as_str(), vlan_id),
                            host,
                            e,
                        ));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
