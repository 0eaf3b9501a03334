//! Platform event adapter.
//!
//! [`TorSyncDriver`] implements [`MechanismDriver`]: it turns platform
//! events into VLAN lifecycle, port reconciliation and trunk propagation
//! calls.

use std::sync::Arc;

use async_trait::async_trait;
use torsync_common::driver::MechanismDriver;
use torsync_common::error::DriverResult;
use torsync_common::executor::SwitchExecutor;
use torsync_common::inventory::Inventory;
use torsync_common::lock::LockService;
use torsync_common::model::{Network, Port, PortKind, RequestContext, PROVISIONING_ENTITY};
use torsync_common::platform::{
    BindingContext, EntityStore, NetworkContext, PortContext, Provisioning,
};
use tracing::{debug, info, instrument};

use crate::lock::PortLocks;
use crate::reconciler::{EnsurePort, PortReconciler};
use crate::resolver::Resolution;
use crate::vlan_lifecycle::VlanLifecycle;

/// ToR switch mechanism driver.
#[derive(Clone)]
pub struct TorSyncDriver {
    store: Arc<dyn EntityStore>,
    provisioning: Arc<dyn Provisioning>,
    lifecycle: VlanLifecycle,
    reconciler: PortReconciler,
}

impl TorSyncDriver {
    pub fn new(
        store: Arc<dyn EntityStore>,
        provisioning: Arc<dyn Provisioning>,
        inventory: Arc<dyn Inventory>,
        executor: Arc<dyn SwitchExecutor>,
        locks: Arc<dyn LockService>,
    ) -> Self {
        let lifecycle = VlanLifecycle::new(store.clone(), inventory.clone(), executor.clone());
        let reconciler =
            PortReconciler::new(store.clone(), inventory, executor, PortLocks::new(locks));
        Self {
            store,
            provisioning,
            lifecycle,
            reconciler,
        }
    }

    pub fn reconciler(&self) -> &PortReconciler {
        &self.reconciler
    }

    /// The event's network, or the live one if the event carried none.
    fn network_of(&self, ctx: &PortContext, port: &Port) -> Option<Network> {
        ctx.network
            .clone()
            .or_else(|| self.store.get_network(&ctx.request, &port.network_id))
    }

    /// Resolves `port` against its network.
    fn resolve(&self, ctx: &PortContext, port: &Port) -> DriverResult<Resolution> {
        let network = self.network_of(ctx, port);
        self.reconciler.resolver().resolve(port, network.as_ref())
    }

    /// Resolves `port` and runs `ensure_port` on each of its targets.
    async fn ensure_all(
        &self,
        ctx: &PortContext,
        port: &Port,
        binding: Option<&dyn BindingContext>,
        delete: bool,
    ) -> DriverResult<()> {
        let resolution = self.resolve(ctx, port)?;
        if resolution.targets.is_empty() {
            debug!(port_id = %port.id, "Port resolves to no switch port");
        }
        self.ensure_targets(ctx, port, &resolution, binding, delete)
            .await
    }

    async fn ensure_targets(
        &self,
        ctx: &PortContext,
        port: &Port,
        resolution: &Resolution,
        binding: Option<&dyn BindingContext>,
        delete: bool,
    ) -> DriverResult<()> {
        for target in &resolution.targets {
            let op = EnsurePort::new(target.clone())
                .with_segment(resolution.physical_network(), resolution.segmentation_id())
                .deleting(delete);
            self.reconciler
                .ensure_port(port, &ctx.request, &op, binding)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MechanismDriver for TorSyncDriver {
    async fn on_network_created(&self, ctx: &NetworkContext) -> DriverResult<()> {
        self.lifecycle.create_network(ctx).await
    }

    async fn on_network_deleted(&self, ctx: &NetworkContext) -> DriverResult<()> {
        self.lifecycle.delete_network(ctx).await
    }

    #[instrument(skip_all, fields(port_id = %ctx.current.id))]
    async fn on_port_bind_requested(&self, ctx: &PortContext) -> DriverResult<bool> {
        if !ctx.current.is_supported() {
            debug!("Port not supported, declining to bind");
            return Ok(false);
        }

        let resolution = self.resolve(ctx, &ctx.current)?;
        if resolution.targets.is_empty() {
            debug!("Port host has no switch port mapping, declining to bind");
            return Ok(false);
        }

        self.provisioning
            .add_provisioning_block(&ctx.request, &ctx.current.id, PROVISIONING_ENTITY);
        self.ensure_targets(ctx, &ctx.current, &resolution, Some(ctx), false)
            .await?;
        Ok(true)
    }

    #[instrument(skip_all, fields(port_id = %ctx.current.id))]
    async fn on_port_updated(&self, ctx: &PortContext) -> DriverResult<()> {
        let port = &ctx.current;

        // VM ports are bound by their host agent; follow their host.
        if matches!(port.kind(), Some(PortKind::Normal | PortKind::Direct))
            && port.binding_host().is_some()
        {
            self.ensure_all(ctx, port, Some(ctx), false).await?;
        }

        if port.is_bound() {
            self.provisioning
                .provisioning_complete(&ctx.request, &port.id, PROVISIONING_ENTITY);
            info!("Port provisioning complete");
        } else if let Some(original) = ctx.original.as_ref().filter(|p| p.is_bound()) {
            info!("Port unbound, cleaning up its switch ports");
            self.ensure_all(ctx, original, Some(ctx), true).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(port_id = %ctx.current.id))]
    async fn on_port_deleted(&self, ctx: &PortContext) -> DriverResult<()> {
        if !ctx.current.is_bound() {
            debug!("Deleted port was not bound, nothing to clean up");
            return Ok(());
        }
        self.ensure_all(ctx, &ctx.current, Some(ctx), true).await
    }

    async fn on_subports_changed(
        &self,
        parent_port_id: &str,
        request: &RequestContext,
    ) -> DriverResult<()> {
        self.reconciler.ensure_subports(parent_port_id, request).await
    }
}
