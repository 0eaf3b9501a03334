//! Port state reconciliation.
//!
//! [`PortReconciler::ensure_port`] brings one switch port in line with the
//! live state of a logical port:
//!
//! - a port that is gone or no longer attached is cleaned up (full teardown
//!   for exclusive baremetal ports, VLAN strip for shared compute uplinks),
//!   unless another active port still uses the switch port;
//! - an attached port is configured by [`PortReconciler::set_port_state`]
//!   and its binding marked active.
//!
//! Every decision re-reads the platform under the port's lock, so repeated
//! or reordered events converge on the same switch configuration.

use std::sync::Arc;

use torsync_common::error::{DriverError, DriverResult};
use torsync_common::executor::SwitchExecutor;
use torsync_common::inventory::Inventory;
use torsync_common::model::{Port, PortKind, RequestContext, SwitchTarget, VifType};
use torsync_common::platform::{BindingContext, EntityStore};
use tracing::{debug, info, instrument, warn};

use crate::lock::PortLocks;
use crate::resolver::SwitchPortResolver;
use crate::usage::UsageCounter;

/// One switch port to reconcile for a logical port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsurePort {
    pub target: SwitchTarget,
    /// Physical network of the port's VLAN segment.
    pub physical_network: Option<String>,
    /// VLAN of the port's network; `None` leaves VLAN membership alone.
    pub segmentation_id: Option<u16>,
    /// The port is being deleted or unbound.
    pub delete: bool,
}

impl EnsurePort {
    pub fn new(target: SwitchTarget) -> Self {
        Self {
            target,
            physical_network: None,
            segmentation_id: None,
            delete: false,
        }
    }

    pub fn with_segment(
        mut self,
        physical_network: Option<&str>,
        segmentation_id: Option<u16>,
    ) -> Self {
        self.physical_network = physical_network.map(str::to_string);
        self.segmentation_id = segmentation_id;
        self
    }

    pub fn deleting(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }
}

/// Reconciles switch ports with logical ports.
#[derive(Clone)]
pub struct PortReconciler {
    pub(crate) store: Arc<dyn EntityStore>,
    inventory: Arc<dyn Inventory>,
    executor: Arc<dyn SwitchExecutor>,
    pub(crate) resolver: SwitchPortResolver,
    usage: UsageCounter,
    pub(crate) locks: PortLocks,
}

impl PortReconciler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        inventory: Arc<dyn Inventory>,
        executor: Arc<dyn SwitchExecutor>,
        locks: PortLocks,
    ) -> Self {
        let resolver = SwitchPortResolver::new(inventory.clone());
        let usage = UsageCounter::new(store.clone(), resolver.clone());
        Self {
            store,
            inventory,
            executor,
            resolver,
            usage,
            locks,
        }
    }

    pub fn resolver(&self) -> &SwitchPortResolver {
        &self.resolver
    }

    /// Reconciles `op.target` for `port` under the port's lock.
    ///
    /// `port` is the snapshot the triggering event carried; the live port is
    /// re-read once the lock is held. `binding` is marked bound when the
    /// switch port was configured and the port still needs binding.
    #[instrument(
        skip_all,
        fields(
            port_id = %port.id,
            switch = %op.target.switch_name,
            switch_port = %op.target.switch_port,
            delete = op.delete
        )
    )]
    pub async fn ensure_port(
        &self,
        port: &Port,
        ctx: &RequestContext,
        op: &EnsurePort,
        binding: Option<&dyn BindingContext>,
    ) -> DriverResult<()> {
        if !self.executor.has_host(&op.target.switch_name) {
            return Err(DriverError::unknown_switch(&op.target.switch_name));
        }

        self.locks
            .with_lock(&port.id, self.ensure_port_locked(port, ctx, op, binding))
            .await
    }

    async fn ensure_port_locked(
        &self,
        port: &Port,
        ctx: &RequestContext,
        op: &EnsurePort,
        binding: Option<&dyn BindingContext>,
    ) -> DriverResult<()> {
        let live = self
            .store
            .get_port(ctx, &port.id)
            .filter(Port::has_attachment);
        let Some(live) = live else {
            return self.reconcile_detached(port, ctx, op).await;
        };

        let configured = self
            .set_port_state(&live, ctx, &op.target.switch_name, &op.target.switch_port)
            .await?;

        if configured {
            if let Some(binding) = binding.filter(|b| b.needs_binding()) {
                if let Some(segment) = binding.segments_to_bind().first() {
                    binding.set_binding(&segment.id, VifType::Other);
                    info!(segment_id = %segment.id, "Port binding set");
                }
            }
        }

        if op.delete && live.kind().is_some_and(|k| !k.is_exclusive()) {
            self.strip_vlan(&live, ctx, op).await?;
        }
        Ok(())
    }

    /// Cleans up a switch port whose logical port is gone or detached.
    async fn reconcile_detached(
        &self,
        port: &Port,
        ctx: &RequestContext,
        op: &EnsurePort,
    ) -> DriverResult<()> {
        match port.kind() {
            Some(kind) if kind.is_exclusive() => {
                if !op.delete && self.in_use(port, ctx, op) {
                    debug!("Detached port's switch port still in use, keeping it");
                    return Ok(());
                }
                self.executor
                    .delete_port(&op.target.switch_name, &op.target.switch_port)
                    .await
                    .map_err(|e| {
                        DriverError::switch_operation(
                            format!("delete port {}", op.target.switch_port),
                            &op.target.switch_name,
                            e,
                        )
                    })?;
                info!("Switch port torn down");
                Ok(())
            }
            // Shared uplinks only ever lose the port's VLAN.
            Some(_) => self.strip_vlan(port, ctx, op).await,
            None => {
                debug!("Detached port is not handled by this driver");
                Ok(())
            }
        }
    }

    /// Removes the port's VLAN from a shared switch port nobody else needs.
    async fn strip_vlan(
        &self,
        port: &Port,
        ctx: &RequestContext,
        op: &EnsurePort,
    ) -> DriverResult<()> {
        let Some(vlan_id) = op.segmentation_id else {
            debug!("No VLAN known for the port, nothing to strip");
            return Ok(());
        };
        if self.in_use(port, ctx, op) {
            debug!(vlan_id, "VLAN still used on the switch port, keeping it");
            return Ok(());
        }

        self.executor
            .delete_trunk_vlan(&op.target.switch_name, &op.target.switch_port, vlan_id)
            .await
            .map_err(|e| DriverError::configuration(&port.id, &op.target.switch_name, e))?;
        info!(vlan_id, "VLAN removed from switch port");
        Ok(())
    }

    fn in_use(&self, port: &Port, ctx: &RequestContext, op: &EnsurePort) -> bool {
        self.usage.is_deleted_port_in_use(
            ctx,
            op.physical_network.as_deref(),
            &op.target,
            op.segmentation_id,
            &port.id,
        )
    }

    /// Applies the port's configuration to `(switch_name, switch_port)`.
    ///
    /// Returns true if the switch port was configured. Missing network,
    /// resolution failures and unknown switches are fatal; executor
    /// failures are configuration errors.
    #[instrument(skip_all, fields(port_id = %port.id, switch = %switch_name, switch_port = %switch_port))]
    pub async fn set_port_state(
        &self,
        port: &Port,
        ctx: &RequestContext,
        switch_name: &str,
        switch_port: &str,
    ) -> DriverResult<bool> {
        let network = self
            .store
            .get_network(ctx, &port.network_id)
            .ok_or_else(|| DriverError::network_not_found(&port.network_id))?;
        let resolution = self.resolver.resolve(port, Some(&network))?;
        if resolution.targets.is_empty() {
            return Err(DriverError::mechanism(format!(
                "port {} has no switch port on host {}",
                port.id,
                port.binding_host().unwrap_or_default()
            )));
        }

        if let Some(unknown) = resolution
            .targets
            .iter()
            .find(|t| !self.executor.has_host(&t.switch_name))
        {
            return Err(DriverError::unknown_switch(&unknown.switch_name));
        }

        if !resolution.targets.iter().any(|t| t.is(switch_name, switch_port)) {
            warn!("Switch port no longer among the port's targets, skipping");
            return Ok(false);
        }

        let trunk = self.store.get_trunk_by_parent(ctx, &port.id);
        let mut configured = false;

        for target in resolution
            .targets
            .iter()
            .filter(|t| t.is(switch_name, switch_port))
        {
            if !self.inventory.is_vlan_managed(&target.switch_name) {
                debug!("Switch does not manage VLANs, skipping");
                continue;
            }

            // A trunk parent is always configured as a trunk, never as an
            // access port.
            let result = if let Some(trunk) = &trunk {
                let Some(native_vlan) = network.segmentation_id() else {
                    warn!(trunk_id = %trunk.id, "Trunk parent network has no VLAN segment");
                    continue;
                };
                let tagged = trunk.tagged_vlans(native_vlan);
                info!(native_vlan, ?tagged, "Configuring trunk port");
                self.executor
                    .conf_trunk_port(&target.switch_name, &target.switch_port, native_vlan, &tagged)
                    .await
            } else if let Some(vlan_id) = resolution.segmentation_id() {
                match port.kind() {
                    Some(PortKind::Baremetal) => {
                        info!(vlan_id, "Configuring access port");
                        self.executor
                            .conf_access_port(&target.switch_name, &target.switch_port, vlan_id)
                            .await
                    }
                    Some(PortKind::Normal | PortKind::Direct) => {
                        info!(vlan_id, "Adding VLAN to switch port trunk");
                        self.executor
                            .add_trunk_vlan(&target.switch_name, &target.switch_port, vlan_id)
                            .await
                    }
                    None => {
                        debug!("Port is not handled by this driver");
                        continue;
                    }
                }
            } else {
                debug!("Network has no VLAN, nothing to configure");
                continue;
            };

            result.map_err(|e| DriverError::configuration(&port.id, &target.switch_name, e))?;
            configured = true;
        }

        Ok(configured)
    }
}
