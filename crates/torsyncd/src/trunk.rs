//! Trunk subport propagation.
//!
//! When subports are added to or removed from a trunk, the parent's switch
//! ports are reconfigured with the new tagged VLAN list.

use torsync_common::error::DriverResult;
use torsync_common::model::RequestContext;
use tracing::{debug, instrument};

use crate::reconciler::PortReconciler;

impl PortReconciler {
    /// Reapplies the trunk configuration of a parent port on all its
    /// switch ports. A parent that no longer exists is a no-op.
    #[instrument(skip(self, ctx))]
    pub async fn ensure_subports(
        &self,
        parent_port_id: &str,
        ctx: &RequestContext,
    ) -> DriverResult<()> {
        let Some(parent) = self.store.get_port(ctx, parent_port_id) else {
            debug!("Trunk parent port not found, nothing to do");
            return Ok(());
        };
        let resolution = self.resolver.resolve(&parent, None)?;

        for target in &resolution.targets {
            self.locks
                .with_lock(parent_port_id, async {
                    let Some(live) = self.store.get_port(ctx, parent_port_id) else {
                        debug!(switch = %target, "Trunk parent port deleted, skipping");
                        return Ok(());
                    };
                    self.set_port_state(&live, ctx, &target.switch_name, &target.switch_port)
                        .await
                        .map(|_| ())
                })
                .await?;
        }
        Ok(())
    }
}
