//! Platform-facing driver interface.
//!
//! The virtual network platform calls these hooks after committing a change.
//! An error returned from a hook aborts the platform operation if
//! [`DriverError::is_fatal`](crate::error::DriverError::is_fatal) says so;
//! configuration errors only mark the binding failed.

use async_trait::async_trait;

use crate::error::DriverResult;
use crate::model::RequestContext;
use crate::platform::{NetworkContext, PortContext};

/// Mechanism driver hooks invoked by the platform.
#[async_trait]
pub trait MechanismDriver: Send + Sync {
    /// A network was created.
    async fn on_network_created(&self, ctx: &NetworkContext) -> DriverResult<()>;

    /// A network was deleted.
    async fn on_network_deleted(&self, ctx: &NetworkContext) -> DriverResult<()>;

    /// The platform asks this driver to bind a port. Returns false if the
    /// driver does not handle the port.
    async fn on_port_bind_requested(&self, ctx: &PortContext) -> DriverResult<bool>;

    /// A port was updated.
    async fn on_port_updated(&self, ctx: &PortContext) -> DriverResult<()>;

    /// A port was deleted.
    async fn on_port_deleted(&self, ctx: &PortContext) -> DriverResult<()>;

    /// Subports were added to or removed from a trunk.
    async fn on_subports_changed(
        &self,
        parent_port_id: &str,
        request: &RequestContext,
    ) -> DriverResult<()>;
}
