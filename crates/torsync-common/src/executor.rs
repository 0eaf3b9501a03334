//! Switch executor interface.
//!
//! The executor applies device-level configuration on a switch. The driver
//! never inspects switch state through it; every decision is derived from
//! the platform's entities.

use async_trait::async_trait;

use crate::error::ExecutorError;

/// Applies VLAN and port configuration on inventory switches.
#[async_trait]
pub trait SwitchExecutor: Send + Sync {
    /// Returns true if the switch is part of the inventory.
    fn has_host(&self, switch_name: &str) -> bool;

    /// Creates a VLAN on the switch.
    async fn create_vlan(&self, switch_name: &str, vlan_id: u16) -> Result<(), ExecutorError>;

    /// Deletes a VLAN from the switch.
    async fn delete_vlan(&self, switch_name: &str, vlan_id: u16) -> Result<(), ExecutorError>;

    /// Puts the switch port in access mode on the VLAN.
    async fn conf_access_port(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError>;

    /// Puts the switch port in trunk mode with a native VLAN and the given
    /// tagged VLANs, in order.
    async fn conf_trunk_port(
        &self,
        switch_name: &str,
        switch_port: &str,
        native_vlan: u16,
        tagged_vlans: &[u16],
    ) -> Result<(), ExecutorError>;

    /// Adds a tagged VLAN to the switch port's existing trunk.
    async fn add_trunk_vlan(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError>;

    /// Removes a tagged VLAN from the switch port's trunk.
    async fn delete_trunk_vlan(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError>;

    /// Removes all VLAN configuration from the switch port.
    async fn delete_port(&self, switch_name: &str, switch_port: &str)
        -> Result<(), ExecutorError>;
}
