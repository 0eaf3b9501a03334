//! Shell-backed switch executor.
//!
//! Builds the device command for the switch's network OS, wraps it in `ssh`
//! for remote switches and runs it through the shared shell helpers.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use torsync_common::error::ExecutorError;
use torsync_common::executor::SwitchExecutor;
use torsync_common::shell;
use tracing::{debug, info};

use crate::commands;
use crate::config::{DriverConfig, HostConfig};

/// Runs switch commands locally or over `ssh`.
pub struct ShellSwitchExecutor {
    hosts: BTreeMap<String, HostConfig>,
    /// Record commands instead of running them.
    dry_run: bool,
    captured_commands: Mutex<Vec<String>>,
}

impl ShellSwitchExecutor {
    pub fn new(hosts: BTreeMap<String, HostConfig>) -> Self {
        Self {
            hosts,
            dry_run: false,
            captured_commands: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.hosts.clone())
    }

    /// Enables dry-run mode: commands are logged and captured, never run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Commands issued so far in dry-run mode, as they would be run.
    pub fn captured_commands(&self) -> Vec<String> {
        self.captured().clone()
    }

    fn captured(&self) -> MutexGuard<'_, Vec<String>> {
        self.captured_commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn host(&self, switch_name: &str) -> Result<&HostConfig, ExecutorError> {
        self.hosts
            .get(switch_name)
            .ok_or_else(|| ExecutorError::UnknownHost {
                host: switch_name.to_string(),
            })
    }

    /// Runs a device command on the switch.
    async fn exec(
        &self,
        switch_name: &str,
        host: &HostConfig,
        cmd: &str,
    ) -> Result<(), ExecutorError> {
        let cmd = match host.ssh_destination() {
            Some(destination) => shell::remote_command(&destination, cmd),
            None => cmd.to_string(),
        };

        if self.dry_run {
            info!(switch = %switch_name, command = %cmd, "Dry-run exec");
            self.captured().push(cmd);
            return Ok(());
        }

        debug!(switch = %switch_name, "Running switch command");
        shell::exec_or_throw(&cmd).await?;
        Ok(())
    }
}

#[async_trait]
impl SwitchExecutor for ShellSwitchExecutor {
    fn has_host(&self, switch_name: &str) -> bool {
        self.hosts.contains_key(switch_name)
    }

    async fn create_vlan(&self, switch_name: &str, vlan_id: u16) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd = commands::build_create_vlan_cmd(host.network_os, host.bridge(), vlan_id);
        self.exec(switch_name, host, &cmd).await
    }

    async fn delete_vlan(&self, switch_name: &str, vlan_id: u16) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd = commands::build_delete_vlan_cmd(host.network_os, host.bridge(), vlan_id);
        self.exec(switch_name, host, &cmd).await
    }

    async fn conf_access_port(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd = commands::build_access_port_cmd(host.network_os, switch_port, vlan_id);
        self.exec(switch_name, host, &cmd).await
    }

    async fn conf_trunk_port(
        &self,
        switch_name: &str,
        switch_port: &str,
        native_vlan: u16,
        tagged_vlans: &[u16],
    ) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd =
            commands::build_trunk_port_cmd(host.network_os, switch_port, native_vlan, tagged_vlans);
        self.exec(switch_name, host, &cmd).await
    }

    async fn add_trunk_vlan(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd = commands::build_add_trunk_vlan_cmd(host.network_os, switch_port, vlan_id);
        self.exec(switch_name, host, &cmd).await
    }

    async fn delete_trunk_vlan(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd = commands::build_delete_trunk_vlan_cmd(host.network_os, switch_port, vlan_id);
        self.exec(switch_name, host, &cmd).await
    }

    async fn delete_port(
        &self,
        switch_name: &str,
        switch_port: &str,
    ) -> Result<(), ExecutorError> {
        let host = self.host(switch_name)?;
        let cmd = commands::build_delete_port_cmd(host.network_os, switch_port);
        self.exec(switch_name, host, &cmd).await
    }
}
