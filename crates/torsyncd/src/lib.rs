//! torsync - top-of-rack switch synchronization driver
//!
//! Keeps physical switch VLAN and port configuration consistent with the
//! virtual network topology. Platform events (network created/deleted, port
//! bind/update/delete, trunk subport changes) are turned into VLAN creation
//! and deletion on every VLAN-managing switch and into per-port access,
//! trunk or teardown configuration on the switch ports a logical port is
//! attached to.
//!
//! Every decision is re-derived from live platform state under a per-port
//! lock, so duplicated or reordered events converge.

pub mod commands;
pub mod config;
pub mod executor;
pub mod inventory;
pub mod lock;
pub mod mech_driver;
pub mod reconciler;
pub mod replay;
pub mod resolver;
mod trunk;
pub mod usage;
pub mod vlan_lifecycle;

pub use config::{ConfigError, DriverConfig, HostConfig, NetworkOs};
pub use executor::ShellSwitchExecutor;
pub use inventory::StaticInventory;
pub use lock::PortLocks;
pub use mech_driver::TorSyncDriver;
pub use reconciler::{EnsurePort, PortReconciler};
pub use replay::{Event, EventReport, Outcome, Replayer, Scenario, ScenarioError};
pub use resolver::{Resolution, SwitchPortResolver};
pub use usage::UsageCounter;
pub use vlan_lifecycle::VlanLifecycle;
