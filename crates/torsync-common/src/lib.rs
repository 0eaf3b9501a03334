//! Common infrastructure for the ToR switch sync driver.
//!
//! This crate holds what the reconciliation core shares with its
//! collaborators and with tests:
//!
//! - [`model`]: platform entity snapshots (networks, segments, ports, trunks)
//! - [`platform`]: the entity store and binding/provisioning callbacks
//! - [`executor`]: the switch executor trait
//! - [`inventory`]: the inventory provider trait
//! - [`lock`]: the lock service trait and its in-process implementation
//! - [`store`]: an in-memory entity store
//! - [`driver`]: the platform-facing mechanism driver trait
//! - [`shell`]: shell command execution with proper quoting
//! - [`error`]: error types
//!
//! # Example
//!
//! ```ignore
//! use torsync_common::{
//!     shell::{self, OVS_VSCTL_CMD, shellquote},
//!     error::ExecutorError,
//! };
//!
//! async fn tag_port(port: &str, vlan: u16) -> Result<(), ExecutorError> {
//!     let cmd = format!("{} set port {} tag={}", OVS_VSCTL_CMD, shellquote(port), vlan);
//!     shell::exec_or_throw(&cmd).await?;
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod lock;
pub mod model;
pub mod platform;
pub mod shell;
pub mod store;

// Re-export commonly used items at crate root
pub use driver::MechanismDriver;
pub use error::{DriverError, DriverResult, ExecutorError, LockError};
pub use executor::SwitchExecutor;
pub use inventory::Inventory;
pub use lock::{LockHandle, LockService, MemoryLockService};
pub use model::{
    BindingProfile, BindingStatus, LocalLinkInfo, Network, NetworkSegment, Port, PortBinding,
    PortKind, RequestContext, SegmentationContext, SubPort, SwitchTarget, Trunk, VifType,
    VnicType,
};
pub use platform::{BindingContext, EntityStore, NetworkContext, PortContext, Provisioning};
pub use store::{EntitySnapshot, MemoryStore};
