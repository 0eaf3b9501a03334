//! Test infrastructure for the ToR switch sync driver
//!
//! Provides:
//! - Entity builders for networks, ports and trunks
//! - A recording switch executor with failure injection
//! - A configurable fake inventory

pub mod fixtures;
mod inventory;
mod recording;

pub use fixtures::*;
pub use inventory::FakeInventory;
pub use recording::{RecordingExecutor, SwitchCall, SwitchOp};
