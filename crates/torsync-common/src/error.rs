//! Error types for switch-port reconciliation.
//!
//! Errors fall into two classes that the platform treats differently:
//!
//! - **fatal mechanism errors** abort the triggering platform operation
//!   (unknown switch, malformed local-link information, missing network,
//!   failed VLAN provisioning or port teardown);
//! - **configuration errors** report that the switch executor failed while
//!   applying access/trunk/VLAN changes; the platform marks the binding as
//!   failed instead of aborting.
//!
//! Use [`DriverError::is_fatal`] to tell them apart.

use std::io;
use thiserror::Error;

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised by the reconciliation core.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Precondition violation (missing port, invalid switch target, ...).
    #[error("Mechanism error: {message}")]
    Mechanism {
        /// Error message.
        message: String,
    },

    /// The port's binding profile does not identify its switch attachment.
    #[error("Local link information missing or incomplete for port '{port_id}'")]
    LocalLinkInfoMissing {
        /// The logical port id.
        port_id: String,
    },

    /// The switch is not part of the inventory.
    #[error("Inventory does not contain switch '{switch}'")]
    UnknownSwitch {
        /// The switch name.
        switch: String,
    },

    /// The owning network could not be found.
    #[error("Network '{network_id}' not found")]
    NetworkNotFound {
        /// The network id.
        network_id: String,
    },

    /// VLAN provisioning or port teardown failed on a switch.
    #[error("Failed to {operation} on switch '{switch}': {source}")]
    SwitchOperation {
        /// The operation that failed (e.g., "create vlan 100").
        operation: String,
        /// The switch name.
        switch: String,
        /// The underlying executor error.
        #[source]
        source: ExecutorError,
    },

    /// Applying port configuration failed.
    #[error("Failed to configure port '{port_id}' on switch '{switch}': {source}")]
    Configuration {
        /// The logical port id.
        port_id: String,
        /// The switch name.
        switch: String,
        /// The underlying executor error.
        #[source]
        source: ExecutorError,
    },

    /// Lock acquisition or release failed.
    #[error("Lock '{key}' failed: {source}")]
    Lock {
        /// The lock key.
        key: String,
        /// The underlying lock error.
        #[source]
        source: LockError,
    },
}

impl DriverError {
    /// Creates a mechanism error.
    pub fn mechanism(message: impl Into<String>) -> Self {
        Self::Mechanism {
            message: message.into(),
        }
    }

    /// Creates a local-link-information error.
    pub fn local_link_missing(port_id: impl Into<String>) -> Self {
        Self::LocalLinkInfoMissing {
            port_id: port_id.into(),
        }
    }

    /// Creates an unknown switch error.
    pub fn unknown_switch(switch: impl Into<String>) -> Self {
        Self::UnknownSwitch {
            switch: switch.into(),
        }
    }

    /// Creates a network not found error.
    pub fn network_not_found(network_id: impl Into<String>) -> Self {
        Self::NetworkNotFound {
            network_id: network_id.into(),
        }
    }

    /// Wraps an executor failure of a switch-wide operation.
    pub fn switch_operation(
        operation: impl Into<String>,
        switch: impl Into<String>,
        source: ExecutorError,
    ) -> Self {
        Self::SwitchOperation {
            operation: operation.into(),
            switch: switch.into(),
            source,
        }
    }

    /// Wraps an executor failure while configuring a port.
    pub fn configuration(
        port_id: impl Into<String>,
        switch: impl Into<String>,
        source: ExecutorError,
    ) -> Self {
        Self::Configuration {
            port_id: port_id.into(),
            switch: switch.into(),
            source,
        }
    }

    /// Returns true if the platform must abort the triggering operation.
    ///
    /// Configuration errors are the only non-fatal class.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DriverError::Configuration { .. })
    }
}

/// Errors raised by a switch executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The host is not known to the executor.
    #[error("Unknown host '{host}'")]
    UnknownHost {
        /// The host name.
        host: String,
    },

    /// Failed to spawn a command.
    #[error("Failed to execute command '{command}': {source}")]
    Spawn {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Command returned non-zero exit code.
    #[error("Command failed: '{command}' (exit code {exit_code}): {output}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Device-level failure reported by an executor backend.
    #[error("Device error: {0}")]
    Device(String),
}

/// Errors raised by a lock service.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// The lock backend is unavailable.
    #[error("Lock backend unavailable: {0}")]
    Unavailable(String),

    /// The handle does not match the current holder.
    #[error("Lock '{0}' is not held by this handle")]
    NotHeld(String),
}
