//! Driver configuration.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! hosts:
//!   leaf-1:
//!     address: 192.0.2.10
//!     user: admin
//!     network_os: openvswitch
//!     mac: "52:54:00:aa:bb:01"
//!     bridge: br-ex
//! port_mappings:
//!   compute-1:
//!     - { switch: leaf-1, port: eth1 }
//! coordination:
//!   backend: memory
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use torsync_common::model::SwitchTarget;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML document is malformed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed but is inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Command flavour of a switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkOs {
    /// Open vSwitch (`ovs-vsctl`).
    #[default]
    Openvswitch,
    /// Linux bridge with VLAN filtering (`bridge vlan`).
    LinuxBridge,
}

impl NetworkOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkOs::Openvswitch => "openvswitch",
            NetworkOs::LinuxBridge => "linux_bridge",
        }
    }

    /// Bridge used when the host config names none.
    pub fn default_bridge(&self) -> &'static str {
        match self {
            NetworkOs::Openvswitch => "br-ex",
            NetworkOs::LinuxBridge => "br0",
        }
    }
}

/// One inventory switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Management address; commands run locally when absent.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub network_os: NetworkOs,
    #[serde(default = "default_manage_vlans")]
    pub manage_vlans: bool,
    /// Chassis MAC, usable in local link information instead of the name.
    #[serde(default)]
    pub mac: Option<String>,
    /// Physical networks carried by the switch; empty means all.
    #[serde(default)]
    pub physical_networks: Vec<String>,
    #[serde(default)]
    pub bridge: Option<String>,
}

fn default_manage_vlans() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: None,
            user: None,
            network_os: NetworkOs::default(),
            manage_vlans: true,
            mac: None,
            physical_networks: Vec::new(),
            bridge: None,
        }
    }
}

impl HostConfig {
    /// `ssh` destination (`user@address` or `address`), if remote.
    pub fn ssh_destination(&self) -> Option<String> {
        let address = self.address.as_deref().filter(|a| !a.is_empty())?;
        Some(match self.user.as_deref().filter(|u| !u.is_empty()) {
            Some(user) => format!("{}@{}", user, address),
            None => address.to_string(),
        })
    }

    pub fn bridge(&self) -> &str {
        self.bridge
            .as_deref()
            .unwrap_or_else(|| self.network_os.default_bridge())
    }
}

/// Lock backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationBackend {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default)]
    pub backend: CoordinationBackend,
}

/// Top-level driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub hosts: BTreeMap<String, HostConfig>,
    /// Compute host id (`host` or `host-<pci_slot>`) to switch targets.
    #[serde(default)]
    pub port_mappings: BTreeMap<String, Vec<SwitchTarget>>,
    #[serde(default)]
    pub coordination: CoordinationConfig,
}

impl DriverConfig {
    /// Loads and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = self.hosts.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "host name '{}' must not be empty",
                name
            )));
        }

        for (host_id, targets) in &self.port_mappings {
            for target in targets {
                if !self.hosts.contains_key(&target.switch_name) {
                    return Err(ConfigError::Invalid(format!(
                        "port mapping '{}' references unknown switch '{}'",
                        host_id, target.switch_name
                    )));
                }
                if target.switch_port.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "port mapping '{}' has an empty port on switch '{}'",
                        host_id, target.switch_name
                    )));
                }
            }
        }

        Ok(())
    }
}
