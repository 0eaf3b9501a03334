//! Shell command builders for switch operations
//!
//! Each builder returns one command line for the host's network OS. Linux
//! bridge operations that need several `bridge` invocations are chained
//! with `&&` so a single line is sent per operation.

use torsync_common::shell;

use crate::config::NetworkOs;

/// Prefix of the per-VLAN fake bridges created on Open vSwitch.
pub const OVS_VLAN_BRIDGE_PREFIX: &str = "vlan";

/// VLAN range cleared when a Linux bridge port is torn down.
pub const LINUX_BRIDGE_VLAN_RANGE: &str = "1-4094";

/// Default VLAN restored on a torn down Linux bridge port.
pub const LINUX_BRIDGE_DEFAULT_VLAN: u16 = 1;

fn ovs_vlan_bridge(vlan_id: u16) -> String {
    format!("{}{}", OVS_VLAN_BRIDGE_PREFIX, vlan_id)
}

fn join_vlans(vlans: impl IntoIterator<Item = u16>) -> String {
    vlans
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Build create VLAN command
pub fn build_create_vlan_cmd(os: NetworkOs, bridge: &str, vlan_id: u16) -> String {
    match os {
        NetworkOs::Openvswitch => format!(
            "{} --may-exist add-br {} {} {}",
            shell::OVS_VSCTL_CMD,
            shell::shellquote(&ovs_vlan_bridge(vlan_id)),
            shell::shellquote(bridge),
            vlan_id
        ),
        NetworkOs::LinuxBridge => format!(
            "{} vlan add vid {} dev {} self",
            shell::BRIDGE_CMD,
            vlan_id,
            shell::shellquote(bridge)
        ),
    }
}

/// Build delete VLAN command
pub fn build_delete_vlan_cmd(os: NetworkOs, bridge: &str, vlan_id: u16) -> String {
    match os {
        NetworkOs::Openvswitch => format!(
            "{} --if-exists del-br {}",
            shell::OVS_VSCTL_CMD,
            shell::shellquote(&ovs_vlan_bridge(vlan_id))
        ),
        NetworkOs::LinuxBridge => format!(
            "{} vlan del vid {} dev {} self",
            shell::BRIDGE_CMD,
            vlan_id,
            shell::shellquote(bridge)
        ),
    }
}

/// Build access port command
pub fn build_access_port_cmd(os: NetworkOs, port: &str, vlan_id: u16) -> String {
    let port_quoted = shell::shellquote(port);
    match os {
        NetworkOs::Openvswitch => format!(
            "{} set port {} tag={} vlan_mode=access -- clear port {} trunks",
            shell::OVS_VSCTL_CMD,
            port_quoted,
            vlan_id,
            port_quoted
        ),
        NetworkOs::LinuxBridge => format!(
            "{} && {} vlan add vid {} dev {} pvid untagged",
            build_clear_linux_bridge_port_cmd(&port_quoted),
            shell::BRIDGE_CMD,
            vlan_id,
            port_quoted
        ),
    }
}

/// Build trunk port command
///
/// The native VLAN carries untagged traffic; `tagged_vlans` keep their
/// order.
pub fn build_trunk_port_cmd(
    os: NetworkOs,
    port: &str,
    native_vlan: u16,
    tagged_vlans: &[u16],
) -> String {
    let port_quoted = shell::shellquote(port);
    match os {
        NetworkOs::Openvswitch => format!(
            "{} set port {} vlan_mode=native-untagged tag={} trunks={}",
            shell::OVS_VSCTL_CMD,
            port_quoted,
            native_vlan,
            join_vlans(std::iter::once(native_vlan).chain(tagged_vlans.iter().copied()))
        ),
        NetworkOs::LinuxBridge => {
            let mut parts = vec![
                build_clear_linux_bridge_port_cmd(&port_quoted),
                format!(
                    "{} vlan add vid {} dev {} pvid untagged",
                    shell::BRIDGE_CMD,
                    native_vlan,
                    port_quoted
                ),
            ];
            parts.extend(tagged_vlans.iter().map(|vlan_id| {
                format!(
                    "{} vlan add vid {} dev {}",
                    shell::BRIDGE_CMD,
                    vlan_id,
                    port_quoted
                )
            }));
            parts.join(" && ")
        }
    }
}

/// Build add trunk VLAN command
pub fn build_add_trunk_vlan_cmd(os: NetworkOs, port: &str, vlan_id: u16) -> String {
    match os {
        NetworkOs::Openvswitch => format!(
            "{} add port {} trunks {}",
            shell::OVS_VSCTL_CMD,
            shell::shellquote(port),
            vlan_id
        ),
        NetworkOs::LinuxBridge => format!(
            "{} vlan add vid {} dev {}",
            shell::BRIDGE_CMD,
            vlan_id,
            shell::shellquote(port)
        ),
    }
}

/// Build delete trunk VLAN command
pub fn build_delete_trunk_vlan_cmd(os: NetworkOs, port: &str, vlan_id: u16) -> String {
    match os {
        NetworkOs::Openvswitch => format!(
            "{} remove port {} trunks {}",
            shell::OVS_VSCTL_CMD,
            shell::shellquote(port),
            vlan_id
        ),
        NetworkOs::LinuxBridge => format!(
            "{} vlan del vid {} dev {}",
            shell::BRIDGE_CMD,
            vlan_id,
            shell::shellquote(port)
        ),
    }
}

/// Build delete port command
///
/// Returns the switch port to its unconfigured state.
pub fn build_delete_port_cmd(os: NetworkOs, port: &str) -> String {
    let port_quoted = shell::shellquote(port);
    match os {
        NetworkOs::Openvswitch => format!(
            "{cmd} clear port {p} tag -- clear port {p} trunks -- clear port {p} vlan_mode",
            cmd = shell::OVS_VSCTL_CMD,
            p = port_quoted
        ),
        NetworkOs::LinuxBridge => format!(
            "{} && {} vlan add vid {} dev {} pvid untagged",
            build_clear_linux_bridge_port_cmd(&port_quoted),
            shell::BRIDGE_CMD,
            LINUX_BRIDGE_DEFAULT_VLAN,
            port_quoted
        ),
    }
}

fn build_clear_linux_bridge_port_cmd(port_quoted: &str) -> String {
    format!(
        "{} vlan del vid {} dev {}",
        shell::BRIDGE_CMD,
        LINUX_BRIDGE_VLAN_RANGE,
        port_quoted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ovs_create_vlan() {
        let cmd = build_create_vlan_cmd(NetworkOs::Openvswitch, "br-ex", 100);
        assert_eq!(
            cmd,
            "/usr/bin/ovs-vsctl --may-exist add-br \"vlan100\" \"br-ex\" 100"
        );
    }

    #[test]
    fn test_ovs_delete_vlan() {
        let cmd = build_delete_vlan_cmd(NetworkOs::Openvswitch, "br-ex", 100);
        assert_eq!(cmd, "/usr/bin/ovs-vsctl --if-exists del-br \"vlan100\"");
    }

    #[test]
    fn test_ovs_access_port() {
        let cmd = build_access_port_cmd(NetworkOs::Openvswitch, "eth1", 100);
        assert_eq!(
            cmd,
            "/usr/bin/ovs-vsctl set port \"eth1\" tag=100 vlan_mode=access -- clear port \"eth1\" trunks"
        );
    }

    #[test]
    fn test_ovs_trunk_port_keeps_order() {
        let cmd = build_trunk_port_cmd(NetworkOs::Openvswitch, "eth1", 100, &[300, 200]);
        assert_eq!(
            cmd,
            "/usr/bin/ovs-vsctl set port \"eth1\" vlan_mode=native-untagged tag=100 trunks=100,300,200"
        );
    }

    #[test]
    fn test_ovs_trunk_vlans() {
        assert_eq!(
            build_add_trunk_vlan_cmd(NetworkOs::Openvswitch, "eth5", 100),
            "/usr/bin/ovs-vsctl add port \"eth5\" trunks 100"
        );
        assert_eq!(
            build_delete_trunk_vlan_cmd(NetworkOs::Openvswitch, "eth5", 100),
            "/usr/bin/ovs-vsctl remove port \"eth5\" trunks 100"
        );
    }

    #[test]
    fn test_ovs_delete_port() {
        let cmd = build_delete_port_cmd(NetworkOs::Openvswitch, "eth1");
        assert!(cmd.contains("clear port \"eth1\" tag"));
        assert!(cmd.contains("clear port \"eth1\" trunks"));
        assert!(cmd.contains("clear port \"eth1\" vlan_mode"));
    }

    #[test]
    fn test_linux_bridge_vlan() {
        assert_eq!(
            build_create_vlan_cmd(NetworkOs::LinuxBridge, "br0", 100),
            "/sbin/bridge vlan add vid 100 dev \"br0\" self"
        );
        assert_eq!(
            build_delete_vlan_cmd(NetworkOs::LinuxBridge, "br0", 100),
            "/sbin/bridge vlan del vid 100 dev \"br0\" self"
        );
    }

    #[test]
    fn test_linux_bridge_access_port() {
        let cmd = build_access_port_cmd(NetworkOs::LinuxBridge, "swp1", 100);
        assert_eq!(
            cmd,
            "/sbin/bridge vlan del vid 1-4094 dev \"swp1\" && \
             /sbin/bridge vlan add vid 100 dev \"swp1\" pvid untagged"
        );
    }

    #[test]
    fn test_linux_bridge_trunk_port() {
        let cmd = build_trunk_port_cmd(NetworkOs::LinuxBridge, "swp1", 100, &[200, 300]);
        let parts: Vec<&str> = cmd.split(" && ").collect();
        assert_eq!(parts.len(), 4);
        assert!(parts[1].ends_with("vid 100 dev \"swp1\" pvid untagged"));
        assert!(parts[2].ends_with("vid 200 dev \"swp1\""));
        assert!(parts[3].ends_with("vid 300 dev \"swp1\""));
    }

    #[test]
    fn test_linux_bridge_delete_port_restores_default() {
        let cmd = build_delete_port_cmd(NetworkOs::LinuxBridge, "swp1");
        assert!(cmd.starts_with("/sbin/bridge vlan del vid 1-4094 dev \"swp1\""));
        assert!(cmd.ends_with("vlan add vid 1 dev \"swp1\" pvid untagged"));
    }

    #[test]
    fn test_port_name_quoted() {
        let cmd = build_add_trunk_vlan_cmd(NetworkOs::LinuxBridge, "eth$1", 100);
        assert!(cmd.contains("\"eth\\$1\""));
    }
}
