//! Shell command execution for switch executors.
//!
//! Commands are run through `/bin/sh -c` so that remote invocations
//! (`ssh host 'ovs-vsctl ...'`) and command chains work unchanged.
//! Arguments built from inventory or port data must go through
//! [`shellquote`].
//!
//! # Example
//!
//! ```ignore
//! use torsync_common::shell::{self, OVS_VSCTL_CMD, shellquote};
//!
//! let cmd = format!("{} set port {} tag=100", OVS_VSCTL_CMD, shellquote("eth1"));
//! shell::exec_or_throw(&cmd).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::ExecutorError;

/// Path to the `ovs-vsctl` command for Open vSwitch configuration.
pub const OVS_VSCTL_CMD: &str = "/usr/bin/ovs-vsctl";

/// Path to the `bridge` command for Linux bridge VLAN configuration.
pub const BRIDGE_CMD: &str = "/sbin/bridge";

/// Path to the `ssh` client used for remote switches.
pub const SSH_CMD: &str = "/usr/bin/ssh";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\`
/// and newline.
///
/// ```
/// use torsync_common::shell::shellquote;
///
/// assert_eq!(shellquote("eth1"), "\"eth1\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Wraps a command so that it runs on a remote switch over `ssh`.
///
/// `destination` is `host` or `user@host`. Batch mode keeps a missing key
/// from blocking on a password prompt.
pub fn remote_command(destination: &str, cmd: &str) -> String {
    format!(
        "{} -o BatchMode=yes {} {}",
        SSH_CMD,
        shellquote(destination),
        shellquote(cmd)
    )
}

/// Result of a shell command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The combined stdout output.
    pub stdout: String,
    /// The combined stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command asynchronously.
///
/// Returns the exit status and trimmed output; a non-zero exit is not an
/// error here (see [`exec_or_throw`]). Only a spawn failure is.
pub async fn exec(cmd: &str) -> Result<ExecResult, ExecutorError> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ExecutorError::Spawn {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %cmd, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Executes a shell command and throws an error on non-zero exit.
///
/// # Arguments
///
/// * `cmd` - The command string to execute
///
/// # Returns
///
/// * `Ok(String)` - The stdout output on success
/// * `Err(ExecutorError)` - If the command fails or returns non-zero
pub async fn exec_or_throw(cmd: &str) -> Result<String, ExecutorError> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(ExecutorError::CommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shellquote() {
        assert_eq!(shellquote("swp1"), "\"swp1\"");
        assert_eq!(shellquote(""), "\"\"");
        assert_eq!(shellquote("`id`"), "\"\\`id\\`\"");
        assert_eq!(shellquote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_remote_command() {
        let cmd = remote_command("admin@192.0.2.10", "/usr/bin/ovs-vsctl set port \"eth1\" tag=100");
        assert_eq!(
            cmd,
            "/usr/bin/ssh -o BatchMode=yes \"admin@192.0.2.10\" \"/usr/bin/ovs-vsctl set port \\\"eth1\\\" tag=100\""
        );
    }

    #[test]
    fn test_combined_output() {
        let both = ExecResult {
            exit_code: 1,
            stdout: "partial".to_string(),
            stderr: "no such port".to_string(),
        };
        assert!(!both.success());
        assert_eq!(both.combined_output(), "partial\nno such port");

        let quiet = ExecResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(quiet.success());
        assert_eq!(quiet.combined_output(), "");
    }

    #[tokio::test]
    async fn test_exec_runs_chains() {
        let result = exec("echo vlan100 && echo done").await.unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "vlan100\ndone");
    }

    #[tokio::test]
    async fn test_exec_stops_chain_on_failure() {
        let result = exec("false && echo unreachable").await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_exec_or_throw_reports_output() {
        let err = exec_or_throw("echo 'bridge busy' >&2; exit 3")
            .await
            .unwrap_err();
        match err {
            ExecutorError::CommandFailed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(output, "bridge busy");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quoted_argument_survives_shell() {
        let cmd = format!("echo {}", shellquote("$HOME `id`"));
        assert_eq!(exec_or_throw(&cmd).await.unwrap(), "$HOME `id`");
    }
}
