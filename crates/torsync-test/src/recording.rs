//! Recording switch executor
//!
//! Captures every executor call in order and fails the calls selected with
//! [`RecordingExecutor::fail_on`]. Failed calls are recorded too.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use torsync_common::error::ExecutorError;
use torsync_common::executor::SwitchExecutor;

/// Kind of executor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchOp {
    CreateVlan,
    DeleteVlan,
    ConfAccessPort,
    ConfTrunkPort,
    AddTrunkVlan,
    DeleteTrunkVlan,
    DeletePort,
}

/// One recorded executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCall {
    CreateVlan {
        switch: String,
        vlan: u16,
    },
    DeleteVlan {
        switch: String,
        vlan: u16,
    },
    ConfAccessPort {
        switch: String,
        port: String,
        vlan: u16,
    },
    ConfTrunkPort {
        switch: String,
        port: String,
        native: u16,
        tagged: Vec<u16>,
    },
    AddTrunkVlan {
        switch: String,
        port: String,
        vlan: u16,
    },
    DeleteTrunkVlan {
        switch: String,
        port: String,
        vlan: u16,
    },
    DeletePort {
        switch: String,
        port: String,
    },
}

impl SwitchCall {
    pub fn op(&self) -> SwitchOp {
        match self {
            SwitchCall::CreateVlan { .. } => SwitchOp::CreateVlan,
            SwitchCall::DeleteVlan { .. } => SwitchOp::DeleteVlan,
            SwitchCall::ConfAccessPort { .. } => SwitchOp::ConfAccessPort,
            SwitchCall::ConfTrunkPort { .. } => SwitchOp::ConfTrunkPort,
            SwitchCall::AddTrunkVlan { .. } => SwitchOp::AddTrunkVlan,
            SwitchCall::DeleteTrunkVlan { .. } => SwitchOp::DeleteTrunkVlan,
            SwitchCall::DeletePort { .. } => SwitchOp::DeletePort,
        }
    }

    pub fn switch(&self) -> &str {
        match self {
            SwitchCall::CreateVlan { switch, .. }
            | SwitchCall::DeleteVlan { switch, .. }
            | SwitchCall::ConfAccessPort { switch, .. }
            | SwitchCall::ConfTrunkPort { switch, .. }
            | SwitchCall::AddTrunkVlan { switch, .. }
            | SwitchCall::DeleteTrunkVlan { switch, .. }
            | SwitchCall::DeletePort { switch, .. } => switch,
        }
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    switch: Option<String>,
    op: Option<SwitchOp>,
}

impl FailureRule {
    fn matches(&self, call: &SwitchCall) -> bool {
        self.switch.as_deref().map_or(true, |s| s == call.switch())
            && self.op.map_or(true, |op| op == call.op())
    }
}

/// [`SwitchExecutor`] that records calls instead of touching switches.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    hosts: BTreeSet<String>,
    calls: Mutex<Vec<SwitchCall>>,
    failures: Mutex<Vec<FailureRule>>,
    delay: Option<Duration>,
}

impl RecordingExecutor {
    /// Creates an executor knowing the given switches.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sleeps inside every call, letting concurrent tasks interleave.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails calls matching the switch and operation (`None` matches any).
    pub fn fail_on(&self, switch: Option<&str>, op: Option<SwitchOp>) {
        lock(&self.failures).push(FailureRule {
            switch: switch.map(str::to_string),
            op,
        });
    }

    /// Removes all failure rules.
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Recorded calls, in call order.
    pub fn calls(&self) -> Vec<SwitchCall> {
        lock(&self.calls).clone()
    }

    /// Recorded calls of one operation.
    pub fn calls_of(&self, op: SwitchOp) -> Vec<SwitchCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.op() == op)
            .cloned()
            .collect()
    }

    /// Number of recorded calls of one operation.
    pub fn count(&self, op: SwitchOp) -> usize {
        lock(&self.calls).iter().filter(|c| c.op() == op).count()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    async fn record(&self, call: SwitchCall) -> Result<(), ExecutorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failed = lock(&self.failures).iter().any(|r| r.matches(&call));
        tracing::debug!(?call, failed, "Recorded switch call");
        let message = format!("injected failure: {:?}", call);
        lock(&self.calls).push(call);
        if failed {
            return Err(ExecutorError::Device(message));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SwitchExecutor for RecordingExecutor {
    fn has_host(&self, switch_name: &str) -> bool {
        self.hosts.contains(switch_name)
    }

    async fn create_vlan(&self, switch_name: &str, vlan_id: u16) -> Result<(), ExecutorError> {
        self.record(SwitchCall::CreateVlan {
            switch: switch_name.to_string(),
            vlan: vlan_id,
        })
        .await
    }

    async fn delete_vlan(&self, switch_name: &str, vlan_id: u16) -> Result<(), ExecutorError> {
        self.record(SwitchCall::DeleteVlan {
            switch: switch_name.to_string(),
            vlan: vlan_id,
        })
        .await
    }

    async fn conf_access_port(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError> {
        self.record(SwitchCall::ConfAccessPort {
            switch: switch_name.to_string(),
            port: switch_port.to_string(),
            vlan: vlan_id,
        })
        .await
    }

    async fn conf_trunk_port(
        &self,
        switch_name: &str,
        switch_port: &str,
        native_vlan: u16,
        tagged_vlans: &[u16],
    ) -> Result<(), ExecutorError> {
        self.record(SwitchCall::ConfTrunkPort {
            switch: switch_name.to_string(),
            port: switch_port.to_string(),
            native: native_vlan,
            tagged: tagged_vlans.to_vec(),
        })
        .await
    }

    async fn add_trunk_vlan(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError> {
        self.record(SwitchCall::AddTrunkVlan {
            switch: switch_name.to_string(),
            port: switch_port.to_string(),
            vlan: vlan_id,
        })
        .await
    }

    async fn delete_trunk_vlan(
        &self,
        switch_name: &str,
        switch_port: &str,
        vlan_id: u16,
    ) -> Result<(), ExecutorError> {
        self.record(SwitchCall::DeleteTrunkVlan {
            switch: switch_name.to_string(),
            port: switch_port.to_string(),
            vlan: vlan_id,
        })
        .await
    }

    async fn delete_port(
        &self,
        switch_name: &str,
        switch_port: &str,
    ) -> Result<(), ExecutorError> {
        self.record(SwitchCall::DeletePort {
            switch: switch_name.to_string(),
            port: switch_port.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        tokio_test::block_on(async {
            let exec = RecordingExecutor::new(["leaf-1"]);
            assert!(exec.has_host("leaf-1"));
            assert!(!exec.has_host("leaf-2"));

            exec.create_vlan("leaf-1", 100).await.unwrap();
            exec.conf_trunk_port("leaf-1", "eth1", 100, &[200, 300])
                .await
                .unwrap();

            assert_eq!(
                exec.calls(),
                vec![
                    SwitchCall::CreateVlan {
                        switch: "leaf-1".to_string(),
                        vlan: 100
                    },
                    SwitchCall::ConfTrunkPort {
                        switch: "leaf-1".to_string(),
                        port: "eth1".to_string(),
                        native: 100,
                        tagged: vec![200, 300],
                    },
                ]
            );
        });
    }

    #[test]
    fn test_failure_injection() {
        tokio_test::block_on(async {
            let exec = RecordingExecutor::new(["leaf-1", "leaf-2"]);
            exec.fail_on(Some("leaf-2"), Some(SwitchOp::CreateVlan));

            assert!(exec.create_vlan("leaf-1", 100).await.is_ok());
            assert!(exec.create_vlan("leaf-2", 100).await.is_err());
            assert!(exec.delete_vlan("leaf-2", 100).await.is_ok());
            assert_eq!(exec.count(SwitchOp::CreateVlan), 2);

            exec.clear_failures();
            assert!(exec.create_vlan("leaf-2", 100).await.is_ok());
        });
    }
}
