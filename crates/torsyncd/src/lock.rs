//! Per-port lock coordination.

use std::future::Future;
use std::sync::Arc;

use torsync_common::error::{DriverError, DriverResult};
use torsync_common::lock::LockService;
use tracing::warn;

/// Serializes reconciliations of the same logical port.
#[derive(Clone)]
pub struct PortLocks {
    service: Arc<dyn LockService>,
}

impl PortLocks {
    pub fn new(service: Arc<dyn LockService>) -> Self {
        Self { service }
    }

    /// Lock key of a logical port.
    pub fn key(port_id: &str) -> String {
        format!("port:{}", port_id)
    }

    /// Runs `work` while holding the port's lock.
    ///
    /// The lock is released on every exit path. An error from `work` wins
    /// over a release failure, which is only logged in that case.
    pub async fn with_lock<T, F>(&self, port_id: &str, work: F) -> DriverResult<T>
    where
        F: Future<Output = DriverResult<T>>,
    {
        let key = Self::key(port_id);
        let handle = self
            .service
            .acquire(&key)
            .await
            .map_err(|source| DriverError::Lock {
                key: key.clone(),
                source,
            })?;

        let result = work.await;

        match (result, self.service.release(handle).await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(source)) => Err(DriverError::Lock { key, source }),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(source)) => {
                warn!(key = %key, error = %source, "Failed to release lock after error");
                Err(e)
            }
        }
    }
}
