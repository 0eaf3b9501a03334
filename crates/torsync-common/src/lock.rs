//! Named locks serializing reconciliation of one logical port.
//!
//! A [`LockService`] hands out a [`LockHandle`] per key; the holder keeps it
//! across read-decide-apply and gives it back with
//! [`LockService::release`]. [`MemoryLockService`] keeps one async mutex per
//! key and is enough for a single process.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::LockError;

/// Proof of holding a named lock.
#[derive(Debug)]
pub struct LockHandle {
    key: String,
    token: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockHandle {
    /// Creates a handle for a lock held by an external backend.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: Uuid::new_v4(),
            guard: None,
        }
    }

    fn with_guard(key: &str, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            key: key.to_string(),
            token: Uuid::new_v4(),
            guard: Some(guard),
        }
    }

    /// Lock key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Token identifying this acquisition.
    pub fn token(&self) -> Uuid {
        self.token
    }
}

/// Distributed or local named-lock service.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Waits until the lock is granted. There is no timeout at this layer.
    async fn acquire(&self, key: &str) -> Result<LockHandle, LockError>;

    /// Releases a lock previously returned by [`LockService::acquire`].
    async fn release(&self, handle: LockHandle) -> Result<(), LockError>;
}

/// In-process lock service with one async mutex per key.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    locks: DashMap<String, Arc<Mutex<()>>>,
    holders: DashMap<String, Uuid>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the key is currently held.
    pub fn is_held(&self, key: &str) -> bool {
        self.holders.contains_key(key)
    }

    /// Number of keys with a live mutex.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = mutex.lock_owned().await;
        let handle = LockHandle::with_guard(key, guard);
        self.holders.insert(key.to_string(), handle.token);
        tracing::trace!(key = %key, "Lock acquired");
        Ok(handle)
    }

    async fn release(&self, mut handle: LockHandle) -> Result<(), LockError> {
        let held = self
            .holders
            .remove_if(&handle.key, |_, token| *token == handle.token)
            .is_some();
        if !held {
            return Err(LockError::NotHeld(handle.key.clone()));
        }

        drop(handle.guard.take());
        // Drop the mutex once nobody holds or waits on it.
        self.locks
            .remove_if(&handle.key, |_, mutex| Arc::strong_count(mutex) == 1);
        tracing::trace!(key = %handle.key, "Lock released");
        Ok(())
    }
}
