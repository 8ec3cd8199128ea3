//! Persistent run lock keyed by job id.
//!
//! A run holds the lock from `Starting` until `Done`, across invocations. A second
//! run for the same job id is rejected unless the holder's lock has gone stale.

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::{RunError, StorageError};
use crate::types::now_millis;

const TREE_LOCKS: &str = "run_locks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub nonce: String,
    pub refreshed_at_ms: u64,
}

#[derive(Clone)]
pub struct RunLock {
    locks: Tree,
    ttl_ms: u64,
}

impl RunLock {
    pub fn new(db: &Db, ttl_secs: u64) -> Result<Self, StorageError> {
        let locks = db.open_tree(TREE_LOCKS).map_err(StorageError::from_sled)?;
        Ok(Self {
            locks,
            ttl_ms: ttl_secs.saturating_mul(1000),
        })
    }

    pub fn holder(&self, job_id: &str) -> Result<Option<LockRecord>, StorageError> {
        let Some(raw) = self
            .locks
            .get(job_id.as_bytes())
            .map_err(StorageError::from_sled)?
        else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&raw).map_err(|e| StorageError::corrupt(job_id, e))?;
        Ok(Some(record))
    }

    /// Take the lock for `nonce`. Re-acquiring an owned lock refreshes it.
    pub fn acquire(&self, job_id: &str, nonce: &str) -> Result<(), RunError> {
        loop {
            let current = self
                .locks
                .get(job_id.as_bytes())
                .map_err(StorageError::from_sled)?;
            let now = now_millis();
            if let Some(raw) = current.as_ref() {
                let record: LockRecord =
                    serde_json::from_slice(raw).map_err(|e| StorageError::corrupt(job_id, e))?;
                let stale = now.saturating_sub(record.refreshed_at_ms) > self.ttl_ms;
                if record.nonce != nonce && !stale {
                    return Err(RunError::AlreadyRunning {
                        job_id: job_id.to_string(),
                        holder: record.nonce,
                    });
                }
                if stale && record.nonce != nonce {
                    tracing::warn!(
                        job_id = %job_id,
                        stale_holder = %record.nonce,
                        "taking over stale run lock"
                    );
                }
            }

            let next = LockRecord {
                nonce: nonce.to_string(),
                refreshed_at_ms: now,
            };
            let value = serde_json::to_vec(&next).map_err(|e| StorageError::corrupt(job_id, e))?;
            let swapped = self
                .locks
                .compare_and_swap(job_id.as_bytes(), current, Some(value))
                .map_err(StorageError::from_sled)?;
            if swapped.is_ok() {
                return Ok(());
            }
        }
    }

    /// Fails if the lock is held by a different run.
    pub fn ensure_held(&self, job_id: &str, nonce: &str) -> Result<(), RunError> {
        match self.holder(job_id)? {
            Some(record) if record.nonce != nonce => Err(RunError::AlreadyRunning {
                job_id: job_id.to_string(),
                holder: record.nonce,
            }),
            _ => self.acquire(job_id, nonce),
        }
    }

    /// Release the lock if `nonce` holds it. Returns whether anything was removed.
    pub fn release(&self, job_id: &str, nonce: &str) -> Result<bool, StorageError> {
        let Some(raw) = self
            .locks
            .get(job_id.as_bytes())
            .map_err(StorageError::from_sled)?
        else {
            return Ok(false);
        };
        let record: LockRecord =
            serde_json::from_slice(&raw).map_err(|e| StorageError::corrupt(job_id, e))?;
        if record.nonce != nonce {
            return Ok(false);
        }
        let swapped = self
            .locks
            .compare_and_swap(job_id.as_bytes(), Some(raw), None::<Vec<u8>>)
            .map_err(StorageError::from_sled)?;
        Ok(swapped.is_ok())
    }
}
