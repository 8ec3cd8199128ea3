//! The sled database and the stores opened on it.

use std::path::Path;
use std::sync::Arc;

use sled::Db;

use crate::cursor::{RunLock, SledCursorStore};
use crate::error::StorageError;
use crate::generation::hooks::SledHookLedger;
use crate::items::SledItemStore;
use crate::results::ResultLog;

#[derive(Clone)]
pub struct RunStores {
    pub db: Db,
    pub cursors: Arc<SledCursorStore>,
    pub locks: RunLock,
    pub ledger: Arc<SledHookLedger>,
    pub results: ResultLog,
    pub items: Arc<SledItemStore>,
}

impl RunStores {
    pub fn open(path: &Path, lock_ttl_secs: u64) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path).map_err(StorageError::from_sled)?;
        tracing::debug!(store_path = %path.display(), "opened store");
        Self::from_db(db, lock_ttl_secs)
    }

    /// Throwaway stores, removed when dropped.
    pub fn temporary(lock_ttl_secs: u64) -> Result<Self, StorageError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(StorageError::from_sled)?;
        Self::from_db(db, lock_ttl_secs)
    }

    pub fn from_db(db: Db, lock_ttl_secs: u64) -> Result<Self, StorageError> {
        Ok(Self {
            cursors: Arc::new(SledCursorStore::new(db.clone())?),
            locks: RunLock::new(&db, lock_ttl_secs)?,
            ledger: Arc::new(SledHookLedger::new(db.clone())?),
            results: ResultLog::new(&db)?,
            items: Arc::new(SledItemStore::new(db.clone())?),
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(StorageError::from_sled)?;
        Ok(())
    }
}
