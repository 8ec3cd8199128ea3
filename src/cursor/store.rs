//! Cursor persistence: a single logical owner per job id reads and writes it.

use std::collections::HashMap;

use parking_lot::Mutex;
use sled::{Db, Tree};

use crate::cursor::ProgressCursor;
use crate::error::StorageError;

const TREE_CURSORS: &str = "cursors";

pub trait CursorStore: Send + Sync {
    fn load(&self, job_id: &str) -> Result<Option<ProgressCursor>, StorageError>;

    /// Write `cursor`. A cancel already persisted for the same run is kept
    /// even when `cursor` predates it.
    fn save(&self, cursor: &ProgressCursor) -> Result<(), StorageError>;

    fn clear(&self, job_id: &str) -> Result<(), StorageError>;

    /// Set the persisted cancelled flag. Returns false when no cursor exists
    /// or the run is already done.
    fn mark_cancelled(&self, job_id: &str) -> Result<bool, StorageError> {
        let Some(mut cursor) = self.load(job_id)? else {
            return Ok(false);
        };
        if cursor.is_done() {
            return Ok(false);
        }
        cursor.cancel();
        cursor.touch();
        self.save(&cursor)?;
        Ok(true)
    }
}

#[derive(Clone)]
pub struct SledCursorStore {
    db: Db,
    cursors: Tree,
}

impl SledCursorStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let cursors = db.open_tree(TREE_CURSORS).map_err(StorageError::from_sled)?;
        Ok(Self { db, cursors })
    }
}

impl SledCursorStore {
    /// Compare-and-swap loop over one job's cursor. `next` sees the stored
    /// cursor and returns what to write, or `None` to leave it untouched.
    fn swap<F>(&self, job_id: &str, next: F) -> Result<bool, StorageError>
    where
        F: Fn(Option<&ProgressCursor>) -> Option<ProgressCursor>,
    {
        let key = job_id.as_bytes();
        loop {
            let current = self.cursors.get(key).map_err(StorageError::from_sled)?;
            // An undecodable record is replaced rather than merged.
            let stored = current
                .as_ref()
                .and_then(|raw| serde_json::from_slice::<ProgressCursor>(raw).ok());
            let Some(cursor) = next(stored.as_ref()) else {
                return Ok(false);
            };
            let value =
                serde_json::to_vec(&cursor).map_err(|e| StorageError::corrupt(job_id, e))?;
            let swapped = self
                .cursors
                .compare_and_swap(key, current, Some(value))
                .map_err(StorageError::from_sled)?;
            if swapped.is_ok() {
                // The next step may only be issued once this one is durable.
                self.db.flush().map_err(StorageError::from_sled)?;
                return Ok(true);
            }
        }
    }
}

/// Whether the stored cursor carries a cancel that `incoming` would drop.
fn keeps_cancel(stored: &ProgressCursor, incoming: &ProgressCursor) -> bool {
    stored.nonce == incoming.nonce && stored.cancelled && !incoming.cancelled
}

impl CursorStore for SledCursorStore {
    fn load(&self, job_id: &str) -> Result<Option<ProgressCursor>, StorageError> {
        let Some(raw) = self
            .cursors
            .get(job_id.as_bytes())
            .map_err(StorageError::from_sled)?
        else {
            return Ok(None);
        };
        let cursor = serde_json::from_slice(&raw).map_err(|e| StorageError::corrupt(job_id, e))?;
        Ok(Some(cursor))
    }

    fn save(&self, cursor: &ProgressCursor) -> Result<(), StorageError> {
        self.swap(&cursor.job_id, |stored| {
            let mut next = cursor.clone();
            if stored.is_some_and(|stored| keeps_cancel(stored, cursor)) {
                next.cancel();
            }
            Some(next)
        })?;
        Ok(())
    }

    fn mark_cancelled(&self, job_id: &str) -> Result<bool, StorageError> {
        let written = self.swap(job_id, |stored| {
            let mut next = stored.filter(|c| !c.is_done())?.clone();
            next.cancel();
            next.touch();
            Some(next)
        })?;
        Ok(written)
    }

    fn clear(&self, job_id: &str) -> Result<(), StorageError> {
        self.cursors
            .remove(job_id.as_bytes())
            .map_err(StorageError::from_sled)?;
        Ok(())
    }
}

/// Non-durable store for dry runs and embedding in tests.
#[derive(Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, ProgressCursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, job_id: &str) -> Result<Option<ProgressCursor>, StorageError> {
        Ok(self.cursors.lock().get(job_id).cloned())
    }

    fn save(&self, cursor: &ProgressCursor) -> Result<(), StorageError> {
        let mut cursors = self.cursors.lock();
        let mut next = cursor.clone();
        if cursors
            .get(&cursor.job_id)
            .is_some_and(|stored| keeps_cancel(stored, cursor))
        {
            next.cancel();
        }
        cursors.insert(cursor.job_id.clone(), next);
        Ok(())
    }

    fn mark_cancelled(&self, job_id: &str) -> Result<bool, StorageError> {
        let mut cursors = self.cursors.lock();
        match cursors.get_mut(job_id) {
            Some(cursor) if !cursor.is_done() => {
                cursor.cancel();
                cursor.touch();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn clear(&self, job_id: &str) -> Result<(), StorageError> {
        self.cursors.lock().remove(job_id);
        Ok(())
    }
}
