//! Persistence layer for generated items

use crate::error::StorageError;
use crate::items::{GeneratedItem, ItemStatus, ItemStore, ItemWrite};
use crate::types::JobKind;
use parking_lot::Mutex;
use sled::{Db, Tree};
use std::sync::Arc;

const TREE_ITEMS: &str = "items";
const TREE_ITEM_INDEX: &str = "item_index";
const INDEX_KEY_PAD: usize = 20;

/// Sled-based implementation of ItemStore
#[derive(Clone)]
pub struct SledItemStore {
    db: Db,
    items: Tree,
    index: Tree,
    write_lock: Arc<Mutex<()>>,
}

impl SledItemStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let items = db.open_tree(TREE_ITEMS).map_err(StorageError::from_sled)?;
        let index = db.open_tree(TREE_ITEM_INDEX).map_err(StorageError::from_sled)?;
        Ok(Self {
            db,
            items,
            index,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn put(&self, item: &GeneratedItem) -> Result<(), StorageError> {
        let value = bincode::serialize(item).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize item {}: {}", item.id, e),
            ))
        })?;
        self.items
            .insert(item.id.to_be_bytes(), value)
            .map_err(StorageError::from_sled)?;
        Ok(())
    }

    fn lookup_index(&self, job_id: &str, index: u64) -> Result<Option<u64>, StorageError> {
        let key = index_key(job_id, index);
        let Some(raw) = self.index.get(key.as_bytes()).map_err(StorageError::from_sled)? else {
            return Ok(None);
        };
        decode_id(&raw).map(Some).ok_or_else(|| StorageError::corrupt(key, "bad id width"))
    }
}

impl ItemStore for SledItemStore {
    fn get(&self, id: u64) -> Result<Option<GeneratedItem>, StorageError> {
        match self
            .items
            .get(id.to_be_bytes())
            .map_err(StorageError::from_sled)?
        {
            Some(value) => {
                let item: GeneratedItem = bincode::deserialize(&value).map_err(|e| {
                    StorageError::IoError(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Failed to deserialize item {}: {}", id, e),
                    ))
                })?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn upsert_at_index(
        &self,
        job_id: &str,
        kind: JobKind,
        index: u64,
        title: &str,
        created_at_ms: u64,
    ) -> Result<ItemWrite, StorageError> {
        let _guard = self.write_lock.lock();
        if let Some(existing_id) = self.lookup_index(job_id, index)? {
            if let Some(mut item) = self.get(existing_id)? {
                item.title = title.to_string();
                item.created_at_ms = created_at_ms;
                item.status = ItemStatus::Published;
                self.put(&item)?;
                return Ok(ItemWrite {
                    item,
                    created: false,
                });
            }
        }

        let id = self.db.generate_id().map_err(StorageError::from_sled)?;
        let item = GeneratedItem {
            id,
            job_id: job_id.to_string(),
            kind,
            index,
            title: title.to_string(),
            created_at_ms,
            status: ItemStatus::Published,
        };
        self.put(&item)?;
        self.index
            .insert(index_key(job_id, index).as_bytes(), &id.to_be_bytes())
            .map_err(StorageError::from_sled)?;
        Ok(ItemWrite {
            item,
            created: true,
        })
    }

    fn list_for_job(&self, job_id: &str) -> Result<Vec<GeneratedItem>, StorageError> {
        let prefix = format!("{job_id}:");
        let mut out = Vec::new();
        for result in self.index.scan_prefix(prefix.as_bytes()) {
            let (key, raw) = result.map_err(StorageError::from_sled)?;
            let id = decode_id(&raw).ok_or_else(|| {
                StorageError::corrupt(String::from_utf8_lossy(&key), "bad id width")
            })?;
            if let Some(item) = self.get(id)? {
                out.push(item);
            }
        }
        out.sort_by_key(|item| (item.created_at_ms, item.id));
        Ok(out)
    }

    fn set_status(&self, id: u64, status: ItemStatus) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock();
        let Some(mut item) = self.get(id)? else {
            return Ok(false);
        };
        if item.status == status {
            return Ok(false);
        }
        item.status = status;
        self.put(&item)?;
        Ok(true)
    }

    fn remove(&self, id: u64) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock();
        let Some(item) = self.get(id)? else {
            return Ok(false);
        };
        self.index
            .remove(index_key(&item.job_id, item.index).as_bytes())
            .map_err(StorageError::from_sled)?;
        self.items
            .remove(id.to_be_bytes())
            .map_err(StorageError::from_sled)?;
        Ok(true)
    }
}

fn index_key(job_id: &str, index: u64) -> String {
    format!("{job_id}:{index:0INDEX_KEY_PAD$}")
}

fn decode_id(raw: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = raw.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
