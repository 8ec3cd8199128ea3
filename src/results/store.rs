//! Durable sled-backed result log.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::error::StorageError;
use crate::results::entry::LogEntry;
use crate::types::now_millis;

const TREE_ENTRIES: &str = "result_entries";
const TREE_META: &str = "result_meta";
const SEQ_KEY_PAD: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub next_seq: u64,
    pub started_at_ms: u64,
    pub updated_at_ms: u64,
}

#[derive(Clone)]
pub struct ResultLog {
    entries: Tree,
    meta: Tree,
    append_lock: Arc<Mutex<()>>,
}

impl ResultLog {
    pub fn new(db: &Db) -> Result<Self, StorageError> {
        let entries = db.open_tree(TREE_ENTRIES).map_err(StorageError::from_sled)?;
        let meta = db.open_tree(TREE_META).map_err(StorageError::from_sled)?;
        Ok(Self {
            entries,
            meta,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Append an entry, assigning the next sequence number of its run.
    pub fn append(&self, mut entry: LogEntry) -> Result<u64, StorageError> {
        let _guard = self.append_lock.lock();
        let run_key = run_key(&entry.job_id, &entry.nonce);
        let now = now_millis();
        let mut meta = self.get_meta(&entry.job_id, &entry.nonce)?.unwrap_or(RunMeta {
            next_seq: 1,
            started_at_ms: now,
            updated_at_ms: now,
        });
        entry.seq = meta.next_seq;
        let key = encode_entry_key(&entry.job_id, &entry.nonce, entry.seq);
        let value = serde_json::to_vec(&entry).map_err(|e| StorageError::corrupt(&key, e))?;
        self.entries
            .insert(key.as_bytes(), value)
            .map_err(StorageError::from_sled)?;

        meta.next_seq += 1;
        meta.updated_at_ms = now;
        let meta_value = serde_json::to_vec(&meta).map_err(|e| StorageError::corrupt(&run_key, e))?;
        self.meta
            .insert(run_key.as_bytes(), meta_value)
            .map_err(StorageError::from_sled)?;
        Ok(entry.seq)
    }

    pub fn get_meta(&self, job_id: &str, nonce: &str) -> Result<Option<RunMeta>, StorageError> {
        let key = run_key(job_id, nonce);
        let Some(raw) = self.meta.get(key.as_bytes()).map_err(StorageError::from_sled)? else {
            return Ok(None);
        };
        let meta = serde_json::from_slice(&raw).map_err(|e| StorageError::corrupt(&key, e))?;
        Ok(Some(meta))
    }

    pub fn read_run(&self, job_id: &str, nonce: &str) -> Result<Vec<LogEntry>, StorageError> {
        self.read_after(job_id, nonce, 0)
    }

    pub fn read_after(
        &self,
        job_id: &str,
        nonce: &str,
        after_seq: u64,
    ) -> Result<Vec<LogEntry>, StorageError> {
        let prefix = format!("{}:", run_key(job_id, nonce));
        let mut out = Vec::new();
        for result in self.entries.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result.map_err(StorageError::from_sled)?;
            let parsed: LogEntry = serde_json::from_slice(&value)
                .map_err(|e| StorageError::corrupt(String::from_utf8_lossy(&key), e))?;
            if parsed.seq > after_seq {
                out.push(parsed);
            }
        }
        out.sort_by_key(|e| e.seq);
        Ok(out)
    }

    /// Runs recorded for a job, newest first.
    pub fn runs(&self, job_id: &str) -> Result<Vec<(String, RunMeta)>, StorageError> {
        let prefix = format!("{job_id}:");
        let mut out = Vec::new();
        for result in self.meta.scan_prefix(prefix.as_bytes()) {
            let (key, value) = result.map_err(StorageError::from_sled)?;
            let key = String::from_utf8_lossy(&key).to_string();
            let meta: RunMeta =
                serde_json::from_slice(&value).map_err(|e| StorageError::corrupt(&key, e))?;
            let nonce = key[prefix.len()..].to_string();
            out.push((nonce, meta));
        }
        out.sort_by(|(a_nonce, a), (b_nonce, b)| {
            b.started_at_ms
                .cmp(&a.started_at_ms)
                .then_with(|| b_nonce.cmp(a_nonce))
        });
        Ok(out)
    }

    pub fn latest_run(&self, job_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.runs(job_id)?.into_iter().next().map(|(nonce, _)| nonce))
    }

    /// Keep the newest `keep` runs of a job and drop the rest.
    pub fn prune_runs(&self, job_id: &str, keep: usize) -> Result<usize, StorageError> {
        let mut removed = 0usize;
        for (nonce, _) in self.runs(job_id)?.into_iter().skip(keep) {
            self.delete_run(job_id, &nonce)?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn delete_run(&self, job_id: &str, nonce: &str) -> Result<(), StorageError> {
        let run_key = run_key(job_id, nonce);
        self.meta
            .remove(run_key.as_bytes())
            .map_err(StorageError::from_sled)?;
        let prefix = format!("{run_key}:");
        let keys: Vec<Vec<u8>> = self
            .entries
            .scan_prefix(prefix.as_bytes())
            .filter_map(|r| r.ok().map(|(k, _)| k.to_vec()))
            .collect();
        for key in keys {
            self.entries.remove(key).map_err(StorageError::from_sled)?;
        }
        Ok(())
    }

    pub fn encode_entry_key(job_id: &str, nonce: &str, seq: u64) -> String {
        encode_entry_key(job_id, nonce, seq)
    }
}

fn run_key(job_id: &str, nonce: &str) -> String {
    format!("{job_id}:{nonce}")
}

fn encode_entry_key(job_id: &str, nonce: &str, seq: u64) -> String {
    format!("{job_id}:{nonce}:{seq:0SEQ_KEY_PAD$}")
}
