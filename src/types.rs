//! Shared primitives: job kinds, timestamps and run-nonce generation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NONCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// What a job produces. Selects executor behaviour and maintenance defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Content,
    Terms,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Content => "content",
            JobKind::Terms => "terms",
        }
    }

    /// Singular noun used in item messages.
    pub fn item_noun(self) -> &'static str {
        match self {
            JobKind::Content => "content item",
            JobKind::Terms => "term",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a run-nonce. Zero padding keeps nonces from one process
/// lexicographically increasing.
pub fn new_run_nonce() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = NONCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts:013}-{pid}-{seq:06}")
}
