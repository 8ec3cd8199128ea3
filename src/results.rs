//! Result log: append-only record of per-item outcomes and lifecycle points.
//! Observability only; resume decisions never read from it.

pub mod entry;
pub mod store;

pub use entry::{EntryKind, LogEntry};
pub use store::{ResultLog, RunMeta};
