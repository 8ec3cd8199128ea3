//! Configuration sources, applied in this order.

pub mod environment;
pub mod global_file;
pub mod workspace_file;
