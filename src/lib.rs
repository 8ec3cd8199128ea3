//! Bulkgen: resumable batch generation of content items and taxonomy terms.
//!
//! A job's rows are processed in fixed-size steps by a [`generation::GenerationDriver`].
//! Progress lives in a persisted [`cursor::ProgressCursor`], so an interrupted run
//! resumes from its last committed offset. Start and finish hooks fire once per run.

pub mod cli;
pub mod config;
pub mod cursor;
pub mod error;
pub mod generation;
pub mod items;
pub mod job;
pub mod logging;
pub mod maintenance;
pub mod results;
pub mod storage;
pub mod types;
pub mod wire;
