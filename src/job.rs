//! Job domain: run configuration, job definitions and the catalog they load into.

pub mod catalog;
pub mod config;
pub mod definition;

pub use catalog::JobCatalog;
pub use config::{GenerationSettings, JobConfiguration, JobConfigurationBuilder};
pub use definition::JobDefinition;
