//! Builders
//!
//! Fluent builder for Procore client configuration.

pub mod config;

pub use config::{procore_config, ProcoreConfigBuilder};
