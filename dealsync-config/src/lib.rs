//! Configuration for the deal sync service.
//!
//! Holds the typed configuration consumed by the reconciliation engine and the service binary,
//! plus the hierarchical loader that reads it from files and `APP_`-prefixed environment
//! variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
