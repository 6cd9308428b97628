//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config structs and TOML loading (Config, ConnectionConfig, ManagerConfig)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup validation reporting every problem at once

mod defaults;
mod types;
mod validation;

pub use types::{Config, ConfigError, ConnectionConfig, ManagerConfig};
pub use validation::{MAX_RETRIES_LIMIT, ValidationError, validate};
