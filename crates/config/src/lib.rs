#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Conductor Config
//!
//! Layered configuration for the orchestrator and the values it resolves.
//!
//! Every source is flattened into one tree addressed by colon-separated keys
//! (`Parameters:db-password`, `ConnectionStrings:db`). Environment variables
//! use `__` in place of `:`. [`Config`] implements
//! [`conductor_core::SecretStore`], so configuration-key parameters and
//! connection strings without an inline value resolve through it.
//!
//! ```
//! use conductor_config::{ConfigBuilder, ConfigSource};
//! use conductor_core::SecretStore;
//!
//! let config = ConfigBuilder::new()
//!     .with_source(ConfigSource::Inline(
//!         r#"{"ConnectionStrings": {"db": "Host=localhost"}}"#.into(),
//!     ))
//!     .build()
//!     .unwrap();
//! assert_eq!(SecretStore::get(&config, "ConnectionStrings:db").as_deref(), Some("Host=localhost"));
//! ```

pub mod core;
pub mod loaders;

pub use crate::core::{
    Config, ConfigBuilder, ConfigError, ConfigFormat, ConfigResult, ConfigSource,
};
pub use loaders::{CompositeLoader, ConfigLoader, EnvLoader, FileLoader};
