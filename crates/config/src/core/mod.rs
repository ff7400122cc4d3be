//! Core configuration functionality

pub mod builder;
pub mod config;
pub mod error;
pub mod source;
pub mod value;

pub use builder::ConfigBuilder;
pub use config::Config;
pub use error::{ConfigError, ConfigResult};
pub use source::{ConfigFormat, ConfigSource};
