//! Configuration loader implementations

mod composite;
mod env;
pub(crate) mod file;

pub use composite::CompositeLoader;
pub use env::EnvLoader;
pub use file::FileLoader;

use serde_json::Value;

use crate::core::{ConfigResult, ConfigSource};

/// Turns one [`ConfigSource`] into a JSON tree.
pub trait ConfigLoader: Send + Sync {
    /// Load configuration from a source
    fn load(&self, source: &ConfigSource) -> ConfigResult<Value>;

    /// Check if the loader supports the given source
    fn supports(&self, source: &ConfigSource) -> bool;
}
