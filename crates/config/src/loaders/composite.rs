//! Dispatching loader

use std::sync::Arc;

use serde_json::Value;

use super::{ConfigLoader, EnvLoader, FileLoader};
use crate::core::{ConfigError, ConfigResult, ConfigSource};

/// Routes each source to the first loader that supports it.
#[derive(Clone)]
pub struct CompositeLoader {
    loaders: Vec<Arc<dyn ConfigLoader>>,
}

impl CompositeLoader {
    /// A loader with no delegates.
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Add a delegate; earlier delegates win.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loaders.push(loader);
        self
    }
}

impl Default for CompositeLoader {
    fn default() -> Self {
        Self::empty()
            .with_loader(Arc::new(EnvLoader))
            .with_loader(Arc::new(FileLoader))
    }
}

impl std::fmt::Debug for CompositeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeLoader")
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

impl ConfigLoader for CompositeLoader {
    fn load(&self, source: &ConfigSource) -> ConfigResult<Value> {
        self.loaders
            .iter()
            .find(|loader| loader.supports(source))
            .ok_or_else(|| ConfigError::source_error("no loader supports this source", source.to_string()))?
            .load(source)
    }

    fn supports(&self, source: &ConfigSource) -> bool {
        self.loaders.iter().any(|loader| loader.supports(source))
    }
}
