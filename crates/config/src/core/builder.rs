//! Configuration builder

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Config, ConfigResult, ConfigSource};
use crate::loaders::{CompositeLoader, ConfigLoader};

/// Builds a [`Config`] from layered sources.
///
/// Sources are merged by [`ConfigSource::priority`]: defaults, then files,
/// then environment, then inline text. Sources of equal priority keep the
/// order they were added in, later ones winning.
pub struct ConfigBuilder {
    sources: Vec<ConfigSource>,
    defaults: Value,
    loader: Arc<dyn ConfigLoader>,
}

impl ConfigBuilder {
    /// Create an empty builder using the default loaders.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            defaults: Value::Object(Map::new()),
            loader: Arc::new(CompositeLoader::default()),
        }
    }

    /// Add a source
    #[must_use = "builder methods must be chained or built"]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Set the default values every other source overrides
    #[must_use = "builder methods must be chained or built"]
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        if !self.sources.contains(&ConfigSource::Default) {
            self.sources.push(ConfigSource::Default);
        }
        self
    }

    /// Replace the loader
    #[must_use = "builder methods must be chained or built"]
    pub fn with_loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Load every source and build the configuration
    pub fn build(mut self) -> ConfigResult<Config> {
        // stable: equal priorities keep insertion order
        self.sources
            .sort_by_key(|source| std::cmp::Reverse(source.priority()));
        let data = Config::load_all(&self.sources, &self.defaults, self.loader.as_ref())?;
        Ok(Config::new(data, self.sources, self.defaults, self.loader))
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
