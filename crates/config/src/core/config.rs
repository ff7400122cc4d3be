//! Main configuration container

use std::sync::Arc;

use conductor_core::SecretStore;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::value::{coerce_scalars, get_path, insert_path, merge, scalar_to_string};
use super::{ConfigError, ConfigResult, ConfigSource};
use crate::loaders::ConfigLoader;

/// Main configuration container
///
/// Cheap to clone; clones share the merged tree.
#[derive(Clone)]
pub struct Config {
    /// Merged configuration data
    data: Arc<RwLock<Value>>,

    /// Sources, lowest precedence first
    sources: Vec<ConfigSource>,

    /// Builder-supplied defaults, the base layer
    defaults: Value,

    /// Configuration loader
    loader: Arc<dyn ConfigLoader>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Create new config (internal use only, use ConfigBuilder)
    pub(crate) fn new(
        data: Value,
        sources: Vec<ConfigSource>,
        defaults: Value,
        loader: Arc<dyn ConfigLoader>,
    ) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            sources,
            defaults,
            loader,
        }
    }

    /// Load and merge every source, lowest precedence first.
    pub(crate) fn load_all(
        sources: &[ConfigSource],
        defaults: &Value,
        loader: &dyn ConfigLoader,
    ) -> ConfigResult<Value> {
        let mut merged = defaults.clone();
        for source in sources {
            if matches!(source, ConfigSource::Default) {
                continue;
            }
            match loader.load(source) {
                Ok(data) => {
                    tracing::debug!(%source, "loaded configuration source");
                    merge(&mut merged, data);
                }
                Err(e) if source.is_optional() => {
                    tracing::warn!(%source, error = %e, "skipping optional configuration source");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(merged)
    }

    /// Get configuration value by path
    ///
    /// String scalars are coerced to booleans or numbers when the target type
    /// needs them, so values that came from environment variables still
    /// deserialize into typed sections.
    pub fn get<T>(&self, path: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        let data = self.data.read();
        let value = get_path(&data, path).ok_or_else(|| ConfigError::path_not_found(path))?;
        match T::deserialize(value) {
            Ok(v) => Ok(v),
            Err(first) => T::deserialize(coerce_scalars(value.clone())).map_err(|_| {
                ConfigError::type_error(first.to_string(), std::any::type_name::<T>(), value.to_string())
            }),
        }
    }

    /// Deserialize a whole section, or `T::default()` if the section is absent.
    pub fn section<T>(&self, path: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.get(path) {
            Err(ConfigError::PathNotFound { .. }) => Ok(T::default()),
            other => other,
        }
    }

    /// Get the scalar at `path` rendered as a string.
    pub fn get_string(&self, path: &str) -> Option<String> {
        let data = self.data.read();
        get_path(&data, path).and_then(scalar_to_string)
    }

    /// Check if configuration has a path
    pub fn has(&self, path: &str) -> bool {
        get_path(&self.data.read(), path).is_some()
    }

    /// Override a value in memory. The override is lost on [`Config::reload`].
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        insert_path(&mut self.data.write(), path, value.into());
    }

    /// Reload configuration from all sources
    pub fn reload(&self) -> ConfigResult<()> {
        tracing::info!(sources = self.sources.len(), "reloading configuration");
        let merged = Self::load_all(&self.sources, &self.defaults, self.loader.as_ref())?;
        *self.data.write() = merged;
        Ok(())
    }

    /// The sources this configuration was built from, lowest precedence first
    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }
}

impl SecretStore for Config {
    fn get(&self, key: &str) -> Option<String> {
        self.get_string(key)
    }
}
