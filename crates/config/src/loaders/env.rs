//! Environment variable loader

use serde_json::{Map, Value};

use super::ConfigLoader;
use crate::core::value::{SEPARATOR, insert_path};
use crate::core::{ConfigError, ConfigResult, ConfigSource};

/// Env var segment separator, mapped onto the `:` key separator.
const ENV_SEPARATOR: &str = "__";

/// Reads process environment variables.
///
/// `ConnectionStrings__db` becomes the key `ConnectionStrings:db`. Values stay
/// strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLoader;

impl EnvLoader {
    /// Build a tree from an explicit set of variables.
    ///
    /// With a prefix, only matching variables are kept and the prefix is
    /// stripped before mapping.
    pub fn load_from<I>(vars: I, prefix: Option<&str>) -> Value
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut root = Value::Object(Map::new());
        for (name, value) in vars {
            let key = match prefix {
                Some(prefix) => match name.strip_prefix(prefix) {
                    Some(rest) => rest,
                    None => continue,
                },
                None => name.as_str(),
            };
            if key.is_empty() {
                continue;
            }
            let path = key.replace(ENV_SEPARATOR, &SEPARATOR.to_string());
            insert_path(&mut root, &path, Value::String(value));
        }
        root
    }
}

impl ConfigLoader for EnvLoader {
    fn load(&self, source: &ConfigSource) -> ConfigResult<Value> {
        match source {
            ConfigSource::Env => Ok(Self::load_from(std::env::vars(), None)),
            ConfigSource::EnvWithPrefix(prefix) => {
                Ok(Self::load_from(std::env::vars(), Some(prefix)))
            }
            other => Err(ConfigError::source_error(
                "not an environment source",
                other.to_string(),
            )),
        }
    }

    fn supports(&self, source: &ConfigSource) -> bool {
        source.is_env_based()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn double_underscore_maps_to_sections() {
        let tree = EnvLoader::load_from(
            vars(&[
                ("ConnectionStrings__db", "Host=localhost"),
                ("Parameters__db-password", "secret"),
            ]),
            None,
        );
        assert_eq!(
            tree,
            json!({
                "ConnectionStrings": {"db": "Host=localhost"},
                "Parameters": {"db-password": "secret"}
            })
        );
    }

    #[test]
    fn prefix_filters_and_strips() {
        let tree = EnvLoader::load_from(
            vars(&[
                ("CONDUCTOR_Orchestrator__FailFast", "true"),
                ("PATH", "/usr/bin"),
                ("CONDUCTOR_", "ignored"),
            ]),
            Some("CONDUCTOR_"),
        );
        assert_eq!(tree, json!({"Orchestrator": {"FailFast": "true"}}));
    }
}
