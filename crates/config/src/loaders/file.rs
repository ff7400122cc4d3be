//! File and inline text loader

use std::path::Path;

use serde_json::Value;

use super::ConfigLoader;
use crate::core::{ConfigError, ConfigFormat, ConfigResult, ConfigSource};

/// Reads JSON or TOML from files and inline text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    fn load_file(path: &Path) -> ConfigResult<Value> {
        let format =
            ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let origin = format!("file: {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::source_error(e.to_string(), origin.clone()))?;
        parse(&content, format, &origin)
    }
}

/// Parse `content` in `format` into a JSON tree.
pub(crate) fn parse(content: &str, format: ConfigFormat, origin: &str) -> ConfigResult<Value> {
    match format {
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::parse_error(e.to_string(), origin))
        }
        #[cfg(feature = "toml")]
        ConfigFormat::Toml => {
            toml::from_str::<Value>(content).map_err(|e| ConfigError::parse_error(e.to_string(), origin))
        }
        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(ConfigError::parse_error(
            "TOML support is disabled",
            origin,
        )),
    }
}

impl ConfigLoader for FileLoader {
    fn load(&self, source: &ConfigSource) -> ConfigResult<Value> {
        match source {
            ConfigSource::File(path) => Self::load_file(path),
            ConfigSource::Inline(content) => {
                parse(content, ConfigFormat::sniff(content), "inline")
            }
            other => Err(ConfigError::source_error(
                "not a file source",
                other.to_string(),
            )),
        }
    }

    fn supports(&self, source: &ConfigSource) -> bool {
        matches!(source, ConfigSource::File(_) | ConfigSource::Inline(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[ConnectionStrings]\ndb = \"Host=localhost\"").unwrap();
        let tree = FileLoader
            .load(&ConfigSource::File(file.path().to_path_buf()))
            .unwrap();
        assert_eq!(tree, json!({"ConnectionStrings": {"db": "Host=localhost"}}));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = FileLoader
            .load(&ConfigSource::File("settings.ini".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let err = FileLoader
            .load(&ConfigSource::File("does-not-exist.json".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SourceError { .. }));
    }

    #[test]
    fn inline_json_is_sniffed() {
        let tree = FileLoader
            .load(&ConfigSource::Inline(r#"{"Parameters": {"port": 8080}}"#.into()))
            .unwrap();
        assert_eq!(tree, json!({"Parameters": {"port": 8080}}));
    }

    #[test]
    fn malformed_inline_is_a_parse_error() {
        let err = FileLoader
            .load(&ConfigSource::Inline("{ not json".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
