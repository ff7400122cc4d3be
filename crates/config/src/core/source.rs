//! Configuration source definitions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration source type
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Environment variables, `__` separating key segments
    Env,

    /// Environment variables with prefix; the prefix is stripped
    EnvWithPrefix(String),

    /// Configuration file; format chosen by extension
    File(PathBuf),

    /// Inline configuration text, JSON or TOML
    Inline(String),

    /// Values passed to the builder as defaults
    Default,
}

impl ConfigSource {
    /// Check if this source is environment-based
    pub fn is_env_based(&self) -> bool {
        matches!(self, ConfigSource::Env | ConfigSource::EnvWithPrefix(_))
    }

    /// Check if this source is optional (can fail without error)
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            ConfigSource::Env | ConfigSource::EnvWithPrefix(_) | ConfigSource::Default
        )
    }

    /// Get the priority of this source (lower = higher priority)
    pub fn priority(&self) -> u8 {
        match self {
            ConfigSource::Default => 100,
            ConfigSource::File(_) => 50,
            ConfigSource::Env | ConfigSource::EnvWithPrefix(_) => 30,
            ConfigSource::Inline(_) => 1,
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Env => write!(f, "environment variables"),
            ConfigSource::EnvWithPrefix(prefix) => {
                write!(f, "environment variables (prefix: {prefix})")
            }
            ConfigSource::File(path) => write!(f, "file: {}", path.display()),
            ConfigSource::Inline(data) => {
                let shown: String = data.chars().take(50).collect();
                if shown.len() < data.len() {
                    write!(f, "inline: {shown}...")
                } else {
                    write!(f, "inline: {data}")
                }
            }
            ConfigSource::Default => write!(f, "default values"),
        }
    }
}

/// Text formats a file or inline source may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    /// JSON
    Json,
    /// TOML
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Guess the format of inline text: an opening brace means JSON.
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Toml
        }
    }
}
