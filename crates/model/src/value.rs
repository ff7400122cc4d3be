//! Deferred value sources and resolved values.

use conductor_core::ResourceName;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// The fixed marker every exported view shows in place of a secret.
pub const REDACTED: &str = "******";

/// Where a value comes from. Constructing one never fails; resolving it may.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// A literal string.
    Literal(String),
    /// The value of a parameter resource.
    Parameter(ResourceName),
    /// The value of a connection string resource, following redirections.
    ConnectionString(ResourceName),
    /// The URL of an external service resource.
    ExternalServiceUrl(ResourceName),
}

impl ValueSource {
    /// The resource this source points at, if it is not a literal.
    #[must_use]
    pub fn referenced(&self) -> Option<&ResourceName> {
        match self {
            Self::Literal(_) => None,
            Self::Parameter(name) | Self::ConnectionString(name) | Self::ExternalServiceUrl(name) => {
                Some(name)
            }
        }
    }
}

impl From<&str> for ValueSource {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for ValueSource {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

/// A secret string that never prints itself.
#[derive(Clone)]
pub struct SecretValue(SecretString);

impl SecretValue {
    /// Wrap a secret.
    pub fn new(s: impl Into<String>) -> Self {
        Self(SecretString::from(s.into()))
    }

    /// Expose the secret for runtime injection.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue(REDACTED)")
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for SecretValue {}

/// A resolved value, remembering whether it derived from a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Safe to show.
    Plain(String),
    /// Derived from a secret parameter; rendered as [`REDACTED`].
    Secret(SecretValue),
}

impl Resolved {
    /// Wrap `value`, as a secret when `secret` is set.
    pub fn new(value: impl Into<String>, secret: bool) -> Self {
        if secret {
            Self::Secret(SecretValue::new(value))
        } else {
            Self::Plain(value.into())
        }
    }

    /// The real value, for injection into a launched resource.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Secret(s) => s.expose(),
        }
    }

    /// The value as any exported view shows it.
    #[must_use]
    pub fn display(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Secret(_) => REDACTED,
        }
    }

    /// Returns `true` if the value derived from a secret.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }
}

impl std::fmt::Display for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_never_displays() {
        let value = Resolved::new("hunter2", true);
        assert_eq!(value.display(), REDACTED);
        assert_eq!(value.to_string(), REDACTED);
        assert!(!format!("{value:?}").contains("hunter2"));
        assert_eq!(value.expose(), "hunter2");
    }

    #[test]
    fn plain_displays_as_is() {
        let value = Resolved::new("Host=db", false);
        assert_eq!(value.display(), "Host=db");
        assert!(!value.is_secret());
    }

    #[test]
    fn literal_references_nothing() {
        assert_eq!(ValueSource::from("x").referenced(), None);
        let name = ResourceName::new("pw").unwrap();
        assert_eq!(
            ValueSource::Parameter(name.clone()).referenced(),
            Some(&name)
        );
    }
}
