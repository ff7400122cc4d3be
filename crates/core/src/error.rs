//! Error types shared across Conductor crates.

use thiserror::Error;

use crate::store::{StoreLocation, StoreName};

/// A resource name failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name was the empty string.
    #[error("resource name must not be empty")]
    Empty,

    /// The name contains whitespace or a control character.
    #[error("resource name `{name}` contains invalid character {ch:?}")]
    InvalidCharacter {
        /// The rejected name.
        name: String,
        /// The first offending character.
        ch: char,
    },
}

/// A platform trust store could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trust store {store}/{location} unavailable: {message}")]
pub struct TrustStoreError {
    /// The store that was queried.
    pub store: StoreName,
    /// The location that was queried.
    pub location: StoreLocation,
    /// Collaborator-supplied detail.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_character_display() {
        let err = NameError::InvalidCharacter {
            name: "a b".into(),
            ch: ' ',
        };
        assert_eq!(
            err.to_string(),
            "resource name `a b` contains invalid character ' '"
        );
    }

    #[test]
    fn trust_store_error_display() {
        let err = TrustStoreError {
            store: StoreName::Root,
            location: StoreLocation::CurrentUser,
            message: "access denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "trust store root/current_user unavailable: access denied"
        );
    }
}
