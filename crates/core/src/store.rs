//! Synchronous collaborator interfaces consulted while resolving the graph.
//!
//! Both traits are called during graph resolution, which never suspends, so
//! neither is async.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::TrustStoreError;

/// Looks up configuration-backed values by key.
///
/// Keys use the colon-separated hierarchy (`Parameters:db-password`,
/// `ConnectionStrings:db`).
pub trait SecretStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// A store that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl SecretStore for NoSecrets {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

impl SecretStore for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl SecretStore for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Platform certificate store names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreName {
    /// Other users' certificates.
    AddressBook,
    /// Third-party certificate authorities.
    AuthRoot,
    /// Intermediate certificate authorities.
    CertificateAuthority,
    /// Revoked certificates.
    Disallowed,
    /// Personal certificates.
    My,
    /// Trusted root certificate authorities.
    Root,
    /// Directly trusted people and resources.
    TrustedPeople,
    /// Directly trusted publishers.
    TrustedPublisher,
}

impl std::fmt::Display for StoreName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressBook => write!(f, "address_book"),
            Self::AuthRoot => write!(f, "auth_root"),
            Self::CertificateAuthority => write!(f, "certificate_authority"),
            Self::Disallowed => write!(f, "disallowed"),
            Self::My => write!(f, "my"),
            Self::Root => write!(f, "root"),
            Self::TrustedPeople => write!(f, "trusted_people"),
            Self::TrustedPublisher => write!(f, "trusted_publisher"),
        }
    }
}

/// Platform certificate store scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    /// The store of the current user.
    CurrentUser,
    /// The machine-wide store.
    LocalMachine,
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CurrentUser => write!(f, "current_user"),
            Self::LocalMachine => write!(f, "local_machine"),
        }
    }
}

/// Reads certificates out of a platform trust store.
pub trait TrustStore: Send + Sync {
    /// Returns every certificate in `store` at `location`, PEM or DER encoded.
    fn certificates(
        &self,
        store: StoreName,
        location: StoreLocation,
    ) -> Result<Vec<Vec<u8>>, TrustStoreError>;
}

/// A trust store that is always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrustStore;

impl TrustStore for NoTrustStore {
    fn certificates(
        &self,
        _store: StoreName,
        _location: StoreLocation,
    ) -> Result<Vec<Vec<u8>>, TrustStoreError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_secrets_is_empty() {
        assert_eq!(NoSecrets.get("Parameters:anything"), None);
    }

    #[test]
    fn hash_map_store_looks_up_keys() {
        let mut store = HashMap::new();
        store.insert("ConnectionStrings:db".to_string(), "Server=.".to_string());
        assert_eq!(
            SecretStore::get(&store, "ConnectionStrings:db").as_deref(),
            Some("Server=.")
        );
        assert_eq!(SecretStore::get(&store, "ConnectionStrings:other"), None);
    }

    #[test]
    fn no_trust_store_returns_nothing() {
        let certs = NoTrustStore
            .certificates(StoreName::Root, StoreLocation::LocalMachine)
            .unwrap();
        assert!(certs.is_empty());
    }
}
