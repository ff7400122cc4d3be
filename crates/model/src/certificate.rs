//! Certificate authority collections and per-resource trust settings.

use std::path::{Path, PathBuf};

use conductor_core::{ResourceName, StoreLocation, StoreName, TrustStore};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ModelError, ModelResult};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// One certificate, PEM text or DER bytes, identified by its SHA-256
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    fingerprint: String,
    data: Vec<u8>,
}

impl Certificate {
    /// Wrap raw certificate bytes. PEM text is normalized (trimmed, `\n` line
    /// endings) before hashing so the same PEM read from different files gets
    /// one identity.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let data = match std::str::from_utf8(&data) {
            Ok(text) if text.contains(PEM_BEGIN) => {
                text.trim().replace("\r\n", "\n").into_bytes()
            }
            _ => data,
        };
        let fingerprint = hex::encode(Sha256::digest(&data).as_slice());
        Self { fingerprint, data }
    }

    /// Wrap PEM text.
    pub fn from_pem(pem: &str) -> Self {
        Self::from_bytes(pem.as_bytes().to_vec())
    }

    /// Lowercase hex SHA-256 of the normalized bytes.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The normalized bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Split a PEM bundle into its certificates. Text outside
/// `BEGIN/END CERTIFICATE` markers is ignored.
#[must_use]
pub fn split_pem_bundle(bundle: &str) -> Vec<Certificate> {
    let mut certificates = Vec::new();
    let mut rest = bundle;
    while let Some(start) = rest.find(PEM_BEGIN) {
        let Some(len) = rest[start..].find(PEM_END) else {
            break;
        };
        let end = start + len + PEM_END.len();
        certificates.push(Certificate::from_pem(&rest[start..end]));
        rest = &rest[end..];
    }
    certificates
}

/// The content of a certificate authority collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateAuthorityCollectionSpec {
    /// Inline certificates keyed by fingerprint.
    pub certificates: IndexMap<String, Certificate>,
    /// PEM bundles read at materialization time.
    pub bundle_files: IndexSet<PathBuf>,
    /// Platform stores read at materialization time.
    pub stores: IndexSet<(StoreName, StoreLocation)>,
}

impl CertificateAuthorityCollectionSpec {
    /// Add one certificate. Re-adding the same certificate is a no-op.
    pub fn add(&mut self, certificate: Certificate) {
        self.certificates
            .entry(certificate.fingerprint.clone())
            .or_insert(certificate);
    }

    /// Reference a PEM bundle file.
    pub fn add_bundle_file(&mut self, path: impl AsRef<Path>) {
        self.bundle_files.insert(path.as_ref().to_path_buf());
    }

    /// Reference a platform store.
    pub fn add_store(&mut self, store: StoreName, location: StoreLocation) {
        self.stores.insert((store, location));
    }

    /// Read every file and store and return the de-duplicated certificate set,
    /// inline certificates first.
    pub fn materialize(
        &self,
        collection: &ResourceName,
        trust: &dyn TrustStore,
    ) -> ModelResult<Vec<Certificate>> {
        let mut set: IndexMap<String, Certificate> = self.certificates.clone();
        let mut insert = |certificate: Certificate| {
            set.entry(certificate.fingerprint.clone())
                .or_insert(certificate);
        };

        for path in &self.bundle_files {
            let bundle = std::fs::read_to_string(path).map_err(|e| ModelError::Certificate {
                collection: collection.clone(),
                reason: format!("{}: {e}", path.display()),
            })?;
            split_pem_bundle(&bundle).into_iter().for_each(&mut insert);
        }

        for &(store, location) in &self.stores {
            let raw = trust
                .certificates(store, location)
                .map_err(|e| ModelError::Certificate {
                    collection: collection.clone(),
                    reason: e.to_string(),
                })?;
            raw.into_iter().map(Certificate::from_bytes).for_each(&mut insert);
        }

        Ok(set.into_values().collect())
    }
}

/// How a resource's own trust roots combine with attached collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateTrustScope {
    /// Attached collections are not applied.
    None,
    /// Attached collections extend the default roots.
    #[default]
    Append,
    /// Attached collections replace the default roots.
    Override,
    /// Only the platform roots are trusted.
    System,
}

/// Trust settings of a process or container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateTrust {
    /// Attached collections; attaching twice is a no-op.
    pub collections: IndexSet<ResourceName>,
    /// Whether the local developer certificate is trusted.
    pub developer_trust: Option<bool>,
    /// How attached roots combine with the defaults.
    pub scope: Option<CertificateTrustScope>,
}

impl CertificateTrust {
    /// Returns `true` if nothing was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.developer_trust.is_none() && self.scope.is_none()
    }
}
