#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Conductor Core
//!
//! Shared vocabulary for the Conductor orchestrator:
//!
//! - [`ResourceName`], the validated, case-sensitive resource identifier
//! - [`ResourceKind`], the closed set of things a graph can contain
//! - [`RunId`] for tagging one orchestration run
//! - [`SecretStore`] and [`TrustStore`], the synchronous collaborators the
//!   graph consults while resolving values and certificates

pub mod error;
pub mod id;
pub mod kind;
pub mod name;
pub mod store;

pub use error::{NameError, TrustStoreError};
pub use id::RunId;
pub use kind::ResourceKind;
pub use name::ResourceName;
pub use store::{NoSecrets, NoTrustStore, SecretStore, StoreLocation, StoreName, TrustStore};
