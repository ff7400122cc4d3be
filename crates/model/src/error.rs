//! Model error types.

use conductor_core::{NameError, ResourceKind, ResourceName};
use thiserror::Error;

/// Errors raised while building, resolving, validating, or projecting a graph.
///
/// Construction errors abort only the offending call. Validation collects
/// every violation into [`ModelError::Validation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The name failed validation.
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// A resource with this name already exists, regardless of kind.
    #[error("duplicate resource name: {0}")]
    DuplicateName(ResourceName),

    /// No resource with this name exists.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The resource exists but is of a different kind.
    #[error("resource {name} is a {actual}, expected {expected}")]
    KindMismatch {
        /// The resource.
        name: ResourceName,
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind the resource has.
        actual: ResourceKind,
    },

    /// A value could not be produced.
    #[error("unresolved reference in {resource}: {reason}")]
    UnresolvedReference {
        /// The resource whose value was requested.
        resource: ResourceName,
        /// Why resolution failed.
        reason: String,
    },

    /// Following connection string redirections revisited a resource.
    #[error("connection string redirection cycle: {}", join(chain))]
    RedirectionCycle {
        /// Every resource visited, ending with the repeated one.
        chain: Vec<ResourceName>,
    },

    /// Ordering edges form a cycle.
    #[error("cyclic dependency among: {}", join(members))]
    CyclicDependency {
        /// The resources on the cycle, in graph-insertion order.
        members: Vec<ResourceName>,
    },

    /// An endpoint port outside `1..=65535`.
    #[error("invalid port {port} on {resource}: ports must be positive")]
    InvalidPort {
        /// The resource declaring the endpoint.
        resource: ResourceName,
        /// The rejected port.
        port: u32,
    },

    /// A URL that does not parse as an absolute URL.
    #[error("invalid url `{url}` on {resource}: {reason}")]
    InvalidUrl {
        /// The resource carrying the URL.
        resource: ResourceName,
        /// The rejected text.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A probe names an endpoint that does not exist, or names none while the
    /// resource has zero or several endpoints.
    #[error("probe {path} on {resource}: {reason}")]
    ProbeEndpoint {
        /// The probed resource.
        resource: ResourceName,
        /// The probe path.
        path: String,
        /// What is wrong with the endpoint reference.
        reason: String,
    },

    /// A reference to another resource that is not usable in this position.
    #[error("{resource} references {target}: {reason}")]
    InvalidReference {
        /// The referring resource.
        resource: ResourceName,
        /// The referenced resource.
        target: ResourceName,
        /// Why the reference is rejected.
        reason: String,
    },

    /// Certificate material could not be loaded.
    #[error("certificate collection {collection}: {reason}")]
    Certificate {
        /// The collection being materialized.
        collection: ResourceName,
        /// What failed.
        reason: String,
    },

    /// Aggregate of every violation found by validation.
    #[error("graph validation failed with {} violation(s): {}", .0.len(), join(.0))]
    Validation(Vec<ModelError>),
}

impl ModelError {
    /// Create an unresolved-reference error.
    pub fn unresolved(resource: &ResourceName, reason: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            resource: resource.clone(),
            reason: reason.into(),
        }
    }

    /// The violations carried by a validation error, or the error itself.
    #[must_use]
    pub fn violations(&self) -> Vec<&ModelError> {
        match self {
            Self::Validation(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
