//! The closed set of resource kinds.

use serde::{Deserialize, Serialize};

/// What a resource is. Fixed at creation; every resource has exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A local executable or project.
    Process,
    /// A container image built from a local Dockerfile.
    BuiltContainer,
    /// A container started from a published image.
    PrebuiltContainer,
    /// A service outside the application, addressed by URL.
    ExternalService,
    /// A named connection string, possibly redirected.
    ConnectionString,
    /// A named parameter value, possibly secret.
    Parameter,
    /// A bag of trusted certificate authorities.
    CertificateAuthorityCollection,
}

impl ResourceKind {
    /// Returns `true` if the launcher has to start something for this kind.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        matches!(
            self,
            Self::Process | Self::BuiltContainer | Self::PrebuiltContainer
        )
    }

    /// Returns `true` for both container kinds.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::BuiltContainer | Self::PrebuiltContainer)
    }

    /// Returns `true` if the kind resolves to a single string value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        matches!(
            self,
            Self::ExternalService | Self::ConnectionString | Self::Parameter
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::BuiltContainer => write!(f, "built_container"),
            Self::PrebuiltContainer => write!(f, "prebuilt_container"),
            Self::ExternalService => write!(f, "external_service"),
            Self::ConnectionString => write!(f, "connection_string"),
            Self::Parameter => write!(f, "parameter"),
            Self::CertificateAuthorityCollection => write!(f, "certificate_authority_collection"),
        }
    }
}
