#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Conductor Model
//!
//! The declarative side of Conductor: an application graph built up call by
//! call, and everything that can be computed from it without running
//! anything.
//!
//! - [`GraphHandle`] and [`ResourceHandle`], the mutation API
//! - [`EndpointTable`], per-resource endpoint allocation
//! - [`Resolver`], value resolution with redirection and secret handling
//! - [`DependencyGraph`], ordering and cycle detection over wait edges
//! - [`Snapshot`], validated read-only views for launchers and exporters

pub mod certificate;
pub mod container;
pub mod dependency;
pub mod endpoint;
pub mod error;
pub mod graph;
pub mod handle;
pub mod probe;
pub mod reference;
pub mod relationship;
pub mod resolve;
pub mod resource;
pub mod snapshot;
pub mod telemetry;
mod validate;
pub mod value;

pub use certificate::{
    Certificate, CertificateAuthorityCollectionSpec, CertificateTrust, CertificateTrustScope,
};
pub use container::{BindMount, BuildSpec, ContainerSpec, ImagePullPolicy, Volume};
pub use dependency::DependencyGraph;
pub use endpoint::{EndpointId, EndpointSpec, EndpointTable, Scheme};
pub use error::{ModelError, ModelResult};
pub use graph::{GraphHandle, ResourceGraph};
pub use handle::{
    AnyKind, ContainerKind, KindMarker, ReferenceSource, ResourceHandle, SupportsEndpoints,
    SupportsEnvironment, SupportsProbes, SupportsWaits, kind,
};
pub use probe::{ProbeKind, ProbeSpec, ProbeTable};
pub use relationship::{
    Relationship, RelationshipKind, WaitBehavior, WaitCondition, WaitRequirement,
};
pub use reference::ReferenceEnvironment;
pub use resolve::{ResolveMode, Resolver};
pub use resource::{
    Annotations, Description, Icon, IconVariant, Lifetime, ParameterSource, ProcessSpec,
    Resource, ResourceSpec,
};
pub use snapshot::{ResourceView, Snapshot, View};
pub use telemetry::OtlpProtocol;
pub use value::{REDACTED, Resolved, SecretValue, ValueSource};

/// Serde helper for `Option<Duration>` serialized as milliseconds.
pub(crate) mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(d)?;
        Ok(opt.map(Duration::from_millis))
    }
}
