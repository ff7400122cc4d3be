//! Resource nodes and their kind-specific details.

use std::path::PathBuf;

use conductor_core::{ResourceKind, ResourceName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::certificate::{CertificateAuthorityCollectionSpec, CertificateTrust};
use crate::container::{BuildSpec, ContainerSpec};
use crate::endpoint::EndpointTable;
use crate::probe::ProbeTable;
use crate::reference::ReferenceEnvironment;
use crate::telemetry::OtlpProtocol;
use crate::value::ValueSource;

/// Whether a resource survives application restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Created and torn down with each run.
    #[default]
    Ephemeral,
    /// Kept across runs.
    Persistent,
}

/// A local executable or project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Command to run.
    pub command: String,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
    /// Project file, for project resources.
    pub project_path: Option<PathBuf>,
    /// Number of instances.
    pub replicas: u32,
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// A literal value.
    Value(String),
    /// A configuration key looked up at resolution time.
    Configuration(String),
    /// No source at all; resolution fails.
    Unset,
    /// A value that existed but was withheld from an exported view.
    Withheld,
}

/// Kind-specific details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    /// A local executable or project.
    Process(ProcessSpec),
    /// A container built from source.
    BuiltContainer {
        /// How to run the built image.
        container: ContainerSpec,
        /// How to build it.
        build: BuildSpec,
    },
    /// A container from a published image.
    PrebuiltContainer(ContainerSpec),
    /// A service outside the application.
    ExternalService {
        /// Its URL.
        url: ValueSource,
    },
    /// A named connection string.
    ConnectionString {
        /// Its value; looked up under `ConnectionStrings:{name}` when absent.
        value: Option<ValueSource>,
        /// Variable used when injected by reference.
        env_var: Option<String>,
        /// Another connection string this one resolves to.
        redirect: Option<ResourceName>,
    },
    /// A named value.
    Parameter {
        /// Where the value comes from.
        source: ParameterSource,
        /// Redacted in every exported view.
        secret: bool,
        /// Baked into published views instead of resolved per run.
        publish_value_as_default: bool,
    },
    /// Trusted certificate authorities.
    CertificateAuthorityCollection(CertificateAuthorityCollectionSpec),
}

impl ResourceSpec {
    /// The resource kind these details describe.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Process(_) => ResourceKind::Process,
            Self::BuiltContainer { .. } => ResourceKind::BuiltContainer,
            Self::PrebuiltContainer(_) => ResourceKind::PrebuiltContainer,
            Self::ExternalService { .. } => ResourceKind::ExternalService,
            Self::ConnectionString { .. } => ResourceKind::ConnectionString,
            Self::Parameter { .. } => ResourceKind::Parameter,
            Self::CertificateAuthorityCollection(_) => {
                ResourceKind::CertificateAuthorityCollection
            }
        }
    }

    /// Container details of either container kind.
    #[must_use]
    pub fn container(&self) -> Option<&ContainerSpec> {
        match self {
            Self::BuiltContainer { container, .. } | Self::PrebuiltContainer(container) => {
                Some(container)
            }
            _ => None,
        }
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut ContainerSpec> {
        match self {
            Self::BuiltContainer { container, .. } | Self::PrebuiltContainer(container) => {
                Some(container)
            }
            _ => None,
        }
    }
}

/// Icon style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconVariant {
    /// Outline icon.
    Regular,
    /// Solid icon.
    #[default]
    Filled,
}

/// Icon shown by tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    /// Icon name.
    pub name: String,
    /// Icon style.
    pub variant: IconVariant,
}

/// Human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// The text.
    pub text: String,
    /// Whether `text` is Markdown.
    pub markdown: bool,
}

/// Display-only metadata. Never affects orchestration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// Icon.
    pub icon: Option<Icon>,
    /// Links keyed by URL, with an optional display text.
    pub urls: IndexMap<String, Option<String>>,
    /// Description.
    pub description: Option<Description>,
}

/// One node of the resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique name.
    pub name: ResourceName,
    /// Kind-specific details; the kind never changes.
    pub spec: ResourceSpec,
    /// Environment variables, replaced per variable.
    #[serde(default)]
    pub env: IndexMap<String, ValueSource>,
    /// Command-line arguments, replaced as a whole.
    #[serde(default)]
    pub args: Vec<ValueSource>,
    /// Declared endpoints.
    #[serde(default)]
    pub endpoints: EndpointTable,
    /// Declared probes.
    #[serde(default)]
    pub probes: ProbeTable,
    /// Lifetime policy.
    #[serde(default)]
    pub lifetime: Lifetime,
    /// Display metadata.
    #[serde(default)]
    pub annotations: Annotations,
    /// Omitted from published views.
    #[serde(default)]
    pub exclude_from_manifest: bool,
    /// Omitted from the control surface.
    #[serde(default)]
    pub exclude_from_control_surface: bool,
    /// Never started automatically.
    #[serde(default)]
    pub explicit_start: bool,
    /// Trust settings.
    #[serde(default)]
    pub trust: CertificateTrust,
    /// Endpoints speak HTTP/2.
    #[serde(default)]
    pub http2: bool,
    /// Service URLs referenced by name rather than through a resource.
    #[serde(default)]
    pub service_uris: IndexMap<String, String>,
    /// Which variables references inject into this resource.
    #[serde(default)]
    pub reference_environment: ReferenceEnvironment,
    /// Telemetry export over OTLP, if enabled.
    #[serde(default)]
    pub otlp: Option<OtlpProtocol>,
}

impl Resource {
    /// A resource with default options.
    #[must_use]
    pub fn new(name: ResourceName, spec: ResourceSpec) -> Self {
        Self {
            name,
            spec,
            env: IndexMap::new(),
            args: Vec::new(),
            endpoints: EndpointTable::default(),
            probes: ProbeTable::default(),
            lifetime: Lifetime::default(),
            annotations: Annotations::default(),
            exclude_from_manifest: false,
            exclude_from_control_surface: false,
            explicit_start: false,
            trust: CertificateTrust::default(),
            http2: false,
            service_uris: IndexMap::new(),
            reference_environment: ReferenceEnvironment::default(),
            otlp: None,
        }
    }

    /// The resource kind.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    /// Returns `true` if the resource is a secret parameter.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self.spec, ResourceSpec::Parameter { secret: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    #[test]
    fn kind_follows_spec() {
        let r = Resource::new(
            name("cache"),
            ResourceSpec::PrebuiltContainer(ContainerSpec::new("redis")),
        );
        assert_eq!(r.kind(), ResourceKind::PrebuiltContainer);
        assert!(r.spec.container().is_some());
    }

    #[test]
    fn serde_tags_the_kind() {
        let r = Resource::new(
            name("pw"),
            ResourceSpec::Parameter {
                source: ParameterSource::Unset,
                secret: true,
                publish_value_as_default: false,
            },
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["spec"]["kind"], "parameter");
        assert_eq!(json["spec"]["source"], "unset");
        let back: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
        assert!(back.is_secret());
    }
}
