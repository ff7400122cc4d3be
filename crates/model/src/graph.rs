//! The mutable resource graph and the shared handle every builder call goes
//! through.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use conductor_core::{ResourceName, SecretStore};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::certificate::CertificateAuthorityCollectionSpec;
use crate::container::{BuildSpec, ContainerSpec};
use crate::dependency::DependencyGraph;
use crate::error::{ModelError, ModelResult};
use crate::handle::{AnyKind, KindMarker, ResourceHandle, kind};
use crate::relationship::{Relationship, RelationshipKind};
use crate::resource::{ParameterSource, ProcessSpec, Resource, ResourceSpec};
use crate::snapshot::{self, Snapshot, View};
use crate::validate;
use crate::value::ValueSource;

/// A resource node shared by every handle to it.
pub(crate) type Node = Arc<RwLock<Resource>>;

/// Resources in insertion order plus the typed edges between them.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    resources: IndexMap<ResourceName, Node>,
    relationships: Vec<Relationship>,
}

impl ResourceGraph {
    /// Insert a resource. Fails without touching the graph if the name is
    /// taken, whatever the existing resource's kind.
    pub(crate) fn insert(&mut self, resource: Resource) -> ModelResult<Node> {
        if self.resources.contains_key(&resource.name) {
            return Err(ModelError::DuplicateName(resource.name));
        }
        let name = resource.name.clone();
        let node = Arc::new(RwLock::new(resource));
        self.resources.insert(name, Arc::clone(&node));
        Ok(node)
    }

    /// Insert or replace an edge. Edges are keyed by endpoints plus slot (see
    /// [`Relationship::same_slot`]); a replacement keeps its position.
    pub(crate) fn upsert_edge(&mut self, edge: Relationship) {
        match self.relationships.iter_mut().find(|e| e.same_slot(&edge)) {
            Some(existing) => *existing = edge,
            None => self.relationships.push(edge),
        }
    }

    pub(crate) fn node(&self, name: &str) -> Option<&Node> {
        self.resources.get(name)
    }

    /// A copy of one resource.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<Resource> {
        self.node(name).map(|node| node.read().clone())
    }

    /// Returns `true` if a resource with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Resource names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.resources.keys()
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (&ResourceName, &Node)> {
        self.resources.iter()
    }

    /// Every edge, in declaration order.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if the graph holds no resource.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Cheaply clonable handle to one application graph.
///
/// Construction is single-threaded in practice, but the graph sits behind a
/// lock so handles can be moved to the orchestrator once building is done.
#[derive(Debug, Clone, Default)]
pub struct GraphHandle {
    inner: Arc<RwLock<ResourceGraph>>,
}

impl GraphHandle {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the graph.
    pub fn read(&self) -> RwLockReadGuard<'_, ResourceGraph> {
        self.inner.read()
    }

    pub(crate) fn same_graph(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Add a resource of any kind.
    pub fn add_resource(
        &self,
        name: &str,
        spec: ResourceSpec,
    ) -> ModelResult<ResourceHandle<AnyKind>> {
        self.insert(name, spec)
    }

    fn insert<K: KindMarker>(&self, name: &str, spec: ResourceSpec) -> ModelResult<ResourceHandle<K>> {
        let name = ResourceName::new(name)?;
        let kind = spec.kind();
        let node = self.inner.write().insert(Resource::new(name.clone(), spec))?;
        debug!(resource = %name, %kind, "resource added");
        Ok(ResourceHandle::new(self.clone(), name, node))
    }

    /// Add a local executable.
    pub fn add_executable(
        &self,
        name: &str,
        command: impl Into<String>,
        working_dir: impl AsRef<Path>,
    ) -> ModelResult<ResourceHandle<kind::Process>> {
        self.insert(
            name,
            ResourceSpec::Process(ProcessSpec {
                command: command.into(),
                working_dir: Some(working_dir.as_ref().to_path_buf()),
                project_path: None,
                replicas: 1,
            }),
        )
    }

    /// Add a project; it runs from the project file's directory.
    pub fn add_project(
        &self,
        name: &str,
        project_path: impl AsRef<Path>,
    ) -> ModelResult<ResourceHandle<kind::Process>> {
        let project_path = project_path.as_ref().to_path_buf();
        self.insert(
            name,
            ResourceSpec::Process(ProcessSpec {
                command: project_path.display().to_string(),
                working_dir: project_path.parent().map(Path::to_path_buf),
                project_path: Some(project_path),
                replicas: 1,
            }),
        )
    }

    /// Add a container from a published image (`image` or `image:tag`).
    pub fn add_container(
        &self,
        name: &str,
        image: impl Into<String>,
    ) -> ModelResult<ResourceHandle<kind::PrebuiltContainer>> {
        self.insert(name, ResourceSpec::PrebuiltContainer(ContainerSpec::new(image)))
    }

    /// Add a container built from `context`. The image is named after the
    /// resource.
    pub fn add_dockerfile(
        &self,
        name: &str,
        context: impl Into<PathBuf>,
    ) -> ModelResult<ResourceHandle<kind::BuiltContainer>> {
        self.insert(
            name,
            ResourceSpec::BuiltContainer {
                container: ContainerSpec::new(name),
                build: BuildSpec::new(context),
            },
        )
    }

    /// Add an external service at a fixed, absolute URL.
    pub fn add_external_service(
        &self,
        name: &str,
        url: &str,
    ) -> ModelResult<ResourceHandle<kind::ExternalService>> {
        let resource = ResourceName::new(name)?;
        validate::check_url(&resource, url)?;
        self.insert(
            name,
            ResourceSpec::ExternalService {
                url: ValueSource::Literal(url.to_string()),
            },
        )
    }

    /// Add an external service whose URL is a parameter's value.
    pub fn add_external_service_from_parameter(
        &self,
        name: &str,
        url: &ResourceHandle<kind::Parameter>,
    ) -> ModelResult<ResourceHandle<kind::ExternalService>> {
        self.check_member(name, url)?;
        self.insert(
            name,
            ResourceSpec::ExternalService {
                url: ValueSource::Parameter(url.name().clone()),
            },
        )
    }

    /// Add a connection string resolved from `ConnectionStrings:{name}`.
    pub fn add_connection_string(
        &self,
        name: &str,
    ) -> ModelResult<ResourceHandle<kind::ConnectionString>> {
        self.insert(
            name,
            ResourceSpec::ConnectionString {
                value: None,
                env_var: None,
                redirect: None,
            },
        )
    }

    /// Add a parameter with a literal value.
    pub fn add_parameter(
        &self,
        name: &str,
        value: impl Into<String>,
    ) -> ModelResult<ResourceHandle<kind::Parameter>> {
        self.add_parameter_with(name, ParameterSource::Value(value.into()))
    }

    /// Add a parameter with no source. Validation reports it until a value is
    /// supplied.
    pub fn add_parameter_unset(&self, name: &str) -> ModelResult<ResourceHandle<kind::Parameter>> {
        self.add_parameter_with(name, ParameterSource::Unset)
    }

    /// Add a parameter read from configuration key `key`.
    pub fn add_parameter_from_configuration(
        &self,
        name: &str,
        key: impl Into<String>,
    ) -> ModelResult<ResourceHandle<kind::Parameter>> {
        self.add_parameter_with(name, ParameterSource::Configuration(key.into()))
    }

    fn add_parameter_with(
        &self,
        name: &str,
        source: ParameterSource,
    ) -> ModelResult<ResourceHandle<kind::Parameter>> {
        self.insert(
            name,
            ResourceSpec::Parameter {
                source,
                secret: false,
                publish_value_as_default: false,
            },
        )
    }

    /// Add an empty certificate authority collection.
    pub fn add_certificate_authority_collection(
        &self,
        name: &str,
    ) -> ModelResult<ResourceHandle<kind::CertificateAuthorityCollection>> {
        self.insert(
            name,
            ResourceSpec::CertificateAuthorityCollection(
                CertificateAuthorityCollectionSpec::default(),
            ),
        )
    }

    /// A handle to an existing resource.
    pub fn handle(&self, name: &str) -> ModelResult<ResourceHandle<AnyKind>> {
        self.typed(name)
    }

    /// A handle to an existing resource of kind `K`.
    pub fn typed<K: KindMarker>(&self, name: &str) -> ModelResult<ResourceHandle<K>> {
        let graph = self.inner.read();
        let node = graph
            .node(name)
            .ok_or_else(|| ModelError::NotFound(name.to_string()))?;
        let (resource, actual) = {
            let r = node.read();
            (r.name.clone(), r.kind())
        };
        if !K::accepts(actual) {
            return Err(ModelError::KindMismatch {
                name: resource,
                expected: K::NAME,
                actual,
            });
        }
        Ok(ResourceHandle::new(self.clone(), resource, Arc::clone(node)))
    }

    /// Record an edge. Both ends must exist.
    pub fn add_edge(&self, from: &str, to: &str, kind: RelationshipKind) -> ModelResult<()> {
        let mut graph = self.inner.write();
        let [from, to] = [from, to].map(|name| {
            graph
                .node(name)
                .map(|node| node.read().name.clone())
                .ok_or_else(|| ModelError::NotFound(name.to_string()))
        });
        let (from, to) = (from?, to?);
        debug!(%from, %to, %kind, "relationship recorded");
        graph.upsert_edge(Relationship { from, to, kind });
        Ok(())
    }

    /// A copy of one resource.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<Resource> {
        self.inner.read().resource(name)
    }

    /// Copies of every resource, in insertion order.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.inner
            .read()
            .nodes()
            .map(|(_, node)| node.read().clone())
            .collect()
    }

    /// Every edge, in declaration order.
    #[must_use]
    pub fn relationships(&self) -> Vec<Relationship> {
        self.inner.read().relationships().to_vec()
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if the graph holds no resource.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// The ordering graph over wait edges.
    #[must_use]
    pub fn dependencies(&self) -> DependencyGraph {
        DependencyGraph::build(&self.inner.read())
    }

    /// Start levels: every resource appears after all its wait predecessors;
    /// ties keep insertion order.
    pub fn topo_order(&self) -> ModelResult<Vec<Vec<ResourceName>>> {
        self.dependencies().topo_levels()
    }

    /// Every violation in the graph. Empty means valid.
    #[must_use]
    pub fn validate(&self, secrets: &dyn SecretStore) -> Vec<ModelError> {
        validate::violations(&self.inner.read(), secrets)
    }

    /// Like [`validate`](Self::validate), folded into one error.
    pub fn check(&self, secrets: &dyn SecretStore) -> ModelResult<()> {
        let violations = self.validate(secrets);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ModelError::Validation(violations))
        }
    }

    /// Validate, then render a read-only view.
    pub fn project(&self, view: View, secrets: &dyn SecretStore) -> ModelResult<Snapshot> {
        snapshot::project(&self.inner.read(), view, secrets)
    }

    /// The published view, resolved without any configuration.
    pub fn export_snapshot(&self) -> ModelResult<Snapshot> {
        self.project(View::Publish, &conductor_core::NoSecrets)
    }

    /// Rebuild a graph from a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> ModelResult<Self> {
        let handle = Self::new();
        {
            let mut graph = handle.inner.write();
            for view in &snapshot.resources {
                graph.insert(view.resource.clone())?;
            }
        }
        for edge in &snapshot.relationships {
            handle.add_edge(edge.from.as_str(), edge.to.as_str(), edge.kind.clone())?;
        }
        Ok(handle)
    }

    pub(crate) fn check_member<K>(&self, user: &str, target: &ResourceHandle<K>) -> ModelResult<()> {
        if self.same_graph(target.graph()) {
            Ok(())
        } else {
            Err(ModelError::InvalidReference {
                resource: ResourceName::new(user)?,
                target: target.name().clone(),
                reason: "target belongs to another graph".into(),
            })
        }
    }
}
