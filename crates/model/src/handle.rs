//! Typed builder handles.
//!
//! A [`ResourceHandle`] points at the shared node of one resource, so every
//! handle to the same name observes every mutation. The kind marker `K` gates
//! which setters exist: an endpoint cannot be declared on a parameter.
//! Setters mutate the shared node; the returned handle only serves chaining.
//!
//! Single-valued setters replace. Keyed collections (endpoints, probes,
//! certificates, mounts, build args, waits) upsert by key.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use conductor_core::{ResourceKind, ResourceName, StoreLocation, StoreName};

use crate::certificate::{Certificate, CertificateTrustScope};
use crate::container::{BindMount, ImagePullPolicy, Volume};
use crate::endpoint::{EndpointId, EndpointSpec, Scheme};
use crate::error::ModelResult;
use crate::graph::{GraphHandle, Node};
use crate::probe::ProbeSpec;
use crate::reference::ReferenceEnvironment;
use crate::relationship::{RelationshipKind, WaitBehavior, WaitCondition};
use crate::resource::{Description, Icon, IconVariant, Lifetime, Resource, ResourceSpec};
use crate::telemetry::OtlpProtocol;
use crate::validate::check_url;
use crate::value::ValueSource;

/// Kind markers for [`ResourceHandle`].
pub mod kind {
    /// A local executable or project.
    #[derive(Debug)]
    pub enum Process {}
    /// A container from a published image.
    #[derive(Debug)]
    pub enum PrebuiltContainer {}
    /// A container built from source.
    #[derive(Debug)]
    pub enum BuiltContainer {}
    /// An external service.
    #[derive(Debug)]
    pub enum ExternalService {}
    /// A connection string.
    #[derive(Debug)]
    pub enum ConnectionString {}
    /// A parameter.
    #[derive(Debug)]
    pub enum Parameter {}
    /// A certificate authority collection.
    #[derive(Debug)]
    pub enum CertificateAuthorityCollection {}
    /// Any kind; only the common setters are available.
    #[derive(Debug)]
    pub enum AnyKind {}
}

pub use kind::AnyKind;

mod sealed {
    pub trait Sealed {}
}

/// Links a marker type to the resource kinds it stands for.
pub trait KindMarker: sealed::Sealed + 'static {
    /// Kind name used in mismatch errors.
    const NAME: &'static str;

    /// Returns `true` if a resource of `kind` may be viewed through this marker.
    fn accepts(kind: ResourceKind) -> bool;
}

macro_rules! kind_marker {
    ($($marker:ident => $variant:ident, $name:literal;)+) => {$(
        impl sealed::Sealed for kind::$marker {}

        impl KindMarker for kind::$marker {
            const NAME: &'static str = $name;

            fn accepts(kind: ResourceKind) -> bool {
                kind == ResourceKind::$variant
            }
        }
    )+};
}

kind_marker! {
    Process => Process, "process";
    PrebuiltContainer => PrebuiltContainer, "prebuilt_container";
    BuiltContainer => BuiltContainer, "built_container";
    ExternalService => ExternalService, "external_service";
    ConnectionString => ConnectionString, "connection_string";
    Parameter => Parameter, "parameter";
    CertificateAuthorityCollection => CertificateAuthorityCollection, "certificate_authority_collection";
}

impl sealed::Sealed for AnyKind {}

impl KindMarker for AnyKind {
    const NAME: &'static str = "resource";

    fn accepts(_kind: ResourceKind) -> bool {
        true
    }
}

/// Kinds that take environment variables, arguments, references and trust
/// settings.
pub trait SupportsEnvironment: KindMarker {}
/// Kinds that declare endpoints.
pub trait SupportsEndpoints: KindMarker {}
/// Kinds that can wait on other resources.
pub trait SupportsWaits: KindMarker {}
/// Kinds that carry probes.
pub trait SupportsProbes: KindMarker {}
/// Both container kinds.
pub trait ContainerKind: KindMarker {}
/// Kinds whose value or endpoints can be injected by reference.
pub trait ReferenceSource: KindMarker {}

macro_rules! capabilities {
    ($($marker:ident: $($cap:ident),+;)+) => {$($(
        impl $cap for kind::$marker {}
    )+)+};
}

capabilities! {
    Process: SupportsEnvironment, SupportsEndpoints, SupportsWaits, SupportsProbes, ReferenceSource;
    PrebuiltContainer: SupportsEnvironment, SupportsEndpoints, SupportsWaits, SupportsProbes, ContainerKind, ReferenceSource;
    BuiltContainer: SupportsEnvironment, SupportsEndpoints, SupportsWaits, SupportsProbes, ContainerKind, ReferenceSource;
    ConnectionString: ReferenceSource;
    ExternalService: ReferenceSource;
}

/// A handle to one resource of kind `K`.
pub struct ResourceHandle<K> {
    graph: GraphHandle,
    name: ResourceName,
    node: Node,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for ResourceHandle<K> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            name: self.name.clone(),
            node: Node::clone(&self.node),
            _kind: PhantomData,
        }
    }
}

impl<K: KindMarker> fmt::Debug for ResourceHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("name", &self.name)
            .field("kind", &K::NAME)
            .finish_non_exhaustive()
    }
}

impl<K> ResourceHandle<K> {
    pub(crate) fn new(graph: GraphHandle, name: ResourceName, node: Node) -> Self {
        Self {
            graph,
            name,
            node,
            _kind: PhantomData,
        }
    }

    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// The graph the resource belongs to.
    #[must_use]
    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    /// The resource kind.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.node.read().kind()
    }

    /// A copy of the resource as it is now.
    #[must_use]
    pub fn snapshot(&self) -> Resource {
        self.node.read().clone()
    }

    /// Forget the kind marker.
    #[must_use]
    pub fn erase(self) -> ResourceHandle<AnyKind> {
        ResourceHandle::new(self.graph, self.name, self.node)
    }

    fn update(self, f: impl FnOnce(&mut Resource)) -> Self {
        f(&mut self.node.write());
        self
    }

    fn relate<T>(self, target: &ResourceHandle<T>, kind: RelationshipKind) -> ModelResult<Self> {
        self.graph.check_member(self.name.as_str(), target)?;
        self.graph
            .add_edge(self.name.as_str(), target.name.as_str(), kind)?;
        Ok(self)
    }

    /// Set the lifetime policy.
    pub fn with_lifetime(self, lifetime: Lifetime) -> Self {
        self.update(|r| r.lifetime = lifetime)
    }

    /// Set the icon.
    pub fn with_icon(self, name: impl Into<String>, variant: IconVariant) -> Self {
        let icon = Icon {
            name: name.into(),
            variant,
        };
        self.update(|r| r.annotations.icon = Some(icon))
    }

    /// Add a link. Validation checks that it parses.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.update(|r| {
            r.annotations.urls.entry(url).or_insert(None);
        })
    }

    /// Add a link with display text, replacing the text of an existing link.
    pub fn with_url_display(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        let (url, text) = (url.into(), text.into());
        self.update(|r| {
            r.annotations.urls.insert(url, Some(text));
        })
    }

    /// Set a plain-text description.
    pub fn with_description(self, text: impl Into<String>) -> Self {
        self.describe(text.into(), false)
    }

    /// Set a Markdown description.
    pub fn with_markdown_description(self, text: impl Into<String>) -> Self {
        self.describe(text.into(), true)
    }

    fn describe(self, text: String, markdown: bool) -> Self {
        self.update(|r| r.annotations.description = Some(Description { text, markdown }))
    }

    /// Omit the resource from published views.
    pub fn exclude_from_manifest(self) -> Self {
        self.update(|r| r.exclude_from_manifest = true)
    }

    /// Omit the resource from the control surface.
    pub fn exclude_from_control_surface(self) -> Self {
        self.update(|r| r.exclude_from_control_surface = true)
    }

    /// Never start the resource automatically.
    pub fn with_explicit_start(self) -> Self {
        self.update(|r| r.explicit_start = true)
    }

    /// Record that this resource references `target`. Nothing is injected.
    pub fn with_reference_relationship<T>(self, target: &ResourceHandle<T>) -> ModelResult<Self> {
        self.relate(target, RelationshipKind::References)
    }

    /// Record `target` as this resource's parent.
    pub fn with_parent_relationship<T>(self, target: &ResourceHandle<T>) -> ModelResult<Self> {
        self.relate(target, RelationshipKind::Parent)
    }

    /// Record `target` as this resource's child.
    pub fn with_child_relationship<T>(self, target: &ResourceHandle<T>) -> ModelResult<Self> {
        self.relate(target, RelationshipKind::Child)
    }

    /// Record a labelled relationship.
    pub fn with_relationship<T>(
        self,
        target: &ResourceHandle<T>,
        label: impl Into<String>,
    ) -> ModelResult<Self> {
        self.relate(target, RelationshipKind::Generic { label: label.into() })
    }
}

impl ResourceHandle<AnyKind> {
    /// Re-check the kind and return a typed handle.
    pub fn cast<K: KindMarker>(self) -> ModelResult<ResourceHandle<K>> {
        self.graph.typed(self.name.as_str())
    }
}

impl<K: SupportsWaits> ResourceHandle<K> {
    /// Start only after `target` is healthy.
    pub fn wait_for<T>(self, target: &ResourceHandle<T>) -> ModelResult<Self> {
        self.wait_for_with(target, WaitCondition::Healthy, WaitBehavior::default())
    }

    /// Start only after `target` is running.
    pub fn wait_for_start<T>(self, target: &ResourceHandle<T>) -> ModelResult<Self> {
        self.wait_for_with(target, WaitCondition::Started, WaitBehavior::default())
    }

    /// Start only after `target` exited with `exit_code`.
    pub fn wait_for_completion<T>(
        self,
        target: &ResourceHandle<T>,
        exit_code: i32,
    ) -> ModelResult<Self> {
        self.wait_for_with(
            target,
            WaitCondition::Completed { exit_code },
            WaitBehavior::default(),
        )
    }

    /// Gate on `condition` of `target`. Re-declaring a wait of the same
    /// condition kind on the same target replaces it.
    pub fn wait_for_with<T>(
        self,
        target: &ResourceHandle<T>,
        condition: WaitCondition,
        behavior: WaitBehavior,
    ) -> ModelResult<Self> {
        let kind = match condition {
            WaitCondition::Started => RelationshipKind::WaitForStart { behavior },
            WaitCondition::Healthy => RelationshipKind::WaitForHealthy { behavior },
            WaitCondition::Completed { exit_code } => {
                RelationshipKind::WaitForCompletion { exit_code, behavior }
            }
        };
        self.graph.check_member(self.name.as_str(), target)?;
        self.graph
            .add_edge(target.name.as_str(), self.name.as_str(), kind)?;
        Ok(self)
    }
}

impl<K: SupportsEnvironment> ResourceHandle<K> {
    /// Set one environment variable.
    pub fn with_environment(self, name: impl Into<String>, value: impl Into<ValueSource>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.update(|r| {
            r.env.insert(name, value);
        })
    }

    /// Replace the argument list.
    pub fn with_args<I, V>(self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ValueSource>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.update(|r| r.args = args)
    }

    /// Inject `target`'s connection string, URL or endpoints and record a
    /// reference.
    pub fn with_reference<T: ReferenceSource>(self, target: &ResourceHandle<T>) -> ModelResult<Self> {
        self.relate(target, RelationshipKind::References)
    }

    /// Inject `url` as the service discovery variable of `name`, without a
    /// resource behind it. Redeclaring a name replaces its URL.
    pub fn with_reference_uri(self, name: &str, url: impl Into<String>) -> ModelResult<Self> {
        let service = ResourceName::new(name)?;
        let url = url.into();
        check_url(&self.name, &url)?;
        Ok(self.update(|r| {
            r.service_uris.insert(service.to_string(), url);
        }))
    }

    /// Choose which variables this resource's references inject.
    pub fn with_reference_environment(self, flags: ReferenceEnvironment) -> Self {
        self.update(|r| r.reference_environment = flags)
    }

    /// Export telemetry over OTLP with `protocol`.
    pub fn with_otlp_exporter(self, protocol: OtlpProtocol) -> Self {
        self.update(|r| r.otlp = Some(protocol))
    }

    /// Trust the certificates of `collection`. Attaching twice is a no-op.
    pub fn with_certificate_authority_collection(
        self,
        collection: &ResourceHandle<kind::CertificateAuthorityCollection>,
    ) -> ModelResult<Self> {
        self.graph.check_member(self.name.as_str(), collection)?;
        let name = collection.name.clone();
        Ok(self.update(|r| {
            r.trust.collections.insert(name);
        }))
    }

    /// Trust (or stop trusting) the local developer certificate.
    pub fn with_developer_certificate_trust(self, trust: bool) -> Self {
        self.update(|r| r.trust.developer_trust = Some(trust))
    }

    /// Set how attached collections combine with the default roots.
    pub fn with_certificate_trust_scope(self, scope: CertificateTrustScope) -> Self {
        self.update(|r| r.trust.scope = Some(scope))
    }
}

impl<K: SupportsEndpoints> ResourceHandle<K> {
    /// Declare or replace an endpoint.
    pub fn with_endpoint(self, spec: EndpointSpec) -> ModelResult<Self> {
        self.declare_endpoint(spec)?;
        Ok(self)
    }

    /// Declare or replace an endpoint and return its id.
    pub fn declare_endpoint(&self, spec: EndpointSpec) -> ModelResult<EndpointId> {
        let mut resource = self.node.write();
        let name = resource.name.clone();
        resource.endpoints.declare(&name, spec)
    }

    /// The id of the endpoint called `name`, if declared.
    pub fn endpoint(&self, name: &str) -> Option<EndpointId> {
        let resource = self.node.read();
        resource.endpoints.get(name).map(|_| EndpointId {
            resource: resource.name.clone(),
            name: name.to_string(),
        })
    }

    /// Declare the `http` endpoint.
    pub fn with_http_endpoint(self, port: Option<u32>) -> ModelResult<Self> {
        self.with_scheme_endpoint(Scheme::Http, port)
    }

    /// Declare the `https` endpoint.
    pub fn with_https_endpoint(self, port: Option<u32>) -> ModelResult<Self> {
        self.with_scheme_endpoint(Scheme::Https, port)
    }

    fn with_scheme_endpoint(self, scheme: Scheme, port: Option<u32>) -> ModelResult<Self> {
        let mut spec = EndpointSpec::new(scheme);
        spec.port = port;
        self.with_endpoint(spec)
    }

    /// Mark every HTTP and HTTPS endpoint external.
    pub fn with_external_http_endpoints(self) -> Self {
        self.update(|r| {
            r.endpoints.update_all(|e| {
                if e.scheme.is_http() {
                    e.is_external = true;
                }
            });
        })
    }

    /// The endpoints speak HTTP/2.
    pub fn as_http2_service(self) -> Self {
        self.update(|r| r.http2 = true)
    }
}

impl<K: SupportsProbes> ResourceHandle<K> {
    /// Declare or replace a probe, keyed by kind and path.
    pub fn with_http_probe(self, spec: ProbeSpec) -> Self {
        self.update(|r| r.probes.upsert(spec))
    }

    /// A readiness probe on `path`, optionally requiring one status code and
    /// naming the endpoint.
    pub fn with_http_health_check(
        self,
        path: impl Into<String>,
        expected_status: Option<u16>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut spec = ProbeSpec::readiness(path);
        spec.expected_status = expected_status;
        spec.endpoint = endpoint.map(str::to_string);
        self.with_http_probe(spec)
    }
}

impl<K: ContainerKind> ResourceHandle<K> {
    fn update_container(self, f: impl FnOnce(&mut crate::container::ContainerSpec)) -> Self {
        self.update(|r| {
            if let Some(container) = r.spec.container_mut() {
                f(container);
            }
        })
    }

    /// Set the image tag.
    pub fn with_image_tag(self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.update_container(|c| c.tag = Some(tag))
    }

    /// Set the registry.
    pub fn with_image_registry(self, registry: impl Into<String>) -> Self {
        let registry = registry.into();
        self.update_container(|c| c.registry = Some(registry))
    }

    /// Override the entrypoint.
    pub fn with_entrypoint(self, entrypoint: impl Into<String>) -> Self {
        let entrypoint = entrypoint.into();
        self.update_container(|c| c.entrypoint = Some(entrypoint))
    }

    /// Fix the container name.
    pub fn with_container_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.update_container(|c| c.container_name = Some(name))
    }

    /// Replace the container runtime arguments.
    pub fn with_container_runtime_args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.update_container(|c| c.runtime_args = args)
    }

    /// Set the pull policy.
    pub fn with_image_pull_policy(self, policy: ImagePullPolicy) -> Self {
        self.update_container(|c| c.pull_policy = policy)
    }

    /// Mount a volume at `target`, replacing any volume there.
    pub fn with_volume(self, name: Option<&str>, target: impl Into<String>, read_only: bool) -> Self {
        let volume = Volume {
            name: name.map(str::to_string),
            target: target.into(),
            read_only,
        };
        self.update_container(|c| {
            c.volumes.insert(volume.target.clone(), volume);
        })
    }

    /// Mount a host path at `target`, replacing any mount there.
    pub fn with_bind_mount(
        self,
        source: impl AsRef<Path>,
        target: impl Into<String>,
        read_only: bool,
    ) -> Self {
        let mount = BindMount {
            source: source.as_ref().to_path_buf(),
            target: target.into(),
            read_only,
        };
        self.update_container(|c| {
            c.bind_mounts.insert(mount.target.clone(), mount);
        })
    }
}

impl ResourceHandle<kind::BuiltContainer> {
    fn update_build(self, f: impl FnOnce(&mut crate::container::BuildSpec)) -> Self {
        self.update(|r| {
            if let ResourceSpec::BuiltContainer { build, .. } = &mut r.spec {
                f(build);
            }
        })
    }

    /// Use a Dockerfile other than `<context>/Dockerfile`.
    pub fn with_dockerfile(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        self.update_build(|b| b.dockerfile = Some(path))
    }

    /// Build only up to `stage`.
    pub fn with_build_stage(self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        self.update_build(|b| b.stage = Some(stage))
    }

    /// Set a build argument.
    pub fn with_build_arg(self, name: impl Into<String>, value: impl Into<ValueSource>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.update_build(|b| {
            b.build_args.insert(name, value);
        })
    }

    /// Pass a parameter as build secret `id`.
    pub fn with_build_secret(
        self,
        id: impl Into<String>,
        parameter: &ResourceHandle<kind::Parameter>,
    ) -> ModelResult<Self> {
        self.graph.check_member(self.name.as_str(), parameter)?;
        let (id, parameter) = (id.into(), parameter.name.clone());
        Ok(self.update_build(|b| {
            b.build_secrets.insert(id, parameter);
        }))
    }
}

impl ResourceHandle<kind::Process> {
    fn update_process(self, f: impl FnOnce(&mut crate::resource::ProcessSpec)) -> Self {
        self.update(|r| {
            if let ResourceSpec::Process(process) = &mut r.spec {
                f(process);
            }
        })
    }

    /// Set the working directory.
    pub fn with_working_dir(self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        self.update_process(|p| p.working_dir = Some(dir))
    }

    /// Run `replicas` instances.
    pub fn with_replicas(self, replicas: u32) -> Self {
        self.update_process(|p| p.replicas = replicas)
    }
}

impl ResourceHandle<kind::Parameter> {
    fn update_parameter(self, f: impl FnOnce(&mut bool, &mut bool)) -> Self {
        self.update(|r| {
            if let ResourceSpec::Parameter {
                secret,
                publish_value_as_default,
                ..
            } = &mut r.spec
            {
                f(secret, publish_value_as_default);
            }
        })
    }

    /// Redact the value in every exported view.
    pub fn secret(self) -> Self {
        self.update_parameter(|secret, _| *secret = true)
    }

    /// Bake the value into published views.
    pub fn publish_value_as_default(self) -> Self {
        self.update_parameter(|_, publish| *publish = true)
    }
}

impl ResourceHandle<kind::ConnectionString> {
    fn update_connection_string(
        self,
        f: impl FnOnce(&mut Option<ValueSource>, &mut Option<String>, &mut Option<ResourceName>),
    ) -> Self {
        self.update(|r| {
            if let ResourceSpec::ConnectionString {
                value,
                env_var,
                redirect,
            } = &mut r.spec
            {
                f(value, env_var, redirect);
            }
        })
    }

    /// Set the value instead of reading it from configuration.
    pub fn with_connection_string_value(self, source: impl Into<ValueSource>) -> Self {
        let source = source.into();
        self.update_connection_string(|value, _, _| *value = Some(source))
    }

    /// Inject as `var` instead of `ConnectionStrings__{name}`.
    pub fn with_connection_string_env(self, var: impl Into<String>) -> Self {
        let var = var.into();
        self.update_connection_string(|_, env_var, _| *env_var = Some(var))
    }

    /// Resolve to `target`'s value. The last call wins.
    pub fn with_connection_string_redirection(
        self,
        target: &ResourceHandle<kind::ConnectionString>,
    ) -> ModelResult<Self> {
        self.graph.check_member(self.name.as_str(), target)?;
        let target = target.name.clone();
        Ok(self.update_connection_string(|_, _, redirect| *redirect = Some(target)))
    }
}

impl ResourceHandle<kind::CertificateAuthorityCollection> {
    fn update_collection(
        self,
        f: impl FnOnce(&mut crate::certificate::CertificateAuthorityCollectionSpec),
    ) -> Self {
        self.update(|r| {
            if let ResourceSpec::CertificateAuthorityCollection(spec) = &mut r.spec {
                f(spec);
            }
        })
    }

    /// Add one certificate.
    pub fn with_certificate(self, certificate: Certificate) -> Self {
        self.update_collection(|c| c.add(certificate))
    }

    /// Add several certificates.
    pub fn with_certificates(self, certificates: impl IntoIterator<Item = Certificate>) -> Self {
        self.update_collection(|c| certificates.into_iter().for_each(|cert| c.add(cert)))
    }

    /// Load a PEM bundle at materialization time.
    pub fn with_certificate_bundle(self, path: impl AsRef<Path>) -> Self {
        self.update_collection(|c| c.add_bundle_file(path))
    }

    /// Load a platform store at materialization time.
    pub fn with_certificates_from_store(self, store: StoreName, location: StoreLocation) -> Self {
        self.update_collection(|c| c.add_store(store, location))
    }
}

impl From<&ResourceHandle<kind::Parameter>> for ValueSource {
    fn from(handle: &ResourceHandle<kind::Parameter>) -> Self {
        Self::Parameter(handle.name.clone())
    }
}

impl From<&ResourceHandle<kind::ConnectionString>> for ValueSource {
    fn from(handle: &ResourceHandle<kind::ConnectionString>) -> Self {
        Self::ConnectionString(handle.name.clone())
    }
}

impl From<&ResourceHandle<kind::ExternalService>> for ValueSource {
    fn from(handle: &ResourceHandle<kind::ExternalService>) -> Self {
        Self::ExternalServiceUrl(handle.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::probe::ProbeKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_valued_setters_replace() {
        let graph = GraphHandle::new();
        let api = graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_environment("MODE", "a")
            .with_environment("MODE", "b")
            .with_lifetime(Lifetime::Persistent)
            .with_lifetime(Lifetime::Ephemeral)
            .with_description("first")
            .with_markdown_description("**second**");

        let r = api.snapshot();
        assert_eq!(r.env["MODE"], ValueSource::from("b"));
        assert_eq!(r.lifetime, Lifetime::Ephemeral);
        assert_eq!(
            r.annotations.description,
            Some(Description {
                text: "**second**".into(),
                markdown: true
            })
        );
    }

    #[test]
    fn url_display_text_upserts_by_url() {
        let graph = GraphHandle::new();
        let r = graph
            .add_container("web", "nginx")
            .unwrap()
            .with_url("http://localhost/admin")
            .with_url_display("http://localhost/admin", "Admin")
            .with_url("http://localhost/admin")
            .snapshot();
        assert_eq!(r.annotations.urls.len(), 1);
        assert_eq!(
            r.annotations.urls["http://localhost/admin"].as_deref(),
            Some("Admin")
        );
    }

    #[test]
    fn icon_defaults_to_filled() {
        assert_eq!(IconVariant::default(), IconVariant::Filled);
    }

    #[test]
    fn redirection_last_call_wins() {
        let graph = GraphHandle::new();
        let a = graph.add_connection_string("a").unwrap();
        let b = graph.add_connection_string("b").unwrap();
        let c = graph.add_connection_string("c").unwrap();
        let a = a
            .with_connection_string_redirection(&b)
            .unwrap()
            .with_connection_string_redirection(&c)
            .unwrap();
        let ResourceSpec::ConnectionString { redirect, .. } = a.snapshot().spec else {
            panic!("expected a connection string");
        };
        assert_eq!(redirect.as_ref().map(ResourceName::as_str), Some("c"));
    }

    #[test]
    fn uri_reference_needs_a_name_and_an_absolute_url() {
        let graph = GraphHandle::new();
        let api = graph.add_executable("api", "api", ".").unwrap();
        assert!(matches!(
            api.clone().with_reference_uri("payments", "not a url"),
            Err(ModelError::InvalidUrl { .. })
        ));
        assert!(matches!(
            api.clone().with_reference_uri("", "https://pay.example.com/"),
            Err(ModelError::InvalidName(_))
        ));
        let api = api
            .with_reference_uri("payments", "https://pay.example.com/")
            .unwrap()
            .with_otlp_exporter(OtlpProtocol::HttpProtobuf)
            .with_reference_environment(ReferenceEnvironment::CONNECTION_STRING);

        let resource = api.snapshot();
        assert_eq!(
            resource.service_uris.get("payments").map(String::as_str),
            Some("https://pay.example.com/")
        );
        assert_eq!(resource.otlp, Some(OtlpProtocol::HttpProtobuf));
        assert_eq!(resource.reference_environment, ReferenceEnvironment::CONNECTION_STRING);
    }

    #[test]
    fn declared_endpoints_are_addressable_by_id() {
        let graph = GraphHandle::new();
        let api = graph.add_executable("api", "api", ".").unwrap();
        let id = api
            .declare_endpoint(EndpointSpec::http().named("admin").port(9000))
            .unwrap();
        assert_eq!(id.to_string(), "api/admin");
        assert_eq!(api.endpoint("admin"), Some(id));

        let api = api.with_http_endpoint(Some(8080)).unwrap();
        assert_eq!(api.endpoint("http").map(|id| id.name), Some("http".to_string()));
        assert_eq!(api.endpoint("grpc"), None);
    }

    #[test]
    fn waits_on_the_same_target_upsert() {
        let graph = GraphHandle::new();
        let migrate = graph.add_executable("migrate", "migrate", ".").unwrap();
        let api = graph.add_executable("api", "api", ".").unwrap();
        api.wait_for_completion(&migrate, 0)
            .unwrap()
            .wait_for_completion(&migrate, 2)
            .unwrap()
            .wait_for_start(&migrate)
            .unwrap();

        let edges = graph.relationships();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].from.as_str(), "migrate");
        assert_eq!(edges[0].to.as_str(), "api");
        assert_eq!(
            edges[0].kind,
            RelationshipKind::WaitForCompletion {
                exit_code: 2,
                behavior: WaitBehavior::WaitOnResourceUnavailable
            }
        );
    }

    #[test]
    fn handles_from_another_graph_are_rejected() {
        let left = GraphHandle::new();
        let right = GraphHandle::new();
        let api = left.add_executable("api", "api", ".").unwrap();
        let db = right.add_connection_string("db").unwrap();
        let err = api.with_reference(&db).unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference { .. }));
    }

    #[test]
    fn certificate_collection_attaches_once() {
        let graph = GraphHandle::new();
        let ca = graph.add_certificate_authority_collection("corp").unwrap();
        let r = graph
            .add_container("web", "nginx")
            .unwrap()
            .with_certificate_authority_collection(&ca)
            .unwrap()
            .with_certificate_authority_collection(&ca)
            .unwrap()
            .with_developer_certificate_trust(true)
            .with_developer_certificate_trust(false)
            .snapshot();
        assert_eq!(r.trust.collections.len(), 1);
        assert_eq!(r.trust.developer_trust, Some(false));
    }

    #[test]
    fn external_http_endpoints_skip_tcp() {
        let graph = GraphHandle::new();
        let r = graph
            .add_container("web", "nginx")
            .unwrap()
            .with_http_endpoint(Some(8080))
            .unwrap()
            .with_endpoint(EndpointSpec::new(Scheme::Tcp).port(9000))
            .unwrap()
            .with_external_http_endpoints()
            .snapshot();
        assert!(r.endpoints.get("http").unwrap().is_external);
        assert!(!r.endpoints.get("tcp").unwrap().is_external);
    }

    #[test]
    fn health_check_is_a_readiness_probe() {
        let graph = GraphHandle::new();
        let r = graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_http_health_check("/health", Some(204), Some("http"))
            .with_http_health_check("/health", None, None)
            .snapshot();
        assert_eq!(r.probes.len(), 1);
        let probe = r.probes.iter().next().unwrap();
        assert_eq!(probe.kind, ProbeKind::Readiness);
        assert_eq!(probe.expected_status, None);
    }

    #[test]
    fn mounts_upsert_by_target() {
        let graph = GraphHandle::new();
        let r = graph
            .add_container("db", "postgres")
            .unwrap()
            .with_volume(Some("data"), "/var/lib/postgresql/data", false)
            .with_volume(Some("data2"), "/var/lib/postgresql/data", false)
            .with_bind_mount("./init", "/docker-entrypoint-initdb.d", true)
            .snapshot();
        let container = r.spec.container().unwrap();
        assert_eq!(container.volumes.len(), 1);
        assert_eq!(
            container.volumes["/var/lib/postgresql/data"].name.as_deref(),
            Some("data2")
        );
        assert_eq!(container.bind_mounts.len(), 1);
    }

    #[test]
    fn any_handle_casts_back() {
        let graph = GraphHandle::new();
        graph.add_parameter("pw", "x").unwrap();
        let pw = graph.handle("pw").unwrap().cast::<kind::Parameter>().unwrap();
        assert!(pw.secret().snapshot().is_secret());
    }
}
