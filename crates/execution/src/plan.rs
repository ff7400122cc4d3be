//! Launch plans.
//!
//! A [`LaunchPlan`] is everything the orchestrator needs to know before any
//! task runs: start levels, every resource's wait gates, and the fully
//! resolved launch spec each resource hands to the launcher. Resolution
//! failures are kept per resource instead of failing the plan, so one bad
//! value only takes down its own branch. An ordering cycle does fail the
//! plan; there is no safe order to start anything in.

use conductor_core::{ResourceKind, ResourceName, SecretStore, TrustStore};
use conductor_model::{
    Certificate, CertificateTrustScope, EndpointTable, GraphHandle, Lifetime, ModelError,
    ModelResult, ProbeTable, ResolveMode, Resolved, Resolver, Resource, ResourceGraph,
    ResourceSpec, WaitRequirement,
};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::ExecutionError;

/// A resource exactly as the launcher receives it: every value resolved,
/// every attached certificate read.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// The resource.
    pub name: ResourceName,
    /// Its kind.
    pub kind: ResourceKind,
    /// Kind-specific details as declared.
    pub spec: ResourceSpec,
    /// Environment, references first, explicit variables last.
    pub environment: IndexMap<String, Resolved>,
    /// Command-line arguments.
    pub args: Vec<Resolved>,
    /// Build arguments of a built container.
    pub build_args: IndexMap<String, Resolved>,
    /// Build secrets of a built container.
    pub build_secrets: IndexMap<String, Resolved>,
    /// Declared endpoints.
    pub endpoints: EndpointTable,
    /// Declared probes.
    pub probes: ProbeTable,
    /// Lifetime policy.
    pub lifetime: Lifetime,
    /// Certificates from every attached collection, de-duplicated.
    pub certificates: Vec<Certificate>,
    /// How `certificates` combine with the default roots.
    pub trust_scope: CertificateTrustScope,
    /// Whether the developer certificate is trusted.
    pub developer_trust: Option<bool>,
    /// Endpoints speak HTTP/2.
    pub http2: bool,
    /// The single value of a parameter, connection string, or external
    /// service.
    pub value: Option<Resolved>,
}

/// One resource's entry in the plan.
#[derive(Debug, Clone)]
pub struct PlannedResource {
    /// The resource.
    pub name: ResourceName,
    /// Its kind.
    pub kind: ResourceKind,
    /// Wait gates in declaration order.
    pub waits: Vec<WaitRequirement>,
    /// Held back until started by hand.
    pub explicit_start: bool,
    /// What to launch, or why it cannot be.
    pub launch: Result<LaunchSpec, ModelError>,
}

/// Start levels and per-resource launch specs for one run.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// Start levels; each resource appears after all its predecessors.
    pub levels: Vec<Vec<ResourceName>>,
    /// Every resource, in graph-insertion order.
    pub resources: IndexMap<ResourceName, PlannedResource>,
}

impl LaunchPlan {
    /// Plan a run of `graph`, resolving values against `secrets` and
    /// certificates against `trust`.
    pub fn build(
        graph: &GraphHandle,
        secrets: &dyn SecretStore,
        trust: &dyn TrustStore,
    ) -> Result<Self, ExecutionError> {
        let dependencies = graph.dependencies();
        let levels = dependencies.topo_levels()?;

        let guard = graph.read();
        let mut resolver = Resolver::new(&guard, secrets, ResolveMode::Runtime);
        let mut resources = IndexMap::with_capacity(guard.len());
        for name in guard.names() {
            let Some(resource) = guard.resource(name.as_str()) else {
                continue;
            };
            let launch = launch_spec(&guard, &mut resolver, &resource, trust);
            match &launch {
                Ok(_) => debug!(resource = %name, "planned"),
                Err(e) => warn!(resource = %name, error = %e, "resource cannot be launched"),
            }
            resources.insert(
                name.clone(),
                PlannedResource {
                    name: name.clone(),
                    kind: resource.kind(),
                    waits: dependencies.predecessors(name),
                    explicit_start: resource.explicit_start,
                    launch,
                },
            );
        }

        Ok(Self { levels, resources })
    }

    /// The entry for `name`.
    pub fn get(&self, name: &str) -> Option<&PlannedResource> {
        self.resources.get(name)
    }

    /// Number of planned resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if the graph was empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn launch_spec(
    graph: &ResourceGraph,
    resolver: &mut Resolver<'_>,
    resource: &Resource,
    trust: &dyn TrustStore,
) -> ModelResult<LaunchSpec> {
    let name = &resource.name;
    let kind = resource.kind();

    let value = if kind.has_value() {
        Some(resolver.value(name)?)
    } else {
        None
    };

    let (environment, args, build_args, build_secrets) = if kind.is_runnable() {
        let environment = resolver.environment(name)?;
        let args = resolver.args(name)?;
        let (build_args, build_secrets) = resolver.build_inputs(name)?;
        (environment, args, build_args, build_secrets)
    } else {
        Default::default()
    };

    let certificates = match &resource.spec {
        ResourceSpec::CertificateAuthorityCollection(collection) => {
            collection.materialize(name, trust)?
        }
        _ => attached_certificates(graph, resource, trust)?,
    };

    Ok(LaunchSpec {
        name: name.clone(),
        kind,
        spec: resource.spec.clone(),
        environment,
        args,
        build_args,
        build_secrets,
        endpoints: resource.endpoints.clone(),
        probes: resource.probes.clone(),
        lifetime: resource.lifetime,
        certificates,
        trust_scope: resource.trust.scope.unwrap_or_default(),
        developer_trust: resource.trust.developer_trust,
        http2: resource.http2,
        value,
    })
}

fn attached_certificates(
    graph: &ResourceGraph,
    resource: &Resource,
    trust: &dyn TrustStore,
) -> ModelResult<Vec<Certificate>> {
    let mut set: IndexMap<String, Certificate> = IndexMap::new();
    for collection in &resource.trust.collections {
        let attached = graph
            .resource(collection.as_str())
            .ok_or_else(|| ModelError::NotFound(collection.to_string()))?;
        let ResourceSpec::CertificateAuthorityCollection(spec) = &attached.spec else {
            return Err(ModelError::InvalidReference {
                resource: resource.name.clone(),
                target: collection.clone(),
                reason: "not a certificate authority collection".into(),
            });
        };
        for certificate in spec.materialize(collection, trust)? {
            set.entry(certificate.fingerprint().to_owned())
                .or_insert(certificate);
        }
    }
    Ok(set.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::{NoSecrets, NoTrustStore};
    use conductor_model::{WaitBehavior, WaitCondition};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const PEM_A: &str = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----";
    const PEM_B: &str = "-----BEGIN CERTIFICATE-----\nBBBB\n-----END CERTIFICATE-----";

    fn names(levels: &[Vec<ResourceName>]) -> Vec<Vec<&str>> {
        levels
            .iter()
            .map(|level| level.iter().map(ResourceName::as_str).collect())
            .collect()
    }

    #[test]
    fn plan_orders_and_collects_gates() {
        let graph = GraphHandle::new();
        let db = graph.add_connection_string("db").unwrap();
        let migrate = graph.add_executable("migrate", "migrate", ".").unwrap();
        let api = graph.add_executable("api", "api", ".").unwrap();
        let migrate = migrate.wait_for_start(&db).unwrap();
        api.wait_for_completion(&migrate, 0).unwrap();

        let secrets = HashMap::from([(
            "ConnectionStrings:db".to_owned(),
            "Host=localhost".to_owned(),
        )]);
        let plan = LaunchPlan::build(&graph, &secrets, &NoTrustStore).unwrap();

        assert_eq!(names(&plan.levels), vec![vec!["db"], vec!["migrate"], vec!["api"]]);
        let api = plan.get("api").unwrap();
        assert_eq!(
            api.waits,
            vec![WaitRequirement {
                on: ResourceName::new("migrate").unwrap(),
                condition: WaitCondition::Completed { exit_code: 0 },
                behavior: WaitBehavior::WaitOnResourceUnavailable,
            }]
        );
        let db = plan.get("db").unwrap().launch.as_ref().unwrap();
        assert_eq!(db.value.as_ref().map(Resolved::expose), Some("Host=localhost"));
    }

    #[test]
    fn unresolved_value_fails_only_its_resource() {
        let graph = GraphHandle::new();
        let db = graph.add_connection_string("db").unwrap();
        let api = graph.add_executable("api", "api", ".").unwrap();
        graph.add_executable("worker", "worker", ".").unwrap();
        api.with_reference(&db).unwrap();

        let plan = LaunchPlan::build(&graph, &NoSecrets, &NoTrustStore).unwrap();
        assert!(plan.get("db").unwrap().launch.is_err());
        assert!(plan.get("api").unwrap().launch.is_err());
        assert!(plan.get("worker").unwrap().launch.is_ok());
    }

    #[test]
    fn cycle_fails_the_plan() {
        let graph = GraphHandle::new();
        let a = graph.add_executable("a", "a", ".").unwrap();
        let b = graph.add_executable("b", "b", ".").unwrap();
        let a = a.wait_for_start(&b).unwrap();
        b.wait_for_start(&a).unwrap();

        let err = LaunchPlan::build(&graph, &NoSecrets, &NoTrustStore).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Plan(ModelError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn secrets_stay_wrapped_in_launch_environment() {
        let graph = GraphHandle::new();
        let password = graph.add_parameter("password", "hunter2").unwrap().secret();
        graph
            .add_executable("api", "api", ".")
            .unwrap()
            .with_environment("PASSWORD", &password);

        let plan = LaunchPlan::build(&graph, &NoSecrets, &NoTrustStore).unwrap();
        let api = plan.get("api").unwrap().launch.as_ref().unwrap();
        let value = &api.environment["PASSWORD"];
        assert!(value.is_secret());
        assert_eq!(value.expose(), "hunter2");
        assert!(!format!("{api:?}").contains("hunter2"));
    }

    #[test]
    fn attached_collections_are_merged_without_duplicates() {
        let graph = GraphHandle::new();
        let corp = graph
            .add_certificate_authority_collection("corp")
            .unwrap()
            .with_certificates([Certificate::from_pem(PEM_A), Certificate::from_pem(PEM_B)]);
        let lab = graph
            .add_certificate_authority_collection("lab")
            .unwrap()
            .with_certificate(Certificate::from_pem(PEM_A));
        graph
            .add_container("web", "nginx")
            .unwrap()
            .with_certificate_authority_collection(&corp)
            .unwrap()
            .with_certificate_authority_collection(&lab)
            .unwrap()
            .with_certificate_trust_scope(CertificateTrustScope::Override);

        let plan = LaunchPlan::build(&graph, &NoSecrets, &NoTrustStore).unwrap();
        let web = plan.get("web").unwrap().launch.as_ref().unwrap();
        assert_eq!(web.certificates.len(), 2);
        assert_eq!(web.trust_scope, CertificateTrustScope::Override);
        assert_eq!(web.kind, ResourceKind::PrebuiltContainer);
    }
}
