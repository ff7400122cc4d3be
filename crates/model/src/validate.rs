//! Whole-graph validation. Every violation is collected; nothing stops at the
//! first one.

use std::collections::BTreeSet;

use conductor_core::{ResourceKind, ResourceName, SecretStore};

use crate::dependency::DependencyGraph;
use crate::error::{ModelError, ModelResult};
use crate::graph::ResourceGraph;
use crate::relationship::RelationshipKind;
use crate::resolve::{self, ResolveMode, Resolver};
use crate::resource::{ParameterSource, Resource, ResourceSpec};
use crate::value::ValueSource;

/// Check that `url` is an absolute URL.
pub(crate) fn check_url(resource: &ResourceName, url: &str) -> ModelResult<()> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| ModelError::InvalidUrl {
            resource: resource.clone(),
            url: url.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Default)]
struct Report(Vec<ModelError>);

impl Report {
    fn push(&mut self, err: ModelError) {
        if !self.0.iter().any(|seen| same_violation(seen, &err)) {
            self.0.push(err);
        }
    }

    fn check<T>(&mut self, result: ModelResult<T>) {
        if let Err(err) = result {
            self.push(err);
        }
    }
}

/// One redirection cycle is found once from each member; report it once.
fn same_violation(a: &ModelError, b: &ModelError) -> bool {
    match (a, b) {
        (
            ModelError::RedirectionCycle { chain: x },
            ModelError::RedirectionCycle { chain: y },
        ) => x.iter().collect::<BTreeSet<_>>() == y.iter().collect::<BTreeSet<_>>(),
        _ => a == b,
    }
}

/// Every violation in `graph`.
///
/// Values backed by configuration keys the store does not hold are deferred
/// to launch time and are not violations; parameters with no source at all
/// are.
pub(crate) fn violations(graph: &ResourceGraph, secrets: &dyn SecretStore) -> Vec<ModelError> {
    let mut report = Report::default();

    for edge in graph.relationships() {
        for end in [&edge.from, &edge.to] {
            if !graph.contains(end.as_str()) {
                report.push(ModelError::NotFound(end.to_string()));
            }
        }
        // wait edges point from the predecessor to the dependent
        if let RelationshipKind::WaitForCompletion { .. } = edge.kind
            && let Some(predecessor) = graph.resource(edge.from.as_str())
            && !predecessor.kind().is_runnable()
        {
            report.push(ModelError::InvalidReference {
                resource: edge.to.clone(),
                target: edge.from.clone(),
                reason: format!(
                    "a {} never exits, so it cannot be waited on to complete",
                    predecessor.kind()
                ),
            });
        }
    }

    let deps = DependencyGraph::build(graph);
    if deps.has_cycle() {
        report.push(ModelError::CyclicDependency {
            members: deps.cycle_members(),
        });
    }

    let mut resolver = Resolver::new(graph, secrets, ResolveMode::Display);
    for name in graph.names() {
        if let Some(resource) = graph.resource(name.as_str()) {
            check_resource(&resource, graph, &mut resolver, &mut report);
        }
    }

    report.0
}

fn check_resource(
    resource: &Resource,
    graph: &ResourceGraph,
    resolver: &mut Resolver<'_>,
    report: &mut Report,
) {
    let name = &resource.name;

    for url in resource.annotations.urls.keys() {
        report.check(check_url(name, url));
    }

    match &resource.spec {
        ResourceSpec::Parameter { source, .. } => {
            if *source == ParameterSource::Unset {
                report.push(ModelError::unresolved(name, resolve::UNSET));
            }
        }
        ResourceSpec::ExternalService {
            url: ValueSource::Literal(url),
        } => report.check(check_url(name, url)),
        _ => {}
    }

    if resource.kind().has_value() {
        report.check(resolver.value(name));
    }

    if resource.kind().is_runnable() {
        report.check(resolver.environment(name));
        report.check(resolver.args(name));
        report.check(resolver.build_inputs(name));
        check_probes(resource, report);
        check_trust(resource, graph, report);
    }
}

fn check_probes(resource: &Resource, report: &mut Report) {
    for probe in resource.probes.iter() {
        let reason = match &probe.endpoint {
            Some(endpoint) if resource.endpoints.get(endpoint).is_none() => {
                format!("endpoint `{endpoint}` is not declared")
            }
            Some(_) => continue,
            None => match resource.endpoints.len() {
                1 => continue,
                0 => "no endpoint is declared".to_string(),
                n => format!("{n} endpoints are declared and none is named"),
            },
        };
        report.push(ModelError::ProbeEndpoint {
            resource: resource.name.clone(),
            path: probe.path.clone(),
            reason,
        });
    }
}

fn check_trust(resource: &Resource, graph: &ResourceGraph, report: &mut Report) {
    for collection in &resource.trust.collections {
        match graph.resource(collection.as_str()) {
            None => report.push(ModelError::NotFound(collection.to_string())),
            Some(target) if target.kind() != ResourceKind::CertificateAuthorityCollection => {
                report.push(ModelError::InvalidReference {
                    resource: resource.name.clone(),
                    target: collection.clone(),
                    reason: "not a certificate authority collection".into(),
                });
            }
            Some(_) => {}
        }
    }
}
