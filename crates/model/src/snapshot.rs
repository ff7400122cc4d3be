//! Validated, read-only views of a graph.

use conductor_core::{ResourceName, SecretStore};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::graph::ResourceGraph;
use crate::relationship::Relationship;
use crate::resolve::{ResolveMode, Resolver};
use crate::resource::{ParameterSource, Resource, ResourceSpec};
use crate::validate;

/// Which audience a snapshot is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Everything, as the launcher sees it (secrets still redacted).
    Runtime,
    /// Deployment manifests; omits resources excluded from the manifest and
    /// withholds values not published as defaults.
    Publish,
    /// The management surface; omits resources excluded from it.
    ControlSurface,
}

impl View {
    /// Returns `true` if `resource` appears in this view.
    #[must_use]
    pub fn includes(self, resource: &Resource) -> bool {
        match self {
            Self::Runtime => true,
            Self::Publish => !resource.exclude_from_manifest,
            Self::ControlSurface => !resource.exclude_from_control_surface,
        }
    }

    /// Literal parameter values this view may carry.
    fn keeps_literal(self, secret: bool, publish_value_as_default: bool) -> bool {
        !secret && (self != Self::Publish || publish_value_as_default)
    }
}

/// One resource as a view shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceView {
    /// The resource, with withheld values scrubbed.
    pub resource: Resource,
    /// Displayed value of parameters, connection strings and external
    /// services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Displayed environment of processes and containers.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    /// Displayed arguments of processes and containers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// An immutable, serializable view of a validated graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The view this snapshot renders.
    pub view: View,
    /// Included resources, in insertion order.
    pub resources: Vec<ResourceView>,
    /// Edges whose both ends are included.
    pub relationships: Vec<Relationship>,
}

impl Snapshot {
    /// Look up one resource.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceView> {
        self.resources.iter().find(|r| r.resource.name == name)
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot serialized with [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Replace every literal the view may not carry with
/// [`ParameterSource::Withheld`]. Secrets are never carried.
fn scrub(graph: &ResourceGraph, view: View) -> ModelResult<ResourceGraph> {
    let mut scrubbed = ResourceGraph::default();
    for name in graph.names() {
        let Some(mut resource) = graph.resource(name.as_str()) else {
            continue;
        };
        if let ResourceSpec::Parameter {
            source,
            secret,
            publish_value_as_default,
        } = &mut resource.spec
        {
            if matches!(source, ParameterSource::Value(_))
                && !view.keeps_literal(*secret, *publish_value_as_default)
            {
                *source = ParameterSource::Withheld;
            }
        }
        scrubbed.insert(resource)?;
    }
    for edge in graph.relationships() {
        scrubbed.upsert_edge(edge.clone());
    }
    Ok(scrubbed)
}

/// Validate `graph`, then render `view`.
pub(crate) fn project(
    graph: &ResourceGraph,
    view: View,
    secrets: &dyn SecretStore,
) -> ModelResult<Snapshot> {
    let violations = validate::violations(graph, secrets);
    if !violations.is_empty() {
        return Err(ModelError::Validation(violations));
    }

    let scrubbed = scrub(graph, view)?;
    let mut resolver = Resolver::new(&scrubbed, secrets, ResolveMode::Display);
    let mut resources = Vec::new();
    let mut included: Vec<&ResourceName> = Vec::new();

    for name in scrubbed.names() {
        let Some(resource) = scrubbed.resource(name.as_str()) else {
            continue;
        };
        if !view.includes(&resource) {
            continue;
        }
        included.push(name);

        let kind = resource.kind();
        let value = if kind.has_value() {
            Some(resolver.value(name)?.display().to_string())
        } else {
            None
        };
        let (environment, args) = if kind.is_runnable() {
            let environment = resolver
                .environment(name)?
                .into_iter()
                .map(|(var, value)| (var, value.display().to_string()))
                .collect();
            let args = resolver
                .args(name)?
                .iter()
                .map(|arg| arg.display().to_string())
                .collect();
            (environment, args)
        } else {
            (IndexMap::new(), Vec::new())
        };

        resources.push(ResourceView {
            resource,
            value,
            environment,
            args,
        });
    }

    let relationships = scrubbed
        .relationships()
        .iter()
        .filter(|edge| included.contains(&&edge.from) && included.contains(&&edge.to))
        .cloned()
        .collect();

    debug!(?view, resources = resources.len(), "graph projected");
    Ok(Snapshot {
        view,
        resources,
        relationships,
    })
}
