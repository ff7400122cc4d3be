//! Ordering graph over wait edges, built on `petgraph`.
//!
//! Only ordering edges are loaded; reference and parent/child edges are
//! metadata, so a reference cycle is legal.

use std::collections::HashMap;

use conductor_core::ResourceName;
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{ModelError, ModelResult};
use crate::graph::ResourceGraph;
use crate::relationship::{RelationshipKind, WaitRequirement};

/// Resources as nodes (in insertion order) and wait edges pointing from
/// predecessor to dependent.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ResourceName, RelationshipKind>,
    index_map: HashMap<ResourceName, NodeIndex>,
}

impl DependencyGraph {
    /// Load every resource and ordering edge of `resources`. Edges naming an
    /// unknown resource are skipped; validation reports them.
    #[must_use]
    pub fn build(resources: &ResourceGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut index_map = HashMap::new();

        for name in resources.names() {
            let idx = graph.add_node(name.clone());
            index_map.insert(name.clone(), idx);
        }

        for edge in resources.relationships() {
            if !edge.kind.is_ordering() {
                continue;
            }
            if let (Some(&from), Some(&to)) = (index_map.get(&edge.from), index_map.get(&edge.to)) {
                graph.add_edge(from, to, edge.kind.clone());
            }
        }

        Self { graph, index_map }
    }

    /// Returns `true` if the ordering edges contain a cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        algo::is_cyclic_directed(&self.graph)
    }

    /// Resources on a cycle, in insertion order. Empty if acyclic.
    #[must_use]
    pub fn cycle_members(&self) -> Vec<ResourceName> {
        let mut members: Vec<NodeIndex> = algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self
                        .graph
                        .find_edge(component[0], component[0])
                        .is_some()
            })
            .flatten()
            .collect();
        members.sort_unstable();
        members.into_iter().map(|idx| self.graph[idx].clone()).collect()
    }

    /// Group resources into start levels with Kahn's algorithm.
    ///
    /// Every resource lands in a later level than each of its predecessors.
    /// Within a level, resources keep graph-insertion order.
    pub fn topo_levels(&self) -> ModelResult<Vec<Vec<ResourceName>>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                let degree = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count();
                (idx, degree)
            })
            .collect();

        let mut levels = Vec::new();
        let mut remaining: Vec<NodeIndex> = self.graph.node_indices().collect();

        while !remaining.is_empty() {
            let current: Vec<NodeIndex> = remaining
                .iter()
                .filter(|&&idx| in_degree[&idx] == 0)
                .copied()
                .collect();

            if current.is_empty() {
                return Err(ModelError::CyclicDependency {
                    members: self.cycle_members(),
                });
            }

            for &idx in &current {
                for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                    in_degree.entry(neighbor).and_modify(|deg| *deg -= 1);
                }
            }

            remaining.retain(|idx| !current.contains(idx));
            levels.push(current.into_iter().map(|idx| self.graph[idx].clone()).collect());
        }

        Ok(levels)
    }

    /// The gates of `name`, in edge-declaration order.
    #[must_use]
    pub fn predecessors(&self, name: &ResourceName) -> Vec<WaitRequirement> {
        let Some(&idx) = self.index_map.get(name) else {
            return Vec::new();
        };
        let mut gates: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|edge| {
                Some((
                    edge.id(),
                    WaitRequirement {
                        on: self.graph[edge.source()].clone(),
                        condition: edge.weight().wait_condition()?,
                        behavior: edge.weight().behavior()?,
                    },
                ))
            })
            .collect();
        gates.sort_by_key(|(id, _)| *id);
        gates.into_iter().map(|(_, gate)| gate).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphHandle;
    use crate::relationship::{WaitBehavior, WaitCondition};
    use pretty_assertions::assert_eq;

    fn names(levels: &[Vec<ResourceName>]) -> Vec<Vec<&str>> {
        levels
            .iter()
            .map(|level| level.iter().map(ResourceName::as_str).collect())
            .collect()
    }

    fn start() -> RelationshipKind {
        RelationshipKind::WaitForStart {
            behavior: WaitBehavior::default(),
        }
    }

    fn graph_of(resources: &[&str]) -> GraphHandle {
        let graph = GraphHandle::new();
        for name in resources {
            graph.add_executable(name, *name, ".").unwrap();
        }
        graph
    }

    #[test]
    fn independent_resources_share_one_level_in_insertion_order() {
        let graph = graph_of(&["c", "a", "b"]);
        let levels = graph.topo_order().unwrap();
        assert_eq!(names(&levels), vec![vec!["c", "a", "b"]]);
    }

    #[test]
    fn diamond_levels() {
        let graph = graph_of(&["api", "db", "cache", "web"]);
        graph.add_edge("db", "api", start()).unwrap();
        graph.add_edge("cache", "api", start()).unwrap();
        graph.add_edge("api", "web", start()).unwrap();

        let levels = graph.topo_order().unwrap();
        assert_eq!(names(&levels), vec![vec!["db", "cache"], vec!["api"], vec!["web"]]);
    }

    #[test]
    fn reverse_wait_edge_is_a_cycle() {
        let graph = graph_of(&["a", "b", "c"]);
        graph.add_edge("a", "b", start()).unwrap();
        graph.add_edge("b", "a", start()).unwrap();

        let err = graph.topo_order().unwrap_err();
        let ModelError::CyclicDependency { members } = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(
            members.iter().map(ResourceName::as_str).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn self_wait_is_a_cycle() {
        let graph = graph_of(&["a"]);
        graph.add_edge("a", "a", start()).unwrap();
        assert!(graph.dependencies().has_cycle());
        assert_eq!(graph.dependencies().cycle_members().len(), 1);
    }

    #[test]
    fn reference_cycle_is_legal() {
        let graph = graph_of(&["a", "b"]);
        graph.add_edge("a", "b", RelationshipKind::References).unwrap();
        graph.add_edge("b", "a", RelationshipKind::References).unwrap();
        graph.add_edge("a", "b", RelationshipKind::Parent).unwrap();

        let deps = graph.dependencies();
        assert!(!deps.has_cycle());
        for name in ["a", "b"] {
            assert!(deps.predecessors(&ResourceName::new(name).unwrap()).is_empty());
        }
        assert_eq!(graph.topo_order().unwrap().len(), 1);
    }

    #[test]
    fn predecessors_carry_conditions() {
        let graph = graph_of(&["migrate", "db", "api"]);
        graph
            .add_edge(
                "migrate",
                "api",
                RelationshipKind::WaitForCompletion {
                    exit_code: 0,
                    behavior: WaitBehavior::StopOnResourceUnavailable,
                },
            )
            .unwrap();
        graph
            .add_edge(
                "db",
                "api",
                RelationshipKind::WaitForHealthy {
                    behavior: WaitBehavior::default(),
                },
            )
            .unwrap();

        let deps = graph.dependencies();
        let api = ResourceName::new("api").unwrap();
        let gates = deps.predecessors(&api);
        assert_eq!(gates.len(), 2);
        assert_eq!(gates[0].on.as_str(), "migrate");
        assert_eq!(gates[0].condition, WaitCondition::Completed { exit_code: 0 });
        assert_eq!(gates[0].behavior, WaitBehavior::StopOnResourceUnavailable);
        assert_eq!(gates[1].condition, WaitCondition::Healthy);

        let db = ResourceName::new("db").unwrap();
        assert!(deps.predecessors(&db).is_empty());
    }
}
