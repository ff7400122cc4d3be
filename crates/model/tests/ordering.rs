//! Ordering over wait edges.

use conductor_model::{GraphHandle, ModelError, RelationshipKind, WaitBehavior};
use proptest::prelude::*;

fn start() -> RelationshipKind {
    RelationshipKind::WaitForStart {
        behavior: WaitBehavior::default(),
    }
}

fn level_of(levels: &[Vec<conductor_core::ResourceName>], name: &str) -> usize {
    levels
        .iter()
        .position(|level| level.iter().any(|n| n == name))
        .unwrap()
}

#[test]
fn wait_edge_orders_and_reverse_edge_cycles() {
    let graph = GraphHandle::new();
    let a = graph.add_executable("a", "a", ".").unwrap();
    let b = graph.add_executable("b", "b", ".").unwrap();
    b.clone().wait_for_start(&a).unwrap();

    let levels = graph.topo_order().unwrap();
    assert!(level_of(&levels, "a") < level_of(&levels, "b"));

    a.wait_for_start(&b).unwrap();
    let err = graph.topo_order().unwrap_err();
    assert!(matches!(err, ModelError::CyclicDependency { ref members } if members.len() == 2));
}

#[test]
fn completion_and_healthy_waits_order_too() {
    let graph = GraphHandle::new();
    let db = graph.add_container("db", "postgres").unwrap();
    let migrate = graph.add_executable("migrate", "migrate", ".").unwrap();
    let api = graph.add_executable("api", "api", ".").unwrap();
    let migrate = migrate.wait_for(&db).unwrap();
    api.wait_for_completion(&migrate, 0).unwrap();

    let levels = graph.topo_order().unwrap();
    assert_eq!(levels.len(), 3);
    assert_eq!(level_of(&levels, "api"), 2);
}

proptest! {
    // edges only go from a lower to a higher index, so the graph is acyclic
    #[test]
    fn every_wait_edge_points_forward(
        size in 2usize..12,
        raw_edges in prop::collection::vec((0usize..12, 0usize..12), 0..40)
    ) {
        let graph = GraphHandle::new();
        for i in 0..size {
            graph.add_executable(&format!("r{i}"), "run", ".").unwrap();
        }
        let mut edges = Vec::new();
        for (x, y) in raw_edges {
            let (from, to) = (x.min(y), x.max(y));
            if from == to || to >= size {
                continue;
            }
            graph.add_edge(&format!("r{from}"), &format!("r{to}"), start()).unwrap();
            edges.push((from, to));
        }

        let levels = graph.topo_order().unwrap();
        let total: usize = levels.iter().map(Vec::len).sum();
        prop_assert_eq!(total, size);
        for (from, to) in edges {
            let (from_name, to_name) = (format!("r{from}"), format!("r{to}"));
            prop_assert!(level_of(&levels, &from_name) < level_of(&levels, &to_name));
        }
        for level in &levels {
            let mut sorted = level.clone();
            sorted.sort_by_key(|n| n.as_str()[1..].parse::<usize>().unwrap());
            prop_assert_eq!(&sorted, level);
        }
    }
}
