//! Typed edges between resources.
//!
//! Ordering edges point from the predecessor to the dependent, so
//! `api.wait_for_start(&db)` records `db -> api`. Metadata edges point from the
//! declaring resource to its target.

use conductor_core::ResourceName;
use serde::{Deserialize, Serialize};

/// What a waiting resource does when its target can never satisfy the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitBehavior {
    /// Keep waiting; the dependent is reported blocked.
    #[default]
    WaitOnResourceUnavailable,
    /// Give up; the dependent is reported failed.
    StopOnResourceUnavailable,
}

/// The kind of a relationship edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationshipKind {
    /// The dependent consumes a value of the target.
    References,
    /// Gate on the predecessor reaching `Started`.
    WaitForStart {
        /// Behavior when the predecessor cannot start.
        #[serde(default)]
        behavior: WaitBehavior,
    },
    /// Gate on the predecessor reaching `Healthy`.
    WaitForHealthy {
        /// Behavior when the predecessor cannot become healthy.
        #[serde(default)]
        behavior: WaitBehavior,
    },
    /// Gate on the predecessor exiting with `exit_code`.
    WaitForCompletion {
        /// The required exit code.
        exit_code: i32,
        /// Behavior when the predecessor cannot run to completion.
        #[serde(default)]
        behavior: WaitBehavior,
    },
    /// The target is the declaring resource's parent.
    Parent,
    /// The target is the declaring resource's child.
    Child,
    /// Free-form labelled relationship.
    Generic {
        /// The label shown by tooling.
        label: String,
    },
}

impl RelationshipKind {
    /// Returns `true` for edges the orchestrator orders by.
    #[must_use]
    pub fn is_ordering(&self) -> bool {
        self.wait_condition().is_some()
    }

    /// The condition an ordering edge gates on.
    #[must_use]
    pub fn wait_condition(&self) -> Option<WaitCondition> {
        match self {
            Self::WaitForStart { .. } => Some(WaitCondition::Started),
            Self::WaitForHealthy { .. } => Some(WaitCondition::Healthy),
            Self::WaitForCompletion { exit_code, .. } => Some(WaitCondition::Completed {
                exit_code: *exit_code,
            }),
            _ => None,
        }
    }

    /// The wait behavior of an ordering edge.
    #[must_use]
    pub fn behavior(&self) -> Option<WaitBehavior> {
        match self {
            Self::WaitForStart { behavior }
            | Self::WaitForHealthy { behavior }
            | Self::WaitForCompletion { behavior, .. } => Some(*behavior),
            _ => None,
        }
    }

    /// The identity of the edge between one pair of resources: waits are keyed
    /// by condition kind, generic edges by label.
    fn slot(&self) -> (&'static str, &str) {
        match self {
            Self::References => ("references", ""),
            Self::WaitForStart { .. } => ("wait_for_start", ""),
            Self::WaitForHealthy { .. } => ("wait_for_healthy", ""),
            Self::WaitForCompletion { .. } => ("wait_for_completion", ""),
            Self::Parent => ("parent", ""),
            Self::Child => ("child", ""),
            Self::Generic { label } => ("generic", label),
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitForCompletion { exit_code, .. } => {
                write!(f, "wait_for_completion({exit_code})")
            }
            Self::Generic { label } => write!(f, "{label}"),
            other => f.write_str(other.slot().0),
        }
    }
}

/// A directed, typed edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// Source of the edge.
    pub from: ResourceName,
    /// Target of the edge.
    pub to: ResourceName,
    /// Edge kind.
    pub kind: RelationshipKind,
}

impl Relationship {
    /// Returns `true` if `other` occupies the same slot and should replace
    /// this edge rather than sit beside it.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        self.from == other.from && self.to == other.to && self.kind.slot() == other.kind.slot()
    }
}

/// The condition a dependent waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    /// The predecessor is running.
    Started,
    /// The predecessor passed its readiness probes.
    Healthy,
    /// The predecessor exited with this code.
    Completed {
        /// The required exit code.
        exit_code: i32,
    },
}

impl std::fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Healthy => write!(f, "healthy"),
            Self::Completed { exit_code } => write!(f, "exited({exit_code})"),
        }
    }
}

/// One gate of a dependent: which predecessor, what condition, what to do if
/// the condition becomes impossible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRequirement {
    /// The predecessor.
    pub on: ResourceName,
    /// The condition.
    pub condition: WaitCondition,
    /// Reaction to an impossible condition.
    pub behavior: WaitBehavior,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn edge(from: &str, to: &str, kind: RelationshipKind) -> Relationship {
        Relationship {
            from: ResourceName::new(from).unwrap(),
            to: ResourceName::new(to).unwrap(),
            kind,
        }
    }

    #[rstest]
    #[case(RelationshipKind::References, false)]
    #[case(RelationshipKind::Parent, false)]
    #[case(RelationshipKind::Child, false)]
    #[case(RelationshipKind::Generic { label: "uses".into() }, false)]
    #[case(RelationshipKind::WaitForStart { behavior: WaitBehavior::default() }, true)]
    #[case(RelationshipKind::WaitForHealthy { behavior: WaitBehavior::default() }, true)]
    #[case(RelationshipKind::WaitForCompletion { exit_code: 0, behavior: WaitBehavior::default() }, true)]
    fn ordering_edges(#[case] kind: RelationshipKind, #[case] expected: bool) {
        assert_eq!(kind.is_ordering(), expected);
    }

    #[test]
    fn completion_waits_share_a_slot_regardless_of_exit_code() {
        let a = edge(
            "migrate",
            "api",
            RelationshipKind::WaitForCompletion {
                exit_code: 0,
                behavior: WaitBehavior::default(),
            },
        );
        let b = edge(
            "migrate",
            "api",
            RelationshipKind::WaitForCompletion {
                exit_code: 3,
                behavior: WaitBehavior::StopOnResourceUnavailable,
            },
        );
        assert!(a.same_slot(&b));
    }

    #[test]
    fn start_and_healthy_waits_are_distinct() {
        let a = edge("db", "api", RelationshipKind::WaitForStart { behavior: WaitBehavior::default() });
        let b = edge("db", "api", RelationshipKind::WaitForHealthy { behavior: WaitBehavior::default() });
        assert!(!a.same_slot(&b));
    }

    #[test]
    fn generic_edges_are_keyed_by_label() {
        let a = edge("api", "docs", RelationshipKind::Generic { label: "documents".into() });
        let b = edge("api", "docs", RelationshipKind::Generic { label: "serves".into() });
        assert!(!a.same_slot(&b));
        assert!(a.same_slot(&a.clone()));
    }

    #[test]
    fn serde_uses_tagged_kinds() {
        let json = serde_json::to_value(RelationshipKind::WaitForCompletion {
            exit_code: 1,
            behavior: WaitBehavior::StopOnResourceUnavailable,
        })
        .unwrap();
        assert_eq!(json["type"], "wait_for_completion");
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["behavior"], "stop_on_resource_unavailable");
    }
}
