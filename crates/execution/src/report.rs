//! Run reports.

use chrono::{DateTime, Utc};
use conductor_core::{ResourceName, RunId};
use conductor_model::{ProbeKind, WaitCondition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::ResourceState;
use crate::table::Transition;

/// Why one branch of the run failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum Failure {
    /// A completion gate saw the wrong exit code.
    #[error("{predecessor} exited with {actual}, expected {expected}")]
    OrderingMismatch {
        /// The predecessor that exited.
        predecessor: ResourceName,
        /// The exit code the gate required.
        expected: i32,
        /// The exit code it reported.
        actual: i32,
    },

    /// A probe exceeded its failure threshold.
    #[error("{kind} probe {path} failed {failures} consecutive times")]
    ProbeFailure {
        /// Probe kind.
        kind: ProbeKind,
        /// Probe path.
        path: String,
        /// Consecutive failures observed.
        failures: u32,
    },

    /// The launcher could not start the resource.
    #[error("launch failed: {0}")]
    LaunchFailed(String),

    /// A value the resource needs could not be resolved.
    #[error("unresolved: {0}")]
    Unresolved(String),

    /// A predecessor can no longer meet the gate and the gate was told to
    /// stop rather than wait.
    #[error("{predecessor} can no longer become {condition}")]
    DependencyUnavailable {
        /// The predecessor.
        predecessor: ResourceName,
        /// The condition it failed to meet.
        condition: WaitCondition,
    },

    /// The state table refused a move the control task needed.
    #[error("state: {0}")]
    State(String),

    /// The control task panicked.
    #[error("control task panicked: {0}")]
    Panicked(String),
}

/// How one resource's part of the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Running and healthy.
    Ready,
    /// Exited on its own.
    Exited {
        /// Exit code.
        code: i32,
    },
    /// Healthy once, then lost liveness.
    Degraded,
    /// Marked for explicit start; never launched.
    NotStarted,
    /// Still `Pending`: a predecessor can never meet its gate.
    Blocked {
        /// The predecessors it is stuck on.
        waiting_on: Vec<ResourceName>,
    },
    /// Fatal failure of this branch.
    Failed(Failure),
    /// Still `Pending` or `Starting` when the run deadline passed.
    TimedOut,
    /// Interrupted by abort or fail-fast.
    Cancelled,
}

impl Outcome {
    /// Returns `true` if the outcome counts against the run.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. } | Self::Failed(_) | Self::TimedOut | Self::Cancelled
        )
    }

    /// Fold the resource's current state into its settlement outcome: a
    /// ready resource that later exited or degraded reports that instead.
    #[must_use]
    pub fn with_state(self, state: ResourceState) -> Self {
        match (self, state) {
            (Self::Ready, ResourceState::Exited { code }) => Self::Exited { code },
            (Self::Ready, ResourceState::Degraded) => Self::Degraded,
            (outcome, _) => outcome,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Exited { code } => write!(f, "exited({code})"),
            Self::Degraded => write!(f, "degraded"),
            Self::NotStarted => write!(f, "not_started"),
            Self::Blocked { waiting_on } => {
                let names: Vec<&str> = waiting_on.iter().map(ResourceName::as_str).collect();
                write!(f, "blocked on {}", names.join(", "))
            }
            Self::Failed(failure) => write!(f, "failed: {failure}"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final record of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    /// The resource.
    pub name: ResourceName,
    /// State when the report was taken.
    pub state: ResourceState,
    /// How its control task settled.
    pub outcome: Outcome,
    /// Every accepted state change.
    pub history: Vec<Transition>,
}

/// Final record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run.
    pub run_id: RunId,
    /// When orchestration began.
    pub started_at: DateTime<Utc>,
    /// When the report was taken.
    pub finished_at: DateTime<Utc>,
    /// Every resource, in graph-insertion order.
    pub resources: IndexMap<ResourceName, ResourceReport>,
}

impl RunReport {
    /// The report for `name`.
    pub fn get(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.get(name)
    }

    /// The outcome of `name`.
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.get(name).map(|r| &r.outcome)
    }

    /// The state of `name`.
    pub fn state(&self, name: &str) -> Option<ResourceState> {
        self.get(name).map(|r| r.state)
    }

    /// Returns `true` if no resource failed, blocked, timed out, or was
    /// cancelled.
    pub fn is_success(&self) -> bool {
        !self.resources.values().any(|r| r.outcome.is_failure())
    }

    /// Resources whose outcome counts against the run.
    pub fn failures(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources.values().filter(|r| r.outcome.is_failure())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    fn report(entries: &[(&str, ResourceState, Outcome)]) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: RunId::v4(),
            started_at: now,
            finished_at: now,
            resources: entries
                .iter()
                .map(|(n, state, outcome)| {
                    (
                        name(n),
                        ResourceReport {
                            name: name(n),
                            state: *state,
                            outcome: outcome.clone(),
                            history: Vec::new(),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn failure_display() {
        let mismatch = Failure::OrderingMismatch {
            predecessor: name("config"),
            expected: 0,
            actual: 1,
        };
        assert_eq!(mismatch.to_string(), "config exited with 1, expected 0");

        let probe = Failure::ProbeFailure {
            kind: ProbeKind::Readiness,
            path: "/health".into(),
            failures: 3,
        };
        assert_eq!(
            probe.to_string(),
            "readiness probe /health failed 3 consecutive times"
        );
    }

    #[test]
    fn ready_outcome_follows_later_state() {
        assert_eq!(
            Outcome::Ready.with_state(ResourceState::Exited { code: 0 }),
            Outcome::Exited { code: 0 }
        );
        assert_eq!(
            Outcome::Ready.with_state(ResourceState::Degraded),
            Outcome::Degraded
        );
        assert_eq!(
            Outcome::TimedOut.with_state(ResourceState::Starting),
            Outcome::TimedOut
        );
    }

    #[test]
    fn blocked_display_lists_predecessors() {
        let blocked = Outcome::Blocked {
            waiting_on: vec![name("db"), name("cache")],
        };
        assert_eq!(blocked.to_string(), "blocked on db, cache");
    }

    #[test]
    fn success_ignores_exits_and_explicit_start() {
        let ok = report(&[
            ("api", ResourceState::Healthy, Outcome::Ready),
            ("job", ResourceState::Exited { code: 0 }, Outcome::Exited { code: 0 }),
            ("tool", ResourceState::Pending, Outcome::NotStarted),
        ]);
        assert!(ok.is_success());
        assert_eq!(ok.failures().count(), 0);
    }

    #[test]
    fn failures_are_listed_in_order() {
        let run = report(&[
            ("db", ResourceState::FailedToStart, Outcome::Failed(Failure::Unresolved("db".into()))),
            ("api", ResourceState::Pending, Outcome::Blocked { waiting_on: vec![name("db")] }),
            ("web", ResourceState::Healthy, Outcome::Ready),
        ]);
        assert!(!run.is_success());
        let failed: Vec<&str> = run.failures().map(|r| r.name.as_str()).collect();
        assert_eq!(failed, vec!["db", "api"]);
        assert_eq!(run.state("api"), Some(ResourceState::Pending));
    }

    #[test]
    fn report_serializes_outcomes_tagged() {
        let run = report(&[(
            "api",
            ResourceState::Pending,
            Outcome::Failed(Failure::OrderingMismatch {
                predecessor: name("config"),
                expected: 0,
                actual: 1,
            }),
        )]);
        let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();
        let outcome = &json["resources"]["api"]["outcome"];
        assert_eq!(outcome["outcome"], "failed");
    }
}
