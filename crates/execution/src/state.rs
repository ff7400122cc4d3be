//! Per-resource readiness state.

use conductor_model::WaitCondition;
use serde::{Deserialize, Serialize};

/// Where one resource is in its startup lifecycle.
///
/// `Pending -> Starting -> Started -> {Healthy | Unhealthy | Exited}`, with
/// `Degraded` reachable from `Healthy` when liveness probes give up, and
/// `Stopped` reachable from anywhere on teardown. `FailedToStart` ends a
/// resource that never got running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ResourceState {
    /// Waiting for predecessors.
    #[default]
    Pending,
    /// The launcher has been asked to start it.
    Starting,
    /// The launcher reports it running.
    Started,
    /// Every readiness probe passed.
    Healthy,
    /// A readiness probe exceeded its failure threshold.
    Unhealthy,
    /// A liveness probe exceeded its failure threshold after it became healthy.
    Degraded,
    /// The process or container exited.
    Exited {
        /// Exit code reported by the launcher.
        code: i32,
    },
    /// Resolution or launch failed before it was running.
    FailedToStart,
    /// Torn down with the rest of the graph.
    Stopped,
}

impl ResourceState {
    /// Returns `true` if the resource is running, healthy or not.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Started | Self::Healthy | Self::Unhealthy | Self::Degraded
        )
    }

    /// Returns `true` if no further transition except `Stopped` is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Exited { .. } | Self::FailedToStart | Self::Stopped
        )
    }

    /// Returns `true` if reaching this state meets `condition`.
    #[must_use]
    pub fn satisfies(&self, condition: WaitCondition) -> bool {
        match condition {
            WaitCondition::Started => matches!(
                self,
                Self::Started
                    | Self::Healthy
                    | Self::Unhealthy
                    | Self::Degraded
                    | Self::Exited { .. }
            ),
            WaitCondition::Healthy => matches!(self, Self::Healthy),
            WaitCondition::Completed { exit_code } => {
                matches!(self, Self::Exited { code } if *code == exit_code)
            }
        }
    }

    /// Returns `true` if a resource in this state can never meet `condition`
    /// unless it already did on the way here.
    #[must_use]
    pub fn forecloses(&self, condition: WaitCondition) -> bool {
        match condition {
            WaitCondition::Started => matches!(self, Self::FailedToStart | Self::Stopped),
            WaitCondition::Healthy => matches!(
                self,
                Self::Unhealthy
                    | Self::Degraded
                    | Self::Exited { .. }
                    | Self::FailedToStart
                    | Self::Stopped
            ),
            WaitCondition::Completed { exit_code } => match self {
                Self::Exited { code } => *code != exit_code,
                Self::FailedToStart | Self::Stopped => true,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Starting => write!(f, "starting"),
            Self::Started => write!(f, "started"),
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Exited { code } => write!(f, "exited({code})"),
            Self::FailedToStart => write!(f, "failed_to_start"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
