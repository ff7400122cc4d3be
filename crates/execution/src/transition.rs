//! Legal moves of the readiness state machine.

use crate::error::ExecutionError;
use crate::state::ResourceState;

/// Returns `true` if a resource may move from `from` to `to`.
#[must_use]
pub fn can_transition(from: ResourceState, to: ResourceState) -> bool {
    use ResourceState as S;
    matches!(
        (from, to),
        (S::Pending, S::Starting)
            | (S::Pending, S::FailedToStart)
            | (S::Starting, S::Started)
            | (S::Starting, S::FailedToStart)
            | (S::Started, S::Healthy)
            | (S::Started, S::Unhealthy)
            | (S::Started, S::Exited { .. })
            | (S::Healthy, S::Degraded)
            | (S::Healthy, S::Exited { .. })
            | (S::Unhealthy, S::Exited { .. })
            | (S::Degraded, S::Exited { .. })
    ) || (to == S::Stopped && from != S::Stopped)
}

/// Validate a transition for `resource`, returning an error if it is illegal.
pub fn validate_transition(
    resource: &str,
    from: ResourceState,
    to: ResourceState,
) -> Result<(), ExecutionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidTransition {
            resource: resource.to_owned(),
            from,
            to,
        })
    }
}
