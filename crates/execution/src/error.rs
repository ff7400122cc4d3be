//! Execution error types.

use conductor_model::ModelError;
use thiserror::Error;

use crate::state::ResourceState;

/// Errors raised while planning or recording a run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The state machine does not allow this move.
    #[error("invalid transition of {resource} from {from} to {to}")]
    InvalidTransition {
        /// The resource.
        resource: String,
        /// Current state.
        from: ResourceState,
        /// Attempted state.
        to: ResourceState,
    },

    /// The state table has no entry for this resource.
    #[error("resource not tracked: {0}")]
    UnknownResource(String),

    /// A compare-and-set lost to another writer.
    #[error("state conflict on {resource}: expected {expected}, found {actual}")]
    StateConflict {
        /// The resource.
        resource: String,
        /// The state the writer expected.
        expected: ResourceState,
        /// The state actually recorded.
        actual: ResourceState,
    },

    /// The graph could not be turned into a plan.
    #[error("plan: {0}")]
    Plan(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::ResourceName;

    #[test]
    fn state_conflict_display() {
        let err = ExecutionError::StateConflict {
            resource: "api".into(),
            expected: ResourceState::Pending,
            actual: ResourceState::Starting,
        };
        assert_eq!(
            err.to_string(),
            "state conflict on api: expected pending, found starting"
        );
    }

    #[test]
    fn unknown_resource_display() {
        let err = ExecutionError::UnknownResource("ghost".into());
        assert_eq!(err.to_string(), "resource not tracked: ghost");
    }

    #[test]
    fn plan_error_from_model() {
        let err: ExecutionError = ModelError::CyclicDependency {
            members: vec![
                ResourceName::new("a").unwrap(),
                ResourceName::new("b").unwrap(),
            ],
        }
        .into();
        assert!(err.to_string().starts_with("plan: cyclic dependency"));
    }
}
