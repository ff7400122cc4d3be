//! Engine error types.

use conductor_config::ConfigError;
use conductor_execution::ExecutionError;

/// Errors that stop a run before or outside any one resource.
///
/// Failures of individual resources are not errors; they end up in the
/// [`RunReport`](conductor_execution::RunReport).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The graph could not be planned, usually an ordering cycle.
    #[error("planning failed: {0}")]
    Planning(#[from] ExecutionError),

    /// Orchestrator settings could not be read.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client for probes could not be built.
    #[error("http client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::ResourceName;
    use conductor_model::ModelError;

    #[test]
    fn planning_error_display() {
        let err: EngineError = ExecutionError::Plan(ModelError::CyclicDependency {
            members: vec![
                ResourceName::new("a").unwrap(),
                ResourceName::new("b").unwrap(),
            ],
        })
        .into();
        assert_eq!(
            err.to_string(),
            "planning failed: plan: cyclic dependency among: a -> b"
        );
    }

    #[test]
    fn http_client_display() {
        let err = EngineError::HttpClient("no tls backend".into());
        assert_eq!(err.to_string(), "http client: no tls backend");
    }
}
