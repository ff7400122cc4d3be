//! The launcher seam.
//!
//! Spawning and supervising processes and containers is someone else's job.
//! The orchestrator only tells a [`Launcher`] when to start a resource, asks it
//! to report the exit code, and asks it to stop the resource on teardown.

use async_trait::async_trait;
use conductor_core::ResourceName;
use conductor_execution::LaunchSpec;

/// Opaque reference to something a launcher started.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaunchHandle {
    /// The resource it belongs to.
    pub resource: ResourceName,
    /// Launcher-specific identifier (pid, container id, ...).
    pub id: String,
}

impl LaunchHandle {
    /// A handle for `resource` with launcher identifier `id`.
    pub fn new(resource: ResourceName, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
        }
    }
}

/// A launcher could not do what it was asked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LaunchError {
    /// Human-readable reason.
    pub message: String,
}

impl LaunchError {
    /// An error with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Starts, watches and stops runnable resources.
///
/// Implementations must be cheap to share; the orchestrator holds one behind
/// an `Arc` and calls it from every control task.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the resource. Returns once it is running.
    async fn start(&self, spec: &LaunchSpec) -> Result<LaunchHandle, LaunchError>;

    /// Resolve when the resource exits, with its exit code.
    ///
    /// A launcher that cannot observe exits may return an error; the resource
    /// is then assumed to run until teardown.
    async fn wait_for_exit(&self, handle: &LaunchHandle) -> Result<i32, LaunchError>;

    /// Stop the resource gracefully.
    async fn stop(&self, handle: &LaunchHandle) -> Result<(), LaunchError>;
}
