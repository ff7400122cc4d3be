#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Conductor Engine
//!
//! The readiness orchestrator: turns a declared resource graph into running
//! resources, starting each one only once its wait gates are satisfied.
//!
//! - [`Orchestrator`] plans a graph and spawns one control task per resource
//! - [`Application`] is the running graph: settle, abort, shut down
//! - [`Launcher`] and [`ProbeExecutor`] are the seams to the outside world;
//!   [`HttpProbeExecutor`] is the stock HTTP implementation of the latter
//! - [`OrchestratorSettings`] carries probe defaults, the optional graph-wide
//!   deadline, fail-fast and launch concurrency, loadable from configuration
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use conductor_core::{NoSecrets, NoTrustStore};
//! use conductor_engine::{HttpProbeExecutor, Launcher, Orchestrator};
//! use conductor_model::GraphHandle;
//!
//! # async fn demo(launcher: Arc<dyn Launcher>) -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphHandle::new();
//! let db = graph.add_container("db", "postgres:16")?;
//! graph.add_executable("api", "cargo", ".")?.wait_for_start(&db)?;
//!
//! let orchestrator = Orchestrator::new(launcher, Arc::new(HttpProbeExecutor::new()?));
//! let report = orchestrator.run(&graph, &NoSecrets, &NoTrustStore).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod launcher;
pub mod orchestrator;
pub mod probe;
pub mod settings;
mod task;

pub use error::EngineError;
pub use launcher::{LaunchError, LaunchHandle, Launcher};
pub use orchestrator::{Application, Orchestrator};
pub use probe::{
    EffectiveProbe, HttpProbeExecutor, ProbeDefaults, ProbeExecutor, ProbeOutcome, ProbeTarget,
};
pub use settings::OrchestratorSettings;
