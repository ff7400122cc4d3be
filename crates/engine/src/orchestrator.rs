//! The readiness orchestrator.
//!
//! [`Orchestrator::launch`] plans the graph and spawns one control task per
//! resource; tasks with no ordering constraint between them run in parallel.
//! The returned [`Application`] is the running graph: await
//! [`Application::settled`] for the startup report, then
//! [`Application::shutdown`] to tear everything down.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use conductor_core::{ResourceKind, ResourceName, RunId, SecretStore, TrustStore};
use conductor_execution::{
    Failure, LaunchPlan, Outcome, ResourceReport, ResourceState, RunReport, StateTable, StateView,
};
use conductor_model::GraphHandle;
use dashmap::DashMap;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::launcher::{LaunchHandle, Launcher};
use crate::probe::ProbeExecutor;
use crate::settings::OrchestratorSettings;
use crate::task::ControlTask;

/// State shared by every control task and monitor of one run.
pub(crate) struct Shared {
    pub(crate) table: StateTable,
    pub(crate) launcher: Arc<dyn Launcher>,
    pub(crate) probes: Arc<dyn ProbeExecutor>,
    pub(crate) settings: OrchestratorSettings,
    pub(crate) launches: Arc<Semaphore>,
    /// Kind of every planned resource, for judging gates.
    pub(crate) kinds: HashMap<ResourceName, ResourceKind>,
    pub(crate) handles: DashMap<ResourceName, LaunchHandle>,
    /// Interrupts control tasks still waiting, starting, or probing.
    pub(crate) cancel: CancellationToken,
    /// Stops exit watchers and liveness probes on teardown.
    pub(crate) monitor_cancel: CancellationToken,
    pub(crate) monitors: TaskTracker,
    pub(crate) deadline: Option<Instant>,
}

/// Drives graphs from declaration to running.
///
/// Holds the external collaborators and the settings; every
/// [`launch`](Self::launch) starts an independent run.
pub struct Orchestrator {
    launcher: Arc<dyn Launcher>,
    probes: Arc<dyn ProbeExecutor>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// An orchestrator with default settings.
    pub fn new(launcher: Arc<dyn Launcher>, probes: Arc<dyn ProbeExecutor>) -> Self {
        Self {
            launcher,
            probes,
            settings: OrchestratorSettings::default(),
        }
    }

    /// Replace the settings.
    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The current settings.
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Plan `graph` and start a control task for every resource.
    ///
    /// Fails only if the graph cannot be planned at all; per-resource
    /// problems show up in the run report.
    pub async fn launch(
        &self,
        graph: &GraphHandle,
        secrets: &dyn SecretStore,
        trust: &dyn TrustStore,
    ) -> Result<Application, EngineError> {
        let plan = LaunchPlan::build(graph, secrets, trust)?;
        let run_id = RunId::v4();
        info!(
            %run_id,
            resources = plan.len(),
            levels = plan.levels.len(),
            "launching application"
        );

        let shared = Arc::new(Shared {
            table: StateTable::new(plan.resources.keys().cloned()),
            launcher: Arc::clone(&self.launcher),
            probes: Arc::clone(&self.probes),
            settings: self.settings.clone(),
            launches: Arc::new(Semaphore::new(self.settings.max_concurrent_launches.max(1))),
            kinds: plan
                .resources
                .values()
                .map(|planned| (planned.name.clone(), planned.kind))
                .collect(),
            handles: DashMap::new(),
            cancel: CancellationToken::new(),
            monitor_cancel: CancellationToken::new(),
            monitors: TaskTracker::new(),
            deadline: self.settings.deadline.map(|d| Instant::now() + d),
        });

        let mut tasks = JoinSet::new();
        let mut task_names = HashMap::with_capacity(plan.len());
        for name in plan.levels.iter().flatten() {
            let Some(planned) = plan.get(name.as_str()) else {
                continue;
            };
            let task = ControlTask::new(Arc::clone(&shared), planned.clone());
            let handle = tasks.spawn(task.run());
            task_names.insert(handle.id(), name.clone());
        }

        Ok(Application {
            run_id,
            started_at: Utc::now(),
            plan,
            shared,
            tasks,
            task_names,
            outcomes: HashMap::new(),
        })
    }

    /// Launch, wait for every resource to settle, then tear down.
    pub async fn run(
        &self,
        graph: &GraphHandle,
        secrets: &dyn SecretStore,
        trust: &dyn TrustStore,
    ) -> Result<RunReport, EngineError> {
        let mut application = self.launch(graph, secrets, trust).await?;
        application.settled().await;
        Ok(application.shutdown().await)
    }
}

/// A running graph.
pub struct Application {
    run_id: RunId,
    started_at: DateTime<Utc>,
    plan: LaunchPlan,
    shared: Arc<Shared>,
    tasks: JoinSet<(ResourceName, Outcome)>,
    task_names: HashMap<tokio::task::Id, ResourceName>,
    outcomes: HashMap<ResourceName, Outcome>,
}

impl Application {
    /// Identifier of this run.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The plan being executed.
    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    /// Current state of `name`.
    pub fn state(&self, name: &str) -> Option<ResourceState> {
        self.shared.table.state(name).ok()
    }

    /// Current state of every resource.
    pub fn states(&self) -> Vec<(ResourceName, ResourceState)> {
        self.shared.table.states().into_iter().collect()
    }

    /// Watch `name`'s state.
    pub fn subscribe(&self, name: &str) -> Option<watch::Receiver<StateView>> {
        self.shared.table.subscribe(name).ok()
    }

    /// Interrupt every control task still waiting, starting, or probing.
    /// Running resources keep running until [`shutdown`](Self::shutdown).
    pub fn abort(&self) {
        info!(run_id = %self.run_id, "abort requested");
        self.shared.cancel.cancel();
    }

    /// Wait until every control task has settled and report.
    ///
    /// A resource gated on a predecessor that never exits keeps this waiting;
    /// set a deadline or call [`abort`](Self::abort) to bound it.
    pub async fn settled(&mut self) -> RunReport {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((_, (name, outcome))) => {
                    self.outcomes.insert(name, outcome);
                }
                Err(e) => {
                    let Some(name) = self.task_names.get(&e.id()).cloned() else {
                        continue;
                    };
                    let outcome = if e.is_panic() {
                        error!(resource = %name, error = %e, "control task panicked");
                        let _ = self.shared.table.mark_settled(name.as_str());
                        if self.shared.settings.fail_fast {
                            self.shared.cancel.cancel();
                        }
                        Outcome::Failed(Failure::Panicked(e.to_string()))
                    } else {
                        Outcome::Cancelled
                    };
                    self.outcomes.insert(name, outcome);
                }
            }
        }
        self.report()
    }

    /// Tear the graph down: interrupt unsettled control tasks, let in-flight
    /// launches finish, stop monitors, then stop every running resource,
    /// dependents first.
    pub async fn shutdown(mut self) -> RunReport {
        self.shared.cancel.cancel();
        self.settled().await;

        self.shared.monitor_cancel.cancel();
        self.shared.monitors.close();
        self.shared.monitors.wait().await;

        let teardown: Vec<ResourceName> = self
            .plan
            .levels
            .iter()
            .rev()
            .flat_map(|level| level.iter().rev())
            .cloned()
            .collect();
        for name in teardown {
            let Ok(state) = self.shared.table.state(name.as_str()) else {
                continue;
            };
            if !(state.is_running() || state == ResourceState::Starting) {
                continue;
            }
            match self.shared.handles.remove(&name) {
                Some((_, handle)) => {
                    if let Err(e) = self.shared.launcher.stop(&handle).await {
                        warn!(resource = %name, error = %e, "stop failed");
                    }
                }
                None if self.shared.kinds.get(&name).is_some_and(ResourceKind::is_runnable) => {
                    warn!(resource = %name, %state, "no launch handle; leaving state as is");
                    continue;
                }
                None => {}
            }
            match self.shared.table.transition(name.as_str(), ResourceState::Stopped) {
                Ok(()) => debug!(resource = %name, "stopped"),
                Err(e) => debug!(resource = %name, error = %e, "not moved to stopped"),
            }
        }

        info!(run_id = %self.run_id, "application torn down");
        self.report()
    }

    fn report(&self) -> RunReport {
        let table = &self.shared.table;
        let resources = self
            .plan
            .resources
            .keys()
            .map(|name| {
                let state = table.state(name.as_str()).unwrap_or_default();
                let outcome = self
                    .outcomes
                    .get(name)
                    .cloned()
                    .unwrap_or(Outcome::Cancelled)
                    .with_state(state);
                let report = ResourceReport {
                    name: name.clone(),
                    state,
                    outcome,
                    history: table.history(name.as_str()).unwrap_or_default(),
                };
                (name.clone(), report)
            })
            .collect();
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            resources,
        }
    }
}
