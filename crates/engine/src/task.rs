//! Per-resource control tasks.
//!
//! One task per resource. It waits on the resource's gates, hands the launch
//! spec to the launcher, runs startup and readiness probes, and settles with
//! an [`Outcome`]. Exit watching and liveness probing outlive the task as
//! monitors until teardown.

use std::future::Future;
use std::sync::Arc;

use conductor_core::{ResourceKind, ResourceName};
use conductor_execution::{
    ExecutionError, Failure, Gate, LaunchSpec, Outcome, PlannedResource, ResourceState,
};
use conductor_model::{EndpointTable, ProbeKind, WaitBehavior, WaitCondition, WaitRequirement};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::launcher::LaunchHandle;
use crate::orchestrator::Shared;
use crate::probe::{EffectiveProbe, ProbeExecutor, ProbeOutcome, ProbeTarget};

pub(crate) struct ControlTask {
    shared: Arc<Shared>,
    planned: PlannedResource,
}

impl ControlTask {
    pub(crate) fn new(shared: Arc<Shared>, planned: PlannedResource) -> Self {
        Self { shared, planned }
    }

    pub(crate) async fn run(self) -> (ResourceName, Outcome) {
        let name = self.planned.name.clone();
        let span = info_span!("control", resource = %name);
        let outcome = self.drive().instrument(span).await;
        (name, outcome)
    }

    fn name(&self) -> &str {
        self.planned.name.as_str()
    }

    async fn drive(&self) -> Outcome {
        let outcome = self.settle().await;
        // Dependents of a timed-out or cancelled resource time out or cancel
        // on their own; only a final decision stalls them.
        if !matches!(outcome, Outcome::TimedOut | Outcome::Cancelled) {
            let _ = self.shared.table.mark_settled(self.name());
        }
        if self.shared.settings.fail_fast && matches!(outcome, Outcome::Failed(_)) {
            warn!(%outcome, "fail-fast: cancelling the run");
            self.shared.cancel.cancel();
        }
        info!(%outcome, "settled");
        outcome
    }

    async fn settle(&self) -> Outcome {
        if self.planned.explicit_start {
            info!("explicit start requested; not launching");
            return Outcome::NotStarted;
        }

        let prepared = tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => return Outcome::Cancelled,
            prepared = self.within_deadline(self.prepare()) => prepared,
        };
        let (spec, permit) = match prepared {
            Ok(prepared) => prepared,
            Err(outcome) => return outcome,
        };
        let handle = match self.launch(spec, permit).await {
            Ok(handle) => handle,
            Err(outcome) => return outcome,
        };
        if let Some(handle) = handle {
            self.watch_exit(handle);
        }

        tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => Outcome::Cancelled,
            outcome = self.become_ready(spec) => outcome,
        }
    }

    async fn within_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, Outcome>>,
    ) -> Result<T, Outcome> {
        match self.shared.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .unwrap_or_else(|_| {
                    warn!("deadline passed before the resource started");
                    Err(Outcome::TimedOut)
                }),
            None => fut.await,
        }
    }

    fn cas(&self, from: ResourceState, to: ResourceState) -> Result<(), Outcome> {
        self.shared
            .table
            .compare_and_set(self.name(), from, to)
            .map_err(state_failure)
    }

    /// Everything that may still be interrupted: the gates, the launch
    /// inputs, and a launch slot for runnable kinds.
    async fn prepare(&self) -> Result<(&LaunchSpec, Option<OwnedSemaphorePermit>), Outcome> {
        self.await_gates().await?;

        let spec = match &self.planned.launch {
            Ok(spec) => spec,
            Err(e) => {
                warn!(error = %e, "launch inputs did not resolve");
                self.cas(ResourceState::Pending, ResourceState::FailedToStart)?;
                return Err(Outcome::Failed(Failure::Unresolved(e.to_string())));
            }
        };
        if !spec.kind.is_runnable() {
            return Ok((spec, None));
        }
        match Arc::clone(&self.shared.launches).acquire_owned().await {
            Ok(permit) => Ok((spec, Some(permit))),
            Err(_) => Err(Outcome::Cancelled),
        }
    }

    /// Leave `Pending`. A runnable resource is handed to the launcher on the
    /// monitor tracker, so the call completes and its handle is recorded even
    /// when this task stops waiting for it.
    async fn launch(
        &self,
        spec: &LaunchSpec,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<Option<LaunchHandle>, Outcome> {
        self.cas(ResourceState::Pending, ResourceState::Starting)?;
        let Some(permit) = permit else {
            self.cas(ResourceState::Starting, ResourceState::Started)?;
            return Ok(None);
        };

        let launching = self.shared.monitors.spawn(
            start_resource(Arc::clone(&self.shared), spec.clone(), permit)
                .instrument(Span::current()),
        );
        let launched = async move {
            match launching.await {
                Ok(Ok(handle)) => Ok(Some(handle)),
                Ok(Err(failure)) => Err(Outcome::Failed(failure)),
                Err(e) => Err(Outcome::Failed(Failure::Panicked(e.to_string()))),
            }
        };
        tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => Err(Outcome::Cancelled),
            launched = self.within_deadline(launched) => launched,
        }
    }

    async fn await_gates(&self) -> Result<(), Outcome> {
        if self.planned.waits.is_empty() {
            return Ok(());
        }
        let mut receivers = self
            .planned
            .waits
            .iter()
            .map(|wait| self.shared.table.subscribe(wait.on.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(state_failure)?;

        loop {
            for rx in &mut receivers {
                rx.mark_unchanged();
            }
            if self.gates_open()? {
                debug!("every gate satisfied");
                return Ok(());
            }
            let changes = receivers.iter_mut().map(|rx| Box::pin(rx.changed()));
            let _ = futures::future::select_all(changes).await;
        }
    }

    /// `Ok(true)` once every gate is satisfied, `Ok(false)` while any is
    /// undecided, `Err` as soon as the resource can never start.
    fn gates_open(&self) -> Result<bool, Outcome> {
        let mut undecided = false;
        let mut blocked = Vec::new();
        for wait in &self.planned.waits {
            if matches!(wait.condition, WaitCondition::Completed { .. }) && !self.can_exit(&wait.on) {
                warn!(predecessor = %wait.on, "completion gate on a resource that never exits");
                self.unavailable(wait, &mut blocked)?;
                continue;
            }
            match self
                .shared
                .table
                .gate(wait.on.as_str(), wait.condition)
                .map_err(state_failure)?
            {
                Gate::Satisfied => {}
                Gate::Open => undecided = true,
                Gate::Foreclosed(state) => {
                    if let (WaitCondition::Completed { exit_code }, ResourceState::Exited { code }) =
                        (wait.condition, state)
                    {
                        warn!(
                            predecessor = %wait.on,
                            expected = exit_code,
                            actual = code,
                            "completion gate saw the wrong exit code"
                        );
                        return Err(Outcome::Failed(Failure::OrderingMismatch {
                            predecessor: wait.on.clone(),
                            expected: exit_code,
                            actual: code,
                        }));
                    }
                    self.unavailable(wait, &mut blocked)?;
                }
                Gate::Stalled => self.unavailable(wait, &mut blocked)?,
            }
        }
        if !blocked.is_empty() {
            info!(waiting_on = ?blocked, "blocked on predecessors that can never be ready");
            return Err(Outcome::Blocked {
                waiting_on: blocked,
            });
        }
        Ok(!undecided)
    }

    fn can_exit(&self, name: &ResourceName) -> bool {
        self.shared
            .kinds
            .get(name)
            .is_some_and(ResourceKind::is_runnable)
    }

    fn unavailable(
        &self,
        wait: &WaitRequirement,
        blocked: &mut Vec<ResourceName>,
    ) -> Result<(), Outcome> {
        match wait.behavior {
            WaitBehavior::WaitOnResourceUnavailable => {
                blocked.push(wait.on.clone());
                Ok(())
            }
            WaitBehavior::StopOnResourceUnavailable => {
                self.cas(ResourceState::Pending, ResourceState::FailedToStart)?;
                Err(Outcome::Failed(Failure::DependencyUnavailable {
                    predecessor: wait.on.clone(),
                    condition: wait.condition,
                }))
            }
        }
    }

    async fn become_ready(&self, spec: &LaunchSpec) -> Outcome {
        let defaults = &self.shared.settings.probe;

        for probe in spec.probes.of_kind(ProbeKind::Startup) {
            if let Err(failure) = evaluate(&self.shared, spec, &defaults.apply(probe)).await {
                return self.unhealthy(failure);
            }
        }

        let readiness: Vec<EffectiveProbe> = spec
            .probes
            .of_kind(ProbeKind::Readiness)
            .map(|probe| defaults.apply(probe))
            .collect();
        let results = futures::future::join_all(
            readiness
                .iter()
                .map(|probe| evaluate(&self.shared, spec, probe)),
        )
        .await;
        if let Some(failure) = results.into_iter().find_map(Result::err) {
            return self.unhealthy(failure);
        }

        match self.cas(ResourceState::Started, ResourceState::Healthy) {
            Ok(()) => {
                info!("healthy");
                self.watch_liveness(spec);
                Outcome::Ready
            }
            Err(_) => self.current_outcome(),
        }
    }

    fn unhealthy(&self, failure: Failure) -> Outcome {
        match self.cas(ResourceState::Started, ResourceState::Unhealthy) {
            Ok(()) => {
                warn!(%failure, "not ready");
                Outcome::Failed(failure)
            }
            Err(_) => self.current_outcome(),
        }
    }

    /// Outcome of a resource that left `Started` behind the task's back.
    fn current_outcome(&self) -> Outcome {
        match self.shared.table.state(self.name()) {
            Ok(ResourceState::Exited { code }) => Outcome::Exited { code },
            Ok(state) => Outcome::Failed(Failure::State(format!("unexpected state {state}"))),
            Err(e) => state_failure(e),
        }
    }

    fn watch_exit(&self, handle: LaunchHandle) {
        let shared = Arc::clone(&self.shared);
        let monitor = async move {
            tokio::select! {
                () = shared.monitor_cancel.cancelled() => {}
                exit = shared.launcher.wait_for_exit(&handle) => match exit {
                    Ok(code) => record_exit(&shared, handle.resource.as_str(), code),
                    Err(e) => debug!(error = %e, "exit not observable"),
                },
            }
        };
        self.shared.monitors.spawn(monitor.instrument(Span::current()));
    }

    fn watch_liveness(&self, spec: &LaunchSpec) {
        let defaults = self.shared.settings.probe;
        for probe in spec.probes.of_kind(ProbeKind::Liveness) {
            let shared = Arc::clone(&self.shared);
            let name = spec.name.clone();
            let endpoints = spec.endpoints.clone();
            let probe = defaults.apply(probe);
            let monitor = async move {
                tokio::select! {
                    () = shared.monitor_cancel.cancelled() => {}
                    () = liveness(&shared, &name, &endpoints, &probe) => {}
                }
            };
            self.shared.monitors.spawn(monitor.instrument(Span::current()));
        }
    }
}

fn state_failure(e: ExecutionError) -> Outcome {
    Outcome::Failed(Failure::State(e.to_string()))
}

fn record_exit(shared: &Shared, name: &str, code: i32) {
    let next = ResourceState::Exited { code };
    loop {
        let Ok(current) = shared.table.state(name) else {
            return;
        };
        match shared.table.compare_and_set(name, current, next) {
            Ok(()) => {
                info!(code, "exited");
                return;
            }
            Err(ExecutionError::StateConflict { .. }) => {}
            Err(e) => {
                debug!(error = %e, "exit not recorded");
                return;
            }
        }
    }
}

async fn start_resource(
    shared: Arc<Shared>,
    spec: LaunchSpec,
    _permit: OwnedSemaphorePermit,
) -> Result<LaunchHandle, Failure> {
    let name = spec.name.as_str();
    match shared.launcher.start(&spec).await {
        Ok(handle) => {
            shared.handles.insert(spec.name.clone(), handle.clone());
            shared
                .table
                .compare_and_set(name, ResourceState::Starting, ResourceState::Started)
                .map_err(|e| Failure::State(e.to_string()))?;
            info!(id = %handle.id, "started");
            Ok(handle)
        }
        Err(e) => {
            warn!(error = %e, "launch failed");
            shared
                .table
                .compare_and_set(name, ResourceState::Starting, ResourceState::FailedToStart)
                .map_err(|e| Failure::State(e.to_string()))?;
            Err(Failure::LaunchFailed(e.message))
        }
    }
}

async fn attempt(
    executor: &dyn ProbeExecutor,
    target: &Result<ProbeTarget, String>,
    probe: &EffectiveProbe,
) -> ProbeOutcome {
    let target = match target {
        Ok(target) => target,
        Err(reason) => return ProbeOutcome::Fail(reason.clone()),
    };
    match tokio::time::timeout(probe.timeout, executor.probe(target, &probe.spec)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::Fail(format!("timed out after {:?}", probe.timeout)),
    }
}

/// Run a startup or readiness probe until it passes `success_threshold`
/// times in a row or fails `failure_threshold` times in a row. Stops early
/// if the resource leaves `Started`.
async fn evaluate(shared: &Shared, spec: &LaunchSpec, probe: &EffectiveProbe) -> Result<(), Failure> {
    let target = ProbeTarget::resolve(&spec.name, &spec.endpoints, &probe.spec);
    tokio::time::sleep(probe.initial_delay).await;

    let (mut passes, mut failures) = (0_u32, 0_u32);
    loop {
        if shared.table.state(spec.name.as_str()).ok() != Some(ResourceState::Started) {
            return Ok(());
        }
        match attempt(shared.probes.as_ref(), &target, probe).await {
            ProbeOutcome::Pass => {
                failures = 0;
                passes += 1;
                if passes >= probe.success_threshold {
                    debug!(kind = %probe.spec.kind, path = %probe.spec.path, "probe passed");
                    return Ok(());
                }
            }
            ProbeOutcome::Fail(reason) => {
                passes = 0;
                failures += 1;
                debug!(kind = %probe.spec.kind, path = %probe.spec.path, failures, %reason, "probe failed");
                if failures >= probe.failure_threshold {
                    return Err(Failure::ProbeFailure {
                        kind: probe.spec.kind,
                        path: probe.spec.path.clone(),
                        failures,
                    });
                }
            }
        }
        tokio::time::sleep(probe.period).await;
    }
}

/// Probe a healthy resource until it stops being healthy or fails
/// `failure_threshold` times in a row, which degrades it.
async fn liveness(
    shared: &Shared,
    name: &ResourceName,
    endpoints: &EndpointTable,
    probe: &EffectiveProbe,
) {
    let target = ProbeTarget::resolve(name, endpoints, &probe.spec);
    tokio::time::sleep(probe.initial_delay).await;

    let mut failures = 0_u32;
    loop {
        if shared.table.state(name.as_str()).ok() != Some(ResourceState::Healthy) {
            return;
        }
        match attempt(shared.probes.as_ref(), &target, probe).await {
            ProbeOutcome::Pass => failures = 0,
            ProbeOutcome::Fail(reason) => {
                failures += 1;
                debug!(path = %probe.spec.path, failures, %reason, "liveness probe failed");
                if failures >= probe.failure_threshold {
                    if shared
                        .table
                        .compare_and_set(name.as_str(), ResourceState::Healthy, ResourceState::Degraded)
                        .is_ok()
                    {
                        warn!(path = %probe.spec.path, failures, "liveness lost; degraded");
                    }
                    return;
                }
            }
        }
        tokio::time::sleep(probe.period).await;
    }
}
