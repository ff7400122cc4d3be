//! Probe execution.

use std::time::Duration;

use async_trait::async_trait;
use conductor_core::ResourceName;
use conductor_model::{EndpointSpec, EndpointTable, ProbeSpec};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Where one probe attempt goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// The probed resource.
    pub resource: ResourceName,
    /// The endpoint the probe addresses.
    pub endpoint: EndpointSpec,
    /// Full URL including the probe path.
    pub url: String,
}

impl ProbeTarget {
    /// Pick the endpoint `probe` addresses out of `endpoints` and build its
    /// URL. The probe names an endpoint, or the resource has exactly one.
    pub fn resolve(
        resource: &ResourceName,
        endpoints: &EndpointTable,
        probe: &ProbeSpec,
    ) -> Result<Self, String> {
        let endpoint = match &probe.endpoint {
            Some(name) => endpoints
                .get(name)
                .ok_or_else(|| format!("no endpoint named {name}"))?,
            None => endpoints
                .sole()
                .ok_or_else(|| "probe names no endpoint and the resource has no single endpoint".to_owned())?,
        };
        let base = endpoint
            .url()
            .ok_or_else(|| format!("endpoint {} has no port", endpoint.effective_name()))?;
        let path = if probe.path.starts_with('/') {
            probe.path.clone()
        } else {
            format!("/{}", probe.path)
        };
        Ok(Self {
            resource: resource.clone(),
            endpoint: endpoint.clone(),
            url: format!("{base}{path}"),
        })
    }
}

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The probe passed.
    Pass,
    /// The probe failed, with a reason.
    Fail(String),
}

/// Runs single probe attempts. Timing, thresholds and retries are the
/// orchestrator's concern.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Run one attempt of `spec` against `target`.
    async fn probe(&self, target: &ProbeTarget, spec: &ProbeSpec) -> ProbeOutcome;
}

/// Engine-wide probe timing, used where a probe leaves a field unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeDefaults {
    /// Delay before the first attempt.
    #[serde(with = "crate::settings::serde_duration")]
    pub initial_delay: Duration,
    /// Delay between attempts.
    #[serde(with = "crate::settings::serde_duration")]
    pub period: Duration,
    /// Per-attempt timeout.
    #[serde(with = "crate::settings::serde_duration")]
    pub timeout: Duration,
    /// Consecutive failures that fail a probe.
    pub failure_threshold: u32,
    /// Consecutive passes that pass a probe.
    pub success_threshold: u32,
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            period: Duration::from_secs(10),
            timeout: Duration::from_secs(1),
            failure_threshold: 3,
            success_threshold: 1,
        }
    }
}

impl ProbeDefaults {
    /// Fill the unset timing of `spec`. Thresholds are at least one.
    pub fn apply(&self, spec: &ProbeSpec) -> EffectiveProbe {
        EffectiveProbe {
            spec: spec.clone(),
            initial_delay: spec.initial_delay.unwrap_or(self.initial_delay),
            period: spec.period.unwrap_or(self.period),
            timeout: spec.timeout.unwrap_or(self.timeout),
            failure_threshold: spec.failure_threshold.unwrap_or(self.failure_threshold).max(1),
            success_threshold: spec.success_threshold.unwrap_or(self.success_threshold).max(1),
        }
    }
}

/// A probe with every timing field decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveProbe {
    /// The declared probe.
    pub spec: ProbeSpec,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Delay between attempts.
    pub period: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Consecutive failures that fail the probe.
    pub failure_threshold: u32,
    /// Consecutive passes that pass the probe.
    pub success_threshold: u32,
}

/// HTTP GET probes over [`reqwest`].
#[derive(Debug, Clone)]
pub struct HttpProbeExecutor {
    client: reqwest::Client,
}

impl HttpProbeExecutor {
    /// An executor with a fresh client.
    pub fn new() -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| EngineError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    /// An executor sharing an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbeExecutor {
    async fn probe(&self, target: &ProbeTarget, spec: &ProbeSpec) -> ProbeOutcome {
        if !target.endpoint.scheme.is_http() {
            return ProbeOutcome::Fail(format!(
                "{} endpoints cannot be probed over http",
                target.endpoint.scheme
            ));
        }
        match self.client.get(&target.url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if spec.accepts(status) {
                    ProbeOutcome::Pass
                } else {
                    ProbeOutcome::Fail(format!("{} returned {status}", target.url))
                }
            }
            Err(e) => ProbeOutcome::Fail(e.to_string()),
        }
    }
}
