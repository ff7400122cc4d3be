//! Health and readiness probes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// When a probe runs and what its failure means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Runs once after launch, before readiness probing starts.
    Startup,
    /// Gates the `Healthy` state.
    Readiness,
    /// Runs continuously after `Healthy`.
    Liveness,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Readiness => write!(f, "readiness"),
            Self::Liveness => write!(f, "liveness"),
        }
    }
}

/// An HTTP probe against one of the resource's endpoints.
///
/// Timing fields left `None` take the orchestrator's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Probe kind.
    pub kind: ProbeKind,
    /// Request path, e.g. `/health`.
    pub path: String,
    /// Endpoint name; `None` means the resource's sole endpoint.
    pub endpoint: Option<String>,
    /// Expected status code; `None` accepts any 2xx.
    pub expected_status: Option<u16>,
    /// Delay before the first attempt.
    #[serde(default, with = "crate::serde_duration_opt")]
    pub initial_delay: Option<Duration>,
    /// Delay between attempts.
    #[serde(default, with = "crate::serde_duration_opt")]
    pub period: Option<Duration>,
    /// Per-attempt timeout; a timeout counts as a failure.
    #[serde(default, with = "crate::serde_duration_opt")]
    pub timeout: Option<Duration>,
    /// Consecutive failures that fail the probe.
    pub failure_threshold: Option<u32>,
    /// Consecutive successes that pass the probe.
    pub success_threshold: Option<u32>,
}

impl ProbeSpec {
    /// A probe of `kind` against `path` with default timing.
    pub fn new(kind: ProbeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            endpoint: None,
            expected_status: None,
            initial_delay: None,
            period: None,
            timeout: None,
            failure_threshold: None,
            success_threshold: None,
        }
    }

    /// A readiness probe.
    pub fn readiness(path: impl Into<String>) -> Self {
        Self::new(ProbeKind::Readiness, path)
    }

    /// A liveness probe.
    pub fn liveness(path: impl Into<String>) -> Self {
        Self::new(ProbeKind::Liveness, path)
    }

    /// A startup probe.
    pub fn startup(path: impl Into<String>) -> Self {
        Self::new(ProbeKind::Startup, path)
    }

    /// Target a named endpoint.
    #[must_use]
    pub fn endpoint(mut self, name: impl Into<String>) -> Self {
        self.endpoint = Some(name.into());
        self
    }

    /// Require an exact status code.
    #[must_use]
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the period.
    #[must_use]
    pub fn period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the failure threshold.
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set the success threshold.
    #[must_use]
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = Some(threshold);
        self
    }

    /// Returns `true` if `status` counts as a pass.
    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        match self.expected_status {
            Some(expected) => status == expected,
            None => (200..300).contains(&status),
        }
    }
}

/// The probes of one resource, keyed by (kind, path).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeTable {
    entries: Vec<ProbeSpec>,
}

impl ProbeTable {
    /// Insert `spec`, replacing an existing probe with the same kind and path.
    pub fn upsert(&mut self, spec: ProbeSpec) {
        match self
            .entries
            .iter_mut()
            .find(|p| p.kind == spec.kind && p.path == spec.path)
        {
            Some(existing) => *existing = spec,
            None => self.entries.push(spec),
        }
    }

    /// Probes of one kind, in declaration order.
    pub fn of_kind(&self, kind: ProbeKind) -> impl Iterator<Item = &ProbeSpec> {
        self.entries.iter().filter(move |p| p.kind == kind)
    }

    /// All probes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProbeSpec> {
        self.entries.iter()
    }

    /// Number of probes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no probe is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn same_kind_and_path_replaces() {
        let mut table = ProbeTable::default();
        table.upsert(ProbeSpec::readiness("/health").failure_threshold(3));
        table.upsert(ProbeSpec::readiness("/health").failure_threshold(5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().failure_threshold, Some(5));
    }

    #[test]
    fn different_kind_same_path_accumulates() {
        let mut table = ProbeTable::default();
        table.upsert(ProbeSpec::readiness("/health"));
        table.upsert(ProbeSpec::liveness("/health"));
        table.upsert(ProbeSpec::readiness("/ready"));
        assert_eq!(table.len(), 3);
        assert_eq!(table.of_kind(ProbeKind::Readiness).count(), 2);
        assert_eq!(table.of_kind(ProbeKind::Liveness).count(), 1);
    }

    #[rstest]
    #[case(None, 200, true)]
    #[case(None, 204, true)]
    #[case(None, 301, false)]
    #[case(None, 503, false)]
    #[case(Some(418), 418, true)]
    #[case(Some(418), 200, false)]
    fn status_acceptance(#[case] expected: Option<u16>, #[case] status: u16, #[case] ok: bool) {
        let mut probe = ProbeSpec::readiness("/");
        probe.expected_status = expected;
        assert_eq!(probe.accepts(status), ok);
    }

    #[test]
    fn timing_serializes_as_millis() {
        let probe = ProbeSpec::liveness("/alive").period(Duration::from_secs(2));
        let json = serde_json::to_value(&probe).unwrap();
        assert_eq!(json["period"], serde_json::json!(2000));
        assert_eq!(json["timeout"], serde_json::Value::Null);
        let back: ProbeSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, probe);
    }
}
