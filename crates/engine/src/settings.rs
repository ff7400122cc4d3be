//! Orchestrator settings.

use std::time::Duration;

use conductor_config::Config;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::probe::ProbeDefaults;

/// Configuration section the settings are read from.
pub const SECTION: &str = "Orchestrator";

/// Knobs of one orchestrator.
///
/// Read from the `Orchestrator` configuration section; durations are
/// milliseconds:
///
/// ```toml
/// [Orchestrator]
/// deadline = 120000
/// fail_fast = true
/// max_concurrent_launches = 4
///
/// [Orchestrator.probe]
/// period = 2000
/// failure_threshold = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Defaults for probe fields a resource leaves unset.
    pub probe: ProbeDefaults,
    /// Graph-wide deadline; resources still waiting or starting when it
    /// passes time out.
    #[serde(with = "serde_duration_opt")]
    pub deadline: Option<Duration>,
    /// Cancel every other resource on the first fatal failure.
    pub fail_fast: bool,
    /// Upper bound on concurrent launcher calls.
    pub max_concurrent_launches: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            probe: ProbeDefaults::default(),
            deadline: None,
            fail_fast: false,
            max_concurrent_launches: 8,
        }
    }
}

impl OrchestratorSettings {
    /// Read the `Orchestrator` section, falling back to defaults when absent.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let mut settings: Self = config.section(SECTION)?;
        settings.max_concurrent_launches = settings.max_concurrent_launches.max(1);
        Ok(settings)
    }

    /// Set the graph-wide deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Enable or disable fail-fast.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Replace the probe defaults.
    pub fn with_probe_defaults(mut self, probe: ProbeDefaults) -> Self {
        self.probe = probe;
        self
    }

    /// Bound concurrent launcher calls; zero is treated as one.
    pub fn with_max_concurrent_launches(mut self, max: usize) -> Self {
        self.max_concurrent_launches = max.max(1);
        self
    }
}

/// Serde helper for `Duration` serialized as milliseconds.
pub(crate) mod serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Serde helper for `Option<Duration>` serialized as milliseconds.
pub(crate) mod serde_duration_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(d)?;
        Ok(opt.map(Duration::from_millis))
    }
}
