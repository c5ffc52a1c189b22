//! Monitor, classifier, roster and connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Adaptive monitor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    /// Period between ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Capacity of the monitor → dispatch decision channel.
    pub decision_buffer: usize,
    /// Delivery policy.
    pub policy: PolicySettings,
}

impl MonitorSettings {
    /// Tick period as a [`Duration`].
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10_000,
            decision_buffer: 256,
            policy: PolicySettings::default(),
        }
    }
}

/// Which delivery policy the monitor applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Absent/PASSIVE/MODERATE every tick, ACTIVE never.
    #[default]
    Default,
    /// Rate-limit MODERATE and ACTIVE by the configured intervals.
    Throttled,
}

/// Delivery policy settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySettings {
    /// Policy selection.
    pub kind: PolicyKind,
    /// Minimum seconds between pushes to a MODERATE student (throttled only).
    pub moderate_min_interval_secs: u64,
    /// Minimum seconds between pushes to an ACTIVE student (throttled only).
    pub active_min_interval_secs: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            kind: PolicyKind::Default,
            moderate_min_interval_secs: 30,
            active_min_interval_secs: 120,
        }
    }
}

/// Rules-classifier thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    /// Correct answers strictly faster than this are ACTIVE.
    pub active_max_latency_ms: u64,
    /// Answers strictly slower than this are PASSIVE.
    pub passive_min_latency_ms: u64,
    /// Optional path to a learned model; rules are used when unset or unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            active_max_latency_ms: 4000,
            passive_min_latency_ms: 7000,
            model_path: None,
        }
    }
}

/// External roster polling settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RosterSettings {
    /// Period between roster refreshes for sessions with an external reference.
    pub poll_interval_ms: u64,
}

impl RosterSettings {
    /// Poll period as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
        }
    }
}

/// Per-connection outbound buffering.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Outbound frame buffer per connection.
    pub channel_capacity: usize,
    /// Lifetime dropped frames before a slow connection is evicted.
    pub max_total_drops: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            max_total_drops: 100,
        }
    }
}
