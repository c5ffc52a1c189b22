//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production default values, and `#[serde(default)]`
//! allows partial JSON: missing fields get their default value during
//! deserialization.

mod monitor;

pub use monitor::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "monitor": { "tickIntervalMs": 5000, "policy": { "kind": "throttled" } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LecternSettings {
    /// Network listener settings.
    pub server: ServerSettings,
    /// Adaptive monitor cadence and delivery policy.
    pub monitor: MonitorSettings,
    /// Engagement classifier thresholds.
    pub classifier: ClassifierSettings,
    /// External roster polling.
    pub roster: RosterSettings,
    /// Per-connection buffering.
    pub connections: ConnectionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl LecternSettings {
    /// Correct invalid values in place.
    ///
    /// Called automatically during loading. Out-of-range values are fixed
    /// with a warning rather than rejected.
    pub fn validate(&mut self) {
        fn at_least_one(val: &mut u64, name: &str) {
            if *val == 0 {
                tracing::warn!("{name} must be positive, using 1");
                *val = 1;
            }
        }

        at_least_one(&mut self.monitor.tick_interval_ms, "monitor.tickIntervalMs");
        at_least_one(&mut self.roster.poll_interval_ms, "roster.pollIntervalMs");
        if self.monitor.decision_buffer == 0 {
            tracing::warn!("monitor.decisionBuffer must be positive, using 1");
            self.monitor.decision_buffer = 1;
        }
        if self.connections.channel_capacity == 0 {
            tracing::warn!("connections.channelCapacity must be positive, using 1");
            self.connections.channel_capacity = 1;
        }

        let c = &mut self.classifier;
        if c.active_max_latency_ms > c.passive_min_latency_ms {
            tracing::warn!(
                active = c.active_max_latency_ms,
                passive = c.passive_min_latency_ms,
                "classifier thresholds inverted, swapping"
            );
            std::mem::swap(&mut c.active_max_latency_ms, &mut c.passive_min_latency_ms);
        }
    }
}

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP/WebSocket port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = LecternSettings::default();
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.monitor.tick_interval_ms, 10_000);
        assert_eq!(s.monitor.policy.kind, PolicyKind::Default);
        assert_eq!(s.classifier.active_max_latency_ms, 4000);
        assert_eq!(s.classifier.passive_min_latency_ms, 7000);
        assert_eq!(s.connections.max_total_drops, 100);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let s: LecternSettings =
            serde_json::from_str(r#"{"monitor": {"tickIntervalMs": 2500}}"#).unwrap();
        assert_eq!(s.monitor.tick_interval_ms, 2500);
        assert_eq!(s.monitor.decision_buffer, 256);
        assert_eq!(s.server.port, 8000);
    }

    #[test]
    fn validate_fixes_zero_intervals() {
        let mut s = LecternSettings::default();
        s.monitor.tick_interval_ms = 0;
        s.connections.channel_capacity = 0;
        s.validate();
        assert_eq!(s.monitor.tick_interval_ms, 1);
        assert_eq!(s.connections.channel_capacity, 1);
    }

    #[test]
    fn validate_swaps_inverted_thresholds() {
        let mut s = LecternSettings::default();
        s.classifier.active_max_latency_ms = 9000;
        s.classifier.passive_min_latency_ms = 3000;
        s.validate();
        assert_eq!(s.classifier.active_max_latency_ms, 3000);
        assert_eq!(s.classifier.passive_min_latency_ms, 9000);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(LecternSettings::default()).unwrap();
        assert!(json["monitor"].get("tickIntervalMs").is_some());
        assert_eq!(json["monitor"]["policy"]["kind"], "default");
    }
}
