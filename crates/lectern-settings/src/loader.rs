//! Layered settings loader: defaults → JSON file → environment.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::{LecternSettings, PolicyKind};

/// Default settings file location: `~/.lectern/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".lectern").join("settings.json")
}

/// Load settings from the default path with environment overrides.
pub fn load_settings() -> Result<LecternSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, deep-merged over defaults, then apply
/// `LECTERN_*` environment overrides and [`LecternSettings::validate`].
///
/// A missing file is not an error: defaults (plus env) are returned.
pub fn load_settings_from_path(path: &Path) -> Result<LecternSettings> {
    let defaults = serde_json::to_value(LecternSettings::default())?;
    let merged = match std::fs::read_to_string(path) {
        Ok(raw) => {
            let user: Value = serde_json::from_str(&raw)?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "no settings file, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut settings: LecternSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, |var| std::env::var(var).ok())?;
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` into `base`. Objects merge key-by-key and
/// `null` overlay values are skipped; any other overlay value (including
/// arrays) replaces the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `LECTERN_*` overrides using `lookup` to read variables.
pub(crate) fn apply_env_overrides(
    settings: &mut LecternSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(host) = lookup("LECTERN_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = lookup("LECTERN_PORT") {
        settings.server.port = parse_env("LECTERN_PORT", &port)?;
    }
    if let Some(ms) = lookup("LECTERN_TICK_INTERVAL_MS") {
        settings.monitor.tick_interval_ms = parse_env("LECTERN_TICK_INTERVAL_MS", &ms)?;
    }
    if let Some(level) = lookup("LECTERN_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(policy) = lookup("LECTERN_POLICY") {
        settings.monitor.policy.kind = match policy.to_ascii_lowercase().as_str() {
            "default" => PolicyKind::Default,
            "throttled" => PolicyKind::Throttled,
            _ => {
                return Err(SettingsError::Env {
                    var: "LECTERN_POLICY",
                    value: policy,
                });
            }
        };
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| SettingsError::Env {
        var,
        value: value.to_string(),
    })
}
