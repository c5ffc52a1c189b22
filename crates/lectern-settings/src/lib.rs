//! # lectern-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LecternSettings::default()`]
//! 2. **Settings file**: `~/.lectern/settings.json` or an explicit path (deep-merged over defaults)
//! 3. **Environment variables**: `LECTERN_*` overrides (highest priority)
//!
//! There is no global instance. The binary loads settings once at startup
//! and hands the value (or the relevant section) to each component it
//! constructs.
//!
//! # Usage
//!
//! ```no_run
//! use lectern_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("tick interval: {}ms", settings.monitor.tick_interval_ms);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
