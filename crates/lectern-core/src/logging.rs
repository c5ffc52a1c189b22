//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set. With `json`
/// enabled every event is emitted as one JSON object per line. Calling this
/// more than once is harmless: later calls are ignored with a warning.
pub fn init_subscriber(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "tracing subscriber already installed");
    }
}
