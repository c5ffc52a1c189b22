//! Adaptive monitor and its delivery policies.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `monitor` | Tick loop, roster map, per-session evaluation, decision hand-off |
//! | `policy` | `DeliveryPolicy` hook with default and throttled implementations |

#[allow(clippy::module_inception)]
pub mod monitor;
pub mod policy;

pub use monitor::{AdaptiveMonitor, AdaptiveMonitorBuilder, DEFAULT_TICK_INTERVAL, PushDecision, TickReport};
pub use policy::{DefaultPolicy, DeliveryPolicy, ThrottledPolicy, policy_from_settings};
