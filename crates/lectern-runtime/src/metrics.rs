//! Metric name constants shared by the runtime and the server.

/// Monitor ticks completed (counter).
pub const MONITOR_TICKS_TOTAL: &str = "monitor_ticks_total";
/// Monitor tick duration seconds (histogram).
pub const MONITOR_TICK_DURATION_SECONDS: &str = "monitor_tick_duration_seconds";
/// Sessions currently monitored (gauge).
pub const MONITOR_SESSIONS_ACTIVE: &str = "monitor_sessions_active";
/// Push decisions handed to dispatch (counter).
pub const MONITOR_DECISIONS_TOTAL: &str = "monitor_decisions_total";
/// Push decisions dropped because the dispatch channel was full or closed (counter).
pub const MONITOR_DECISION_DROPS_TOTAL: &str = "monitor_decision_drops_total";
/// Per-session evaluation failures (counter, labels: `error_type`).
pub const MONITOR_SESSION_ERRORS_TOTAL: &str = "monitor_session_errors_total";
/// Questions pushed to students (counter).
pub const DISPATCH_QUESTIONS_TOTAL: &str = "dispatch_questions_total";
/// Engagement events recorded (counter, labels: tier).
pub const ENGAGEMENT_EVENTS_TOTAL: &str = "engagement_events_total";
/// Classifications that fell back to rules (counter).
pub const CLASSIFIER_FALLBACKS_TOTAL: &str = "classifier_fallbacks_total";
/// Live connections (gauge, labels: registry).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Frames dropped on full outbound buffers (counter, labels: registry).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
