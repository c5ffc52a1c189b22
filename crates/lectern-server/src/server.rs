//! Router, shared handler state and the serve loop.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use lectern_runtime::LecternRuntime;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api;
use crate::websocket::{instructor, student};

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Wired runtime components.
    pub runtime: Arc<LecternRuntime>,
    /// Prometheus handle; `/metrics` answers 404 without one.
    pub metrics: Option<PrometheusHandle>,
    /// Outbound frame buffer per connection.
    pub channel_capacity: usize,
}

/// Build the router with every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws/student/{session_id}/{student_id}", get(student::student_ws))
        .route("/ws/instructor/{instructor_id}", get(instructor::instructor_ws))
        .route("/api/sessions", post(api::create_session))
        .route("/api/sessions/{session_id}", get(api::get_session))
        .route("/api/sessions/{session_id}/start", post(api::start_session))
        .route("/api/sessions/{session_id}/stop", post(api::stop_session))
        .route("/api/sessions/{session_id}/refresh", post(api::refresh_roster))
        .route("/api/sessions/{session_id}/dashboard", get(api::dashboard))
        .route(
            "/api/sessions/{session_id}/students/{student_id}/history",
            get(api::history),
        )
        .route("/api/responses", post(api::submit_response))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "lectern server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let runtime = &state.runtime;
    axum::Json(json!({
        "status": "ok",
        "monitorRunning": runtime.monitor.is_running(),
        "activeSessions": runtime.monitor.active_sessions().len(),
        "instructorConnections": runtime.instructors.connection_count(),
        "studentConnections": runtime.students.connection_count(),
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
