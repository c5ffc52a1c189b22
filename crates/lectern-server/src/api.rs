//! Thin JSON API over the session manager, engagement store and intake.

use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lectern_core::messages::DashboardSnapshot;
use lectern_core::{
    EngagementEvent, EngagementTier, InstructorId, QuestionId, SessionId, SessionRecord, StudentId,
};
use lectern_runtime::{RuntimeError, SessionState, SubmittedResponse};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::metrics::API_ERRORS_TOTAL;
use crate::server::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// [`RuntimeError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(RuntimeError);

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RuntimeError::NotFound { .. } => StatusCode::NOT_FOUND,
            RuntimeError::InvalidTransition { .. } => StatusCode::CONFLICT,
            RuntimeError::SessionEnded(_) => StatusCode::GONE,
            RuntimeError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
            RuntimeError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        counter!(API_ERRORS_TOTAL, "error_type" => self.0.kind()).increment(1);
        let body = json!({ "error": self.0.kind(), "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `POST /api/sessions` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Owning instructor.
    pub instructor_id: InstructorId,
    /// Meeting reference for roster polling.
    #[serde(default)]
    pub external_ref: Option<String>,
}

/// `POST /api/sessions/{id}/start` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartSessionRequest {
    /// Initial roster.
    pub student_ids: BTreeSet<StudentId>,
}

/// `GET .../history` query.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum events returned.
    pub limit: Option<usize>,
}

/// `POST /api/responses` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseRequest {
    /// Session the answer belongs to.
    pub session_id: SessionId,
    /// Answering student.
    pub student_id: StudentId,
    /// Question answered.
    pub question_id: QuestionId,
    /// Answer text.
    pub answer: String,
    /// Time from push to answer.
    pub response_time_ms: u64,
}

/// `POST /api/responses` reply.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponseReply {
    /// Whether the answer matched the key.
    pub is_correct: bool,
    /// Tier recorded for the response.
    pub tier: EngagementTier,
    /// Identifier of the recorded event.
    pub event_id: u64,
}

fn state_of(state: &AppState, session_id: SessionId) -> Result<SessionState, ApiError> {
    state
        .runtime
        .sessions
        .session_state(session_id)
        .ok_or_else(|| RuntimeError::session_not_found(session_id).into())
}

/// Create a PENDING session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> (StatusCode, Json<SessionRecord>) {
    let record = state.runtime.sessions.create(req.instructor_id, req.external_ref);
    (StatusCode::CREATED, Json(record))
}

/// Session record plus monitored roster.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
) -> ApiResult<SessionState> {
    state_of(&state, SessionId(session_id)).map(Json)
}

/// Activate a session (or replace an active session's roster).
pub async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
    body: Option<Json<StartSessionRequest>>,
) -> ApiResult<SessionState> {
    let session_id = SessionId(session_id);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    state.runtime.sessions.start(session_id, req.student_ids)?;
    state_of(&state, session_id).map(Json)
}

/// End a session.
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
) -> ApiResult<SessionState> {
    let session_id = SessionId(session_id);
    state.runtime.sessions.stop(session_id)?;
    state_of(&state, session_id).map(Json)
}

/// Pull the roster from the external source now.
pub async fn refresh_roster(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
) -> ApiResult<SessionState> {
    let session_id = SessionId(session_id);
    state.runtime.sessions.refresh_roster(session_id).await?;
    state_of(&state, session_id).map(Json)
}

/// Current dashboard snapshot.
pub async fn dashboard(
    State(state): State<AppState>,
    Path(session_id): Path<u64>,
) -> ApiResult<DashboardSnapshot> {
    Ok(Json(
        state
            .runtime
            .intake
            .dashboard_snapshot(SessionId(session_id))
            .await?,
    ))
}

/// A student's engagement events in a session, newest first.
pub async fn history(
    State(state): State<AppState>,
    Path((session_id, student_id)): Path<(u64, u64)>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<EngagementEvent>> {
    let session_id = SessionId(session_id);
    if state.runtime.sessions.get(session_id).is_none() {
        return Err(RuntimeError::session_not_found(session_id).into());
    }
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(
        state
            .runtime
            .store
            .history(StudentId(student_id), session_id, limit)
            .await?,
    ))
}

/// Grade and record a response submitted over HTTP.
pub async fn submit_response(
    State(state): State<AppState>,
    Json(req): Json<SubmitResponseRequest>,
) -> ApiResult<SubmitResponseReply> {
    let graded = state
        .runtime
        .intake
        .submit(SubmittedResponse {
            session_id: req.session_id,
            student_id: req.student_id,
            question_id: req.question_id,
            answer: req.answer,
            response_time_ms: req.response_time_ms,
        })
        .await?;
    Ok(Json(SubmitResponseReply {
        is_correct: graded.is_correct,
        tier: graded.event.tier,
        event_id: graded.event.id,
    }))
}
