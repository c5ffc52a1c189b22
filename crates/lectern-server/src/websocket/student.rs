//! Student endpoint: receives question pushes, submits responses.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use lectern_core::messages::InboundMessage;
use lectern_core::{SessionId, StudentId};
use lectern_runtime::{ClientConnection, StudentKey, SubmittedResponse};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use super::connection::{read_loop, spawn_writer};
use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::server::AppState;

const SIDE: &str = "student";

/// `GET /ws/student/{session_id}/{student_id}`
///
/// Unknown sessions are rejected with 404 and ended ones with 410 before
/// the upgrade. Registration re-checks the status, so a session stopped
/// during the handshake closes the socket instead of leaving it attached.
pub async fn student_ws(
    ws: WebSocketUpgrade,
    Path((session_id, student_id)): Path<(u64, u64)>,
    State(state): State<AppState>,
) -> Response {
    let key = StudentKey::new(SessionId(session_id), StudentId(student_id));
    match state.runtime.sessions.get(key.session_id) {
        None => return StatusCode::NOT_FOUND.into_response(),
        Some(record) if record.status.is_terminal() => return StatusCode::GONE.into_response(),
        Some(_) => {}
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, key))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, key: StudentKey) {
    let opened = Instant::now();
    let (conn, outbound) = ClientConnection::channel(state.channel_capacity);
    let conn = Arc::new(conn);
    let runtime = Arc::clone(&state.runtime);
    // The session may have ended since the upgrade check.
    if let Err(e) = runtime.sessions.admit_student(key, Arc::clone(&conn)) {
        info!(%key, error = %e, "student refused");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    counter!(WS_CONNECTIONS_TOTAL, "side" => SIDE).increment(1);
    info!(%key, conn_id = %conn.id, "student connected");

    let (sink, stream) = socket.split();
    let writer = spawn_writer(sink, outbound, &conn);

    read_loop(stream, &conn, SIDE, |message| {
        let intake = Arc::clone(&runtime.intake);
        async move {
            let InboundMessage::Response {
                question_id,
                answer,
                response_time_ms,
            } = message
            else {
                return;
            };
            let submitted = SubmittedResponse {
                session_id: key.session_id,
                student_id: key.student_id,
                question_id,
                answer,
                response_time_ms,
            };
            match intake.submit(submitted).await {
                Ok(graded) => debug!(%key, is_correct = graded.is_correct, tier = %graded.event.tier, "response accepted"),
                Err(e) => warn!(%key, %question_id, error = %e, "response rejected"),
            }
        }
    })
    .await;

    let _ = runtime.students.disconnect(&conn.id);
    conn.close();
    if let Err(e) = writer.await {
        warn!(conn_id = %conn.id, error = %e, "writer task failed");
    }
    counter!(WS_DISCONNECTIONS_TOTAL, "side" => SIDE).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "side" => SIDE).record(opened.elapsed().as_secs_f64());
    info!(%key, conn_id = %conn.id, "student disconnected");
}
