//! Instructor endpoint: live engagement and dashboard snapshots.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::StreamExt;
use lectern_core::InstructorId;
use lectern_core::messages::OutboundMessage;
use lectern_runtime::ClientConnection;
use metrics::{counter, histogram};
use tracing::{debug, info};

use super::connection::{encode, read_loop, spawn_writer};
use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::server::AppState;

const SIDE: &str = "instructor";

/// `GET /ws/instructor/{instructor_id}`
pub async fn instructor_ws(
    ws: WebSocketUpgrade,
    Path(instructor_id): Path<u64>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, InstructorId(instructor_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, instructor_id: InstructorId) {
    let opened = Instant::now();
    let (conn, outbound) = ClientConnection::channel(state.channel_capacity);
    let conn = Arc::new(conn);
    let runtime = Arc::clone(&state.runtime);
    runtime.instructors.connect(instructor_id, Arc::clone(&conn));
    counter!(WS_CONNECTIONS_TOTAL, "side" => SIDE).increment(1);
    info!(%instructor_id, conn_id = %conn.id, "instructor connected");

    let (sink, stream) = socket.split();
    let writer = spawn_writer(sink, outbound, &conn);

    // Only the new connection gets the catch-up snapshots.
    for snapshot in runtime.intake.dashboards_for(instructor_id).await {
        if let Some(frame) = encode(&OutboundMessage::DashboardUpdate(snapshot)) {
            let _ = conn.send(frame);
        }
    }

    read_loop(stream, &conn, SIDE, |message| async move {
        debug!(%instructor_id, ?message, "ignoring instructor frame");
    })
    .await;

    let _ = runtime.instructors.disconnect(&conn.id);
    conn.close();
    let _ = writer.await;
    counter!(WS_DISCONNECTIONS_TOTAL, "side" => SIDE).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS, "side" => SIDE).record(opened.elapsed().as_secs_f64());
    info!(%instructor_id, conn_id = %conn.id, "instructor disconnected");
}
