//! Per-socket read/write loops shared by both endpoints.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use lectern_core::messages::{InboundMessage, OutboundMessage};
use lectern_runtime::ClientConnection;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::metrics::WS_INVALID_FRAMES_TOTAL;

/// Interval between server-initiated WebSocket pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Serialize a frame for a single connection.
pub(crate) fn encode(message: &OutboundMessage) -> Option<Arc<String>> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(kind = message.kind(), error = %e, "failed to serialize frame");
            None
        }
    }
}

/// Forward queued frames to the socket until the connection is closed or
/// the socket fails. Sends a close frame when closed from the server side.
pub(crate) fn spawn_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<String>>,
    connection: &ClientConnection,
) -> JoinHandle<()> {
    let close = connection.close_signal();
    let conn_id = connection.id.clone();
    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        let _ = heartbeat.tick().await;
        loop {
            tokio::select! {
                biased;
                () = close.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                frame = outbound.recv() => match frame {
                    Some(text) => {
                        if sink.send(Message::Text(text.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    trace!(conn_id = %conn_id, "sent ping");
                }
            }
        }
        debug!(conn_id = %conn_id, "writer exited");
    })
}

/// Read inbound frames until the peer leaves or the connection is closed.
///
/// Pings are answered here; every other well-formed frame goes to
/// `on_message`. Malformed frames are counted and skipped.
pub(crate) async fn read_loop<F, Fut>(
    mut stream: SplitStream<WebSocket>,
    connection: &ClientConnection,
    side: &'static str,
    mut on_message: F,
) where
    F: FnMut(InboundMessage) -> Fut,
    Fut: Future<Output = ()>,
{
    let close = connection.close_signal();
    loop {
        let next = tokio::select! {
            biased;
            () = close.cancelled() => break,
            next = stream.next() => next,
        };
        let Some(Ok(message)) = next else {
            break;
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(text.as_str()) {
                Ok(InboundMessage::Ping) => {
                    if let Some(frame) = encode(&OutboundMessage::Pong) {
                        let _ = connection.send(frame);
                    }
                }
                Ok(inbound) => on_message(inbound).await,
                Err(e) => {
                    counter!(WS_INVALID_FRAMES_TOTAL, "side" => side).increment(1);
                    debug!(conn_id = %connection.id, error = %e, "ignoring malformed frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}
