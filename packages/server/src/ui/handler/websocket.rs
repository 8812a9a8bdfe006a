//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::AUTHORIZATION},
    response::IntoResponse,
};
use futures_util::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{ConnectionId, PusherChannel, ServerEvent},
    infrastructure::dto::{
        conversion::encode_event,
        websocket::{DecodeError, decode_client_command},
    },
    ui::state::AppState,
    usecase::DispatchError,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// Upgrade to a WebSocket session.
///
/// Authentication runs after the upgrade so that a rejected client still
/// receives an `auth:error` frame before the socket is closed.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = query.token.or_else(|| bearer_token(&headers));
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

/// Spawns a task that drains the outbound queue into the WebSocket sink.
///
/// The loop ends when the queue is closed or when `session` is cancelled.
/// Cancellation wins over pending frames and over a write stuck on a stalled
/// socket, so an overflowed connection is dropped without flushing its queue.
fn pusher_loop<S>(
    mut rx: mpsc::Receiver<String>,
    mut sender: S,
    session: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let drain = async {
            while let Some(frame) = rx.recv().await {
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    return;
                }
            }
            let _ = sender.send(Message::Close(None)).await;
        };
        tokio::select! {
            _ = session.cancelled() => {}
            _ = drain => {}
        }
    })
}

/// Reads client frames until the client goes away or `session` is cancelled.
///
/// Cancellation is only observed between frames, so a command that is
/// already being dispatched always runs to completion.
async fn receive_loop<R>(
    mut receiver: R,
    state: Arc<AppState>,
    connection_id: ConnectionId,
    session: CancellationToken,
) where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = session.cancelled() => break,
            msg = receiver.next() => msg,
        };
        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, "WebSocket error: {}", e);
                break;
            }
            None => break,
        };

        match msg {
            Message::Text(text) => {
                handle_text(&state, &connection_id, text.as_str()).await;
            }
            Message::Close(_) => {
                tracing::info!(connection_id = %connection_id, "client requested close");
                break;
            }
            // Ping/pong is handled automatically by the WebSocket protocol
            _ => {}
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    let connection_id = ConnectionId::generate();
    let (channel, rx, session) = PusherChannel::bounded(state.outbound_queue_capacity);
    let (mut sender, receiver) = socket.split();

    if let Err(e) = state
        .lifecycle
        .admit(connection_id.clone(), token.as_deref(), channel)
        .await
    {
        tracing::warn!(connection_id = %connection_id, code = e.code(), "connection rejected: {}", e);
        let event = ServerEvent::AuthError {
            message: e.to_string(),
        };
        match encode_event(&event) {
            Ok(frame) => {
                let _ = sender.send(Message::Text(frame.into())).await;
            }
            Err(e) => tracing::error!("Failed to encode auth error: {}", e),
        }
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    // Spawn a task to receive events from this client
    let mut recv_task = tokio::spawn(receive_loop(
        receiver,
        state.clone(),
        connection_id.clone(),
        session.clone(),
    ));

    // Spawn a task to push queued events to this client
    let mut send_task = pusher_loop(rx, sender, session.clone());

    // If either task completes, stop the other one
    let reader_finished = tokio::select! {
        _ = &mut recv_task => true,
        _ = &mut send_task => false,
    };
    if session.is_cancelled() {
        tracing::info!(connection_id = %connection_id, "outbound queue overflowed; disconnecting");
    }
    session.cancel();
    if reader_finished {
        send_task.abort();
    } else if let Err(e) = recv_task.await {
        tracing::error!(connection_id = %connection_id, "receive task failed: {}", e);
    }

    state.lifecycle.close(&connection_id).await;
}

/// Decode one text frame and dispatch it.
async fn handle_text(state: &AppState, connection_id: &ConnectionId, text: &str) {
    match decode_client_command(text) {
        Ok(command) => {
            tracing::debug!(connection_id = %connection_id, event = command.name(), "received event");
            state.lifecycle.dispatch(connection_id, command).await;
        }
        Err(DecodeError::UnknownEvent(event)) => {
            tracing::warn!(connection_id = %connection_id, event = %event, "unknown event ignored");
        }
        Err(e) => {
            tracing::info!(connection_id = %connection_id, "invalid event: {}", e);
            state
                .lifecycle
                .report(connection_id, &DispatchError::Validation(e.to_string()))
                .await;
        }
    }
}
