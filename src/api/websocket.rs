//! WebSocket handlers for streamed command results.
//!
//! A connection carries exactly one request: the client sends an `execute`
//! message, the server answers with `result` frames until the delivery ends,
//! then closes. Closing the socket early cancels the run.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::handlers::AppState;
use super::types::WsMessage;
use crate::error::RelayError;
use crate::execution::{deliver, CommandRequest, DeliveryKind, DeliveryMode, StreamFrame};
use crate::Result;

/// Frames buffered between the delivery task and the socket writer.
const FRAME_BUFFER: usize = 16;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Unified endpoint: the `execute` message picks the mode.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, None))
}

/// Live-resend endpoint (`ExecuteAndStream`).
pub async fn ws_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Some(DeliveryKind::Stream)))
}

/// Repeated-poll endpoint (`ExecuteAndPoll`).
pub async fn ws_poll_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Some(DeliveryKind::Poll)))
}

async fn send_json(sink: &mut WsSink, msg: &WsMessage) -> Result<()> {
    let json = serde_json::to_string(msg).map_err(|e| RelayError::Io(e.into()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|_| RelayError::ChannelClosed)
}

/// Handle one WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState, fixed: Option<DeliveryKind>) {
    let (mut sink, mut stream) = socket.split();

    let Some((request, requested)) = read_request(&mut sink, &mut stream).await else {
        return;
    };
    let mode = state.delivery_mode(fixed.or(requested).unwrap_or_default());

    match stream_results(&mut sink, &mut stream, &state, request, mode).await {
        Ok(()) => {
            let _ = sink.send(Message::Close(None)).await;
        }
        Err(e) => warn!(mode = ?mode.kind(), "stream ended early: {}", e),
    }
}

/// Wait for the client's `execute` message, answering pings meanwhile.
async fn read_request(
    sink: &mut WsSink,
    stream: &mut WsStream,
) -> Option<(CommandRequest, Option<DeliveryKind>)> {
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => return None,
            Ok(Message::Ping(data)) => {
                let _ = sink.send(Message::Pong(data)).await;
                continue;
            }
            Ok(_) => continue,
            Err(_) => return None,
        };

        match serde_json::from_str::<WsMessage>(text.as_str()) {
            Ok(WsMessage::Ping) => {
                let _ = send_json(sink, &WsMessage::Pong).await;
            }
            Ok(msg) => match msg.into_request() {
                Some(request) => return Some(request),
                None => {
                    let err = WsMessage::error("UNEXPECTED_MESSAGE", "expected an execute message");
                    let _ = send_json(sink, &err).await;
                }
            },
            Err(e) => {
                let _ = send_json(sink, &WsMessage::error("PARSE_ERROR", e.to_string())).await;
            }
        }
    }
    None
}

/// Forward delivery frames to the socket until the final frame, a client
/// disconnect, or a write failure.
async fn stream_results(
    sink: &mut WsSink,
    stream: &mut WsStream,
    state: &AppState,
    request: CommandRequest,
    mode: DeliveryMode,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<StreamFrame>(FRAME_BUFFER);
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let runner = Arc::clone(&state.runner);
    let task_cancel = cancel.clone();
    let delivery =
        tokio::spawn(async move { deliver(&runner, mode, &request, &task_cancel, &tx).await });

    let outcome = loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    let is_final = frame.is_final;
                    if let Err(e) = send_json(sink, &WsMessage::from(frame)).await {
                        break Err(e);
                    }
                    if is_final {
                        break Ok(());
                    }
                }
                None => break Ok(()),
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Text(text))) => {
                    if let Ok(WsMessage::Ping) = serde_json::from_str::<WsMessage>(text.as_str()) {
                        let _ = send_json(sink, &WsMessage::Pong).await;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    debug!("client went away, cancelling");
                    cancel.cancel();
                    break Ok(());
                }
                Some(Ok(_)) => {}
            },
        }
    };

    // Dropping the receiver makes a still-sending delivery fail and kill its child
    drop(rx);
    if outcome.is_err() {
        cancel.cancel();
    }

    match delivery.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("delivery stopped: {}", e),
        Err(e) => return Err(RelayError::Task(e.to_string())),
    }

    outcome
}
