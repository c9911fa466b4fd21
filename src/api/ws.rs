// =============================================================================
// WebSocket Handler — Push-based state updates
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. An immediate full StateSnapshot on connect.
//   2. A fresh snapshot whenever the state_version has moved since the last
//      push, checked every 500 ms.
//
// Ping frames get Pong replies; text frames are treated as heartbeats and
// otherwise ignored. Each outbound message carries a per-connection sequence
// number so clients can detect gaps.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::Serialize;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::app_state::{AppState, StateSnapshot};

/// How often the push loop re-checks the state version.
const PUSH_PERIOD_MS: u64 = 500;

#[derive(Serialize)]
struct WsEnvelope {
    sequence: u64,
    snapshot: StateSnapshot,
}

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("websocket connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Manages a single WebSocket connection lifecycle.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    use futures_util::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut sequence: u64 = 0;

    // Initial snapshot on connect.
    if let Err(e) = send_snapshot(&mut sender, &state, &mut sequence).await {
        warn!(error = %e, "failed to send initial websocket snapshot");
        return;
    }
    let mut last_sent_version = state.version();

    let mut push_interval = interval(Duration::from_millis(PUSH_PERIOD_MS));

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current = state.version();
                if current != last_sent_version {
                    match send_snapshot(&mut sender, &state, &mut sequence).await {
                        Ok(()) => last_sent_version = current,
                        Err(e) => {
                            debug!(error = %e, "websocket send failed, disconnecting");
                            break;
                        }
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(msg = %text, "websocket heartbeat");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("websocket close frame received");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("websocket binary message ignored");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error, disconnecting");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("websocket client disconnected");
}

/// Serialize and send the current snapshot, advancing the sequence number.
async fn send_snapshot<S>(
    sender: &mut S,
    state: &Arc<AppState>,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    use futures_util::SinkExt;

    *sequence += 1;
    let envelope = WsEnvelope {
        sequence: *sequence,
        snapshot: state.build_snapshot(),
    };
    let payload = serde_json::to_string(&envelope).map_err(axum::Error::new)?;
    sender.send(Message::Text(payload)).await
}
