use std::fmt;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use plane_types::ClientAction;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::{publish, send_current};
use crate::server::AppState;
use crate::state::{ClientId, Frame, WorldState};

// ─── Disconnect bookkeeping ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer sent a close frame or the stream ended
    Closed,
    /// Frame could not be decoded as a client action
    Malformed,
    /// Transport error while reading
    ReceiveError,
    /// Writer gave up (send failure or timeout)
    WriterClosed,
    /// Removed from the registry by someone else (slow client, shutdown)
    Evicted,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed by peer",
            Self::Malformed => "malformed message",
            Self::ReceiveError => "receive error",
            Self::WriterClosed => "writer closed",
            Self::Evicted => "evicted",
        };
        f.write_str(s)
    }
}

/// What to do with one inbound WebSocket message.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Action(ClientAction),
    Ignore,
    Disconnect(DisconnectReason),
}

/// Classify a raw WebSocket read. Undecodable payloads end the connection.
pub fn classify(msg: Result<Message, axum::Error>) -> Inbound {
    let text = match msg {
        Ok(Message::Text(text)) => text,
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => return Inbound::Disconnect(DisconnectReason::Malformed),
        },
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => return Inbound::Ignore,
        Ok(Message::Close(_)) => return Inbound::Disconnect(DisconnectReason::Closed),
        Err(e) => {
            debug!("WebSocket receive error: {e}");
            return Inbound::Disconnect(DisconnectReason::ReceiveError);
        }
    };

    match ClientAction::decode(&text) {
        Ok(action) => Inbound::Action(action),
        Err(e) => {
            debug!("Malformed client message: {e}");
            Inbound::Disconnect(DisconnectReason::Malformed)
        }
    }
}

/// Apply one action to the world on behalf of `client_id`.
///
/// Returns whether clients need a fresh snapshot, or `None` if the client has
/// already been removed from the registry, in which case nothing was applied.
pub async fn apply_action(
    world: &WorldState,
    client_id: ClientId,
    action: ClientAction,
) -> Option<bool> {
    match action {
        ClientAction::Guess { player, plane_id, airport } => {
            world.guess_as(client_id, &player, &plane_id, &airport).await?;
            Some(true)
        }
        ClientAction::ToggleGameMode => {
            let mode = world.toggle_as(client_id).await?;
            info!("🎮 Client {client_id}: game mode {}", if mode { "on" } else { "off" });
            Some(true)
        }
        ClientAction::Unknown => {
            debug!("Client {client_id}: ignoring unknown action");
            Some(false)
        }
    }
}

// ─── WebSocket Endpoint ───────────────────────────────────────────────────────

pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| on_connect(socket, app))
}

/// Connection lifecycle: register → read actions until close/error/eviction → unregister.
///
/// Outbound frames go through a bounded queue drained by a separate writer task, so a
/// client that stops reading only ever stalls its own writer. Reading stops as soon as
/// the client leaves the registry.
pub async fn on_connect(socket: WebSocket, app: AppState) {
    let client_id = Uuid::new_v4();
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel::<Frame>(app.client_buffer);

    let mut eviction = app.world.register(client_id, tx).await;
    if !send_current(&app.world, client_id).await {
        info!("Client disconnected: {client_id} (dropped before the first snapshot)");
        return;
    }

    let mut writer = tokio::spawn(write_frames(client_id, sink, rx, app.send_timeout));

    let reason = tokio::select! {
        biased;
        _ = &mut eviction => DisconnectReason::Evicted,
        reason = read_actions(client_id, stream, &app.world) => reason,
        _ = &mut writer => DisconnectReason::WriterClosed,
    };

    app.world.unregister(client_id).await;
    if reason == DisconnectReason::Evicted {
        // Give the writer one write budget to flush and send Close.
        let _ = timeout(app.send_timeout, &mut writer).await;
    }
    writer.abort();

    info!("Client disconnected: {client_id} ({reason})");
}

async fn read_actions(
    client_id: ClientId,
    mut stream: SplitStream<WebSocket>,
    world: &WorldState,
) -> DisconnectReason {
    while let Some(msg) = stream.next().await {
        match classify(msg) {
            Inbound::Action(action) => match apply_action(world, client_id, action).await {
                Some(true) => {
                    publish(world).await;
                }
                Some(false) => {}
                None => return DisconnectReason::Evicted,
            },
            Inbound::Ignore => {}
            Inbound::Disconnect(reason) => return reason,
        }
    }
    DisconnectReason::Closed
}

async fn write_frames(
    client_id: ClientId,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Frame>,
    send_timeout: Duration,
) {
    while let Some(frame) = rx.recv().await {
        match timeout(send_timeout, sink.send(Message::Text(frame.to_string()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Client {client_id}: send failed: {e}");
                return;
            }
            Err(_) => {
                warn!("Client {client_id}: send timed out after {send_timeout:?}");
                return;
            }
        }
    }

    // Sender dropped: unregistered or server shutting down.
    let _ = timeout(send_timeout, sink.send(Message::Close(None))).await;
}
