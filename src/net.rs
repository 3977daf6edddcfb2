//! WebSocket transport: one connection per player, `/ws?room=<id>`. Split
//! between a send task and a receive task, joined with `tokio::select!`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::delta::PlayerDelta;
use crate::input::RawInputMessage;
use crate::manager::{self, RoomCommand, RoomManager, ServerEvent};
use crate::state::RoomState;

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    /// Omitted to create a fresh room; the server replies with
    /// `roomCreated` carrying the generated id.
    pub room: Option<String>,
}

/// Inbound client messages: `player_input`, `setServerControlMode`,
/// `ping`, `updateState`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "player_input")]
    PlayerInput {
        #[serde(flatten)]
        raw: RawInputMessage,
    },
    #[serde(rename = "setServerControlMode")]
    SetServerControlMode { mode: String },
    #[serde(rename = "ping")]
    Ping { timestamp: u64 },
    #[serde(rename = "updateState")]
    UpdateState {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(flatten)]
        delta: PlayerDelta,
    },
}

/// Outbound server messages: initial `RoomState` sync, `worldCreationTime`,
/// `pong`, and per-step `physics_update`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "roomState")]
    RoomState {
        #[serde(flatten)]
        state: RoomState,
    },
    #[serde(rename = "worldCreationTime")]
    WorldCreationTime { at_ms: f64 },
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
    #[serde(rename = "roomCreated")]
    RoomCreated { room_id: String },
    #[serde(rename = "physics_update")]
    PhysicsUpdate {
        step: u64,
        deltas: HashMap<String, PlayerDelta>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl From<ServerEvent> for ServerMessage {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::WorldCreationTime(at_ms) => ServerMessage::WorldCreationTime { at_ms },
            ServerEvent::Pong(timestamp) => ServerMessage::Pong { timestamp },
            ServerEvent::Physics(update) => ServerMessage::PhysicsUpdate {
                step: update.step,
                deltas: update.deltas,
            },
            ServerEvent::InitialState(state) => ServerMessage::RoomState { state },
            ServerEvent::RoomCreated(room_id) => ServerMessage::RoomCreated { room_id },
        }
    }
}

pub async fn ws_handler(
    State(manager): State<Arc<RoomManager>>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, manager, params.room))
}

async fn handle_socket(socket: WebSocket, manager: Arc<RoomManager>, room_id: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let session_id = Uuid::new_v4().to_string();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let freshly_created = room_id.is_none();
    let room_id = room_id.unwrap_or_else(manager::generate_room_id);

    info!(room_id, session_id, freshly_created, "new websocket connection");
    if freshly_created {
        let _ = outbound_tx.send(ServerEvent::RoomCreated(room_id.clone()));
    }

    let room_sender = manager.room_sender(&room_id);
    let (reply_tx, reply_rx) = oneshot::channel();
    let join_sent = room_sender
        .send(RoomCommand::Join {
            session_id: session_id.clone(),
            outbound: outbound_tx.clone(),
            reply: reply_tx,
        })
        .await
        .is_ok();

    if !join_sent {
        warn!(room_id, session_id, "room actor gone before join could be delivered");
        return;
    }

    match reply_rx.await {
        Ok(Ok((state, created_at))) => {
            let _ = outbound_tx.send(ServerEvent::InitialState(state));
            let _ = outbound_tx.send(ServerEvent::WorldCreationTime(created_at));
        }
        Ok(Err(err)) => {
            warn!(room_id, session_id, error = %err, "join rejected");
            send_error(&mut ws_sender, err.to_string()).await;
            return;
        }
        Err(_) => {
            warn!(room_id, session_id, "room actor dropped the join reply");
            return;
        }
    }

    let send_task = tokio::spawn(forward_to_client(ws_sender, outbound_rx));

    let recv_room_sender = room_sender.clone();
    let recv_session_id = session_id.clone();
    let recv_outbound_tx = outbound_tx.clone();
    let recv_room_id = room_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    handle_client_text(&text, &recv_room_sender, &recv_session_id, &recv_outbound_tx).await;
                }
                Ok(Message::Close(_)) => break,
                Err(err) => {
                    error!(room_id = %recv_room_id, session_id = %recv_session_id, error = %err, "websocket error");
                    break;
                }
                _ => {}
            }
        }
        let _ = recv_room_sender.send(RoomCommand::Leave { session_id: recv_session_id }).await;
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(room_id = %room_id, session_id, "websocket connection closed");
}

async fn handle_client_text(
    text: &str,
    room_sender: &mpsc::Sender<RoomCommand>,
    session_id: &str,
    outbound_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::PlayerInput { raw }) => {
            let _ = room_sender
                .send(RoomCommand::Input { session_id: session_id.to_string(), raw })
                .await;
        }
        Ok(ClientMessage::SetServerControlMode { mode }) => {
            let _ = room_sender.send(RoomCommand::SetControlMode { mode }).await;
        }
        Ok(ClientMessage::Ping { timestamp }) => {
            let _ = outbound_tx.send(ServerEvent::Pong(timestamp));
        }
        Ok(ClientMessage::UpdateState { session_id: target, delta }) => {
            let _ = room_sender
                .send(RoomCommand::DebugUpdateState { session_id: target, delta })
                .await;
        }
        Err(err) => {
            warn!(session_id, error = %err, raw = text, "failed to parse client message");
        }
    }
}

/// Sends a one-off `error` message directly over the socket, for rejections
/// that happen before `forward_to_client` is spawned.
async fn send_error(ws_sender: &mut futures_util::stream::SplitSink<WebSocket, Message>, message: String) {
    match serde_json::to_string(&ServerMessage::Error { message }) {
        Ok(json) => {
            let _ = ws_sender.send(Message::Text(json.into())).await;
        }
        Err(err) => {
            error!(error = %err, "failed to serialize error message");
        }
    }
}

async fn forward_to_client(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = outbound_rx.recv().await {
        let message = ServerMessage::from(event);
        match serde_json::to_string(&message) {
            Ok(json) => {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                error!(error = %err, "failed to serialize outgoing message");
            }
        }
    }
}
