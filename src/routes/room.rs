//! `/room` namespace: named multi-party rooms over `GET /ws/room`.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Extension,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{
    pairing::Matchmaker,
    proto::{RoomClientEvent, RoomServerEvent},
    rooms::RoomDirectory,
    state::{ConnId, Registry},
};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(registry): Extension<Arc<Registry>>,
    Extension(matchmaker): Extension<Arc<Matchmaker>>,
    Extension(rooms): Extension<Arc<RoomDirectory>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| room_ws(socket, registry, matchmaker, rooms))
}

/* ---------------- per connection ---------------- */
async fn room_ws(
    socket: WebSocket,
    registry: Arc<Registry>,
    matchmaker: Arc<Matchmaker>,
    rooms: Arc<RoomDirectory>,
) {
    let conn = ConnId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    registry.insert(conn, tx.clone()).await;
    tracing::info!(%conn, "room client connected");

    let (mut sink, mut stream) = socket.split();
    let pump = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        let Message::Text(raw) = frame else { continue };
        let Ok(event) = serde_json::from_str::<RoomClientEvent>(&raw) else {
            continue;
        };
        match event {
            RoomClientEvent::JoinRoom { room, profile } => {
                // the join ack goes straight down this connection's channel
                let ack_tx = tx.clone();
                let joined = room.clone();
                rooms
                    .join_room(conn, &room, profile, move || {
                        if let Ok(json) =
                            serde_json::to_string(&RoomServerEvent::RoomJoined { room: joined })
                        {
                            let _ = ack_tx.send(json);
                        }
                    })
                    .await;
            }
            RoomClientEvent::SendMessage { room, message } => {
                rooms.send_room_message(conn, &room, message).await
            }
        }
    }

    tracing::info!(%conn, "room client disconnected");
    super::reconcile(conn, &matchmaker, &rooms, &registry).await;
    pump.abort();
}
