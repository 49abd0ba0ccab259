//! Default namespace: anonymous 1:1 pairing over `GET /ws/chat`.

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
    proto::{ChatClientEvent, ChatKind},
    rooms::RoomDirectory,
    state::{ConnId, Registry},
};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(registry): Extension<Arc<Registry>>,
    Extension(matchmaker): Extension<Arc<Matchmaker>>,
    Extension(rooms): Extension<Arc<RoomDirectory>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| chat_ws(socket, registry, matchmaker, rooms))
}

/* ---------------- per connection ---------------- */
async fn chat_ws(
    socket: WebSocket,
    registry: Arc<Registry>,
    matchmaker: Arc<Matchmaker>,
    rooms: Arc<RoomDirectory>,
) {
    let conn = ConnId::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    registry.insert(conn, tx).await;
    tracing::info!(%conn, "chat client connected");

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
        let Ok(event) = serde_json::from_str::<ChatClientEvent>(&raw) else {
            continue;
        };
        match event {
            ChatClientEvent::FindPair => matchmaker.find_pair(conn, ChatKind::Text).await,
            ChatClientEvent::FindVideoPair => matchmaker.find_pair(conn, ChatKind::Video).await,
            ChatClientEvent::ExchangeInfo(profile) => {
                matchmaker.exchange_info(conn, profile).await
            }
            ChatClientEvent::SendPeerId(peer_id) => matchmaker.relay_signal(conn, peer_id).await,
            ChatClientEvent::SendMessage(message) => matchmaker.send_message(conn, message).await,
            ChatClientEvent::DisconnectPair => matchmaker.disconnect_pair(conn).await,
        }
    }

    tracing::info!(%conn, "chat client disconnected");
    super::reconcile(conn, &matchmaker, &rooms, &registry).await;
    pump.abort();
}
