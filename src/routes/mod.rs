use axum::{routing::get, Router};
use std::sync::Arc;

use crate::{pairing::Matchmaker, rooms::RoomDirectory, state::{ConnId, Registry}};

pub mod chat;
pub mod room;

pub fn router() -> Router {
    Router::new()
        .route("/chat", get(chat::ws_handler))
        .route("/room", get(room::ws_handler))
}

/// Disconnect reconciler, run once when a connection's read loop ends:
/// purge waiting queues, unwind any pairing (notify first), leave every
/// room, then drop the registry entry. Every step is a no-op on absent
/// state, so a duplicate run emits nothing.
pub(crate) async fn reconcile(
    conn: ConnId,
    matchmaker: &Matchmaker,
    rooms: &RoomDirectory,
    registry: &Arc<Registry>,
) {
    matchmaker.handle_disconnect(conn).await;
    rooms.leave_room_all(conn).await;
    registry.remove(conn).await;
}
