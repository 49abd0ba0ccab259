//! Named multi-party rooms: membership tracking and broadcast relay.
//!
//! Rooms are created lazily on first join and never destroyed; an empty
//! member map is harmless dead state. Same locking discipline as the
//! matchmaker: mutate under one mutex, deliver after release.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    proto::{Profile, RoomServerEvent},
    state::{ConnId, Registry},
};

pub struct RoomDirectory {
    registry: Arc<Registry>,
    rooms: Mutex<HashMap<String, HashMap<ConnId, Profile>>>,
}

impl RoomDirectory {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `profile` in the room, announces the newcomer to the prior
    /// members, broadcasts the full updated member mapping to everyone in the
    /// room (joiner included), then invokes `ack` exactly once. A connection
    /// may join any number of distinct rooms.
    pub async fn join_room(
        &self,
        conn: ConnId,
        room: &str,
        profile: Profile,
        ack: impl FnOnce(),
    ) {
        let mut outbox = Vec::new();
        {
            let mut rooms = self.rooms.lock().await;
            let members = rooms.entry(room.to_owned()).or_default();
            for &member in members.keys() {
                outbox.push((member, RoomServerEvent::UserConnected(profile.clone())));
            }
            members.insert(conn, profile);
            let snapshot = members.clone();
            for &member in members.keys() {
                outbox.push((member, RoomServerEvent::ReceiveMembers(snapshot.clone())));
            }
            tracing::debug!(%conn, room, members = members.len(), "joined room");
        }
        self.deliver(outbox).await;
        ack();
    }

    /// Broadcasts `message` with the sender's profile to every other member.
    /// Dropped silently if the sender is not in the room.
    pub async fn send_room_message(&self, conn: ConnId, room: &str, message: String) {
        let outbox = {
            let rooms = self.rooms.lock().await;
            let Some(members) = rooms.get(room) else {
                return;
            };
            let Some(profile) = members.get(&conn) else {
                return;
            };
            members
                .keys()
                .filter(|&&member| member != conn)
                .map(|&member| {
                    (
                        member,
                        RoomServerEvent::ReceiveMessage {
                            profile: profile.clone(),
                            message: message.clone(),
                        },
                    )
                })
                .collect()
        };
        self.deliver(outbox).await;
    }

    /// Reconciler step: removes `conn` from every room it occupies and tells
    /// the remaining members, followed by the updated member mapping.
    /// Idempotent.
    pub async fn leave_room_all(&self, conn: ConnId) {
        let mut outbox = Vec::new();
        {
            let mut rooms = self.rooms.lock().await;
            for (name, members) in rooms.iter_mut() {
                let Some(profile) = members.remove(&conn) else {
                    continue;
                };
                let snapshot = members.clone();
                for &member in members.keys() {
                    outbox.push((member, RoomServerEvent::UserDisconnected(profile.clone())));
                    outbox.push((member, RoomServerEvent::ReceiveMembers(snapshot.clone())));
                }
                tracing::debug!(%conn, room = %name, "left room");
            }
        }
        self.deliver(outbox).await;
    }

    async fn deliver(&self, outbox: Vec<(ConnId, RoomServerEvent)>) {
        for (member, event) in outbox {
            self.registry.send(member, &event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Sex;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    async fn client(registry: &Registry) -> (ConnId, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ConnId::new();
        registry.insert(conn, tx).await;
        (conn, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(json) = rx.try_recv() {
            events.push(serde_json::from_str(&json).unwrap());
        }
        events
    }

    fn setup() -> (Arc<Registry>, RoomDirectory) {
        let registry = Arc::new(Registry::default());
        let directory = RoomDirectory::new(registry.clone());
        (registry, directory)
    }

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_owned(),
            sex: Sex::Female,
            age: None,
            location: String::new(),
        }
    }

    fn member_names(event: &Value) -> Vec<String> {
        let mut names: Vec<String> = event["data"]
            .as_object()
            .unwrap()
            .values()
            .map(|profile| profile["name"].as_str().unwrap().to_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn joins_broadcast_growing_member_snapshots() {
        let (registry, rooms) = setup();
        let (a, mut rx_a) = client(&registry).await;
        let (b, mut rx_b) = client(&registry).await;
        let (c, mut rx_c) = client(&registry).await;

        rooms.join_room(a, "lobby", profile("alice"), || {}).await;
        let events = drain(&mut rx_a);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "receive-members");
        assert_eq!(member_names(&events[0]), ["alice"]);

        rooms.join_room(b, "lobby", profile("bob"), || {}).await;
        let events = drain(&mut rx_a);
        assert_eq!(events[0]["event"], "user-connected");
        assert_eq!(events[0]["data"]["name"], "bob");
        assert_eq!(member_names(&events[1]), ["alice", "bob"]);
        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 1);
        assert_eq!(member_names(&events[0]), ["alice", "bob"]);

        rooms.join_room(c, "lobby", profile("carol"), || {}).await;
        for rx in [&mut rx_a, &mut rx_b] {
            let events = drain(rx);
            assert_eq!(events[0]["event"], "user-connected");
            assert_eq!(events[0]["data"]["name"], "carol");
            assert_eq!(member_names(&events[1]), ["alice", "bob", "carol"]);
        }
        let events = drain(&mut rx_c);
        assert_eq!(events.len(), 1);
        assert_eq!(member_names(&events[0]), ["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn join_ack_fires_exactly_once() {
        let (registry, rooms) = setup();
        let (a, _rx_a) = client(&registry).await;
        let acks = AtomicUsize::new(0);

        rooms
            .join_room(a, "lobby", profile("alice"), || {
                acks.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(acks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn room_message_skips_the_sender() {
        let (registry, rooms) = setup();
        let (a, mut rx_a) = client(&registry).await;
        let (b, mut rx_b) = client(&registry).await;
        rooms.join_room(a, "lobby", profile("alice"), || {}).await;
        rooms.join_room(b, "lobby", profile("bob"), || {}).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        rooms
            .send_room_message(a, "lobby", "hello room".to_owned())
            .await;
        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "receive-message");
        assert_eq!(events[0]["data"]["profile"]["name"], "alice");
        assert_eq!(events[0]["data"]["message"], "hello room");
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn room_message_from_non_member_is_dropped() {
        let (registry, rooms) = setup();
        let (a, mut rx_a) = client(&registry).await;
        let (outsider, mut rx_outsider) = client(&registry).await;
        rooms.join_room(a, "lobby", profile("alice"), || {}).await;
        drain(&mut rx_a);

        rooms
            .send_room_message(outsider, "lobby", "let me in".to_owned())
            .await;
        rooms
            .send_room_message(outsider, "no-such-room", "anyone?".to_owned())
            .await;
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_outsider).is_empty());
    }

    #[tokio::test]
    async fn leaving_updates_every_room_and_stays_idempotent() {
        let (registry, rooms) = setup();
        let (a, mut rx_a) = client(&registry).await;
        let (b, mut rx_b) = client(&registry).await;
        let (c, mut rx_c) = client(&registry).await;
        rooms.join_room(a, "lobby", profile("alice"), || {}).await;
        rooms.join_room(a, "games", profile("alice"), || {}).await;
        rooms.join_room(b, "lobby", profile("bob"), || {}).await;
        rooms.join_room(c, "games", profile("carol"), || {}).await;
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        rooms.leave_room_all(a).await;
        for (rx, remaining) in [(&mut rx_b, "bob"), (&mut rx_c, "carol")] {
            let events = drain(rx);
            assert_eq!(events.len(), 2);
            assert_eq!(events[0]["event"], "user-disconnected");
            assert_eq!(events[0]["data"]["name"], "alice");
            assert_eq!(events[1]["event"], "receive-members");
            assert_eq!(member_names(&events[1]), [remaining]);
        }

        rooms.leave_room_all(a).await;
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
        assert!(drain(&mut rx_c).is_empty());
    }

    #[tokio::test]
    async fn member_can_rejoin_after_leaving() {
        let (registry, rooms) = setup();
        let (a, mut rx_a) = client(&registry).await;
        let (b, mut rx_b) = client(&registry).await;
        rooms.join_room(a, "lobby", profile("alice"), || {}).await;
        rooms.join_room(b, "lobby", profile("bob"), || {}).await;
        rooms.leave_room_all(a).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        rooms.join_room(a, "lobby", profile("alice"), || {}).await;
        let events = drain(&mut rx_b);
        assert_eq!(events[0]["event"], "user-connected");
        assert_eq!(member_names(&events[1]), ["alice", "bob"]);
        let events = drain(&mut rx_a);
        assert_eq!(member_names(&events[0]), ["alice", "bob"]);
    }
}
