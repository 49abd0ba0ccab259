//! Random-chat matchmaking: FIFO waiting queues (one per chat kind), the
//! pairing table, and the relay operations that require an active pairing.
//!
//! All check-then-act sequences run under one mutex so the invariant "a
//! connection is never both queued and paired, and party to at most one
//! pairing" holds under concurrent calls. No network I/O happens under the
//! lock: operations collect an outbox while locked and deliver through the
//! registry after release (unbounded sends, fire-and-forget).

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::{
    proto::{ChatKind, ChatServerEvent, Profile, SenderRole},
    state::{ConnId, Registry},
};

#[derive(Default)]
struct PairTable {
    waiting: HashMap<ChatKind, VecDeque<ConnId>>,
    /// Both directions of every pairing (A→B and B→A), so lookup is O(1)
    /// either way.
    pairs: HashMap<ConnId, ConnId>,
}

impl PairTable {
    /// Removes `conn`'s pairing in both directions, returning the
    /// counterpart. No-op on an unpaired connection.
    fn unpair(&mut self, conn: ConnId) -> Option<ConnId> {
        let partner = self.pairs.remove(&conn)?;
        self.pairs.remove(&partner);
        Some(partner)
    }
}

pub struct Matchmaker {
    registry: Arc<Registry>,
    table: Mutex<PairTable>,
}

impl Matchmaker {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            table: Mutex::new(PairTable::default()),
        }
    }

    /// Pairs `conn` with the oldest waiting connection of `kind`, or queues
    /// it if nobody is waiting. No-op if `conn` is already queued for `kind`
    /// or already paired. At most one match is created per call.
    pub async fn find_pair(&self, conn: ConnId, kind: ChatKind) {
        let partner = {
            let mut table = self.table.lock().await;
            let table = &mut *table;
            // a connection is never both queued and paired, nor in two queues
            if table.pairs.contains_key(&conn)
                || table.waiting.values().any(|queue| queue.contains(&conn))
            {
                return;
            }
            let queue = table.waiting.entry(kind).or_default();
            let Some(partner) = queue.pop_front() else {
                queue.push_back(conn);
                tracing::debug!(%conn, ?kind, "queued for pairing");
                return;
            };
            table.pairs.insert(conn, partner);
            table.pairs.insert(partner, conn);
            partner
        };
        tracing::debug!(%conn, %partner, ?kind, "pair formed");
        self.registry.send(conn, &ChatServerEvent::PairFound).await;
        self.registry
            .send(partner, &ChatServerEvent::PairFound)
            .await;
    }

    /// Notifies the counterpart and tears the pairing down. No-op (and
    /// silent) without an active pairing.
    pub async fn disconnect_pair(&self, conn: ConnId) {
        let partner = self.table.lock().await.unpair(conn);
        if let Some(partner) = partner {
            tracing::debug!(%conn, %partner, "pair disconnected");
            self.registry
                .send(partner, &ChatServerEvent::PairDisconnected)
                .await;
        }
    }

    pub async fn exchange_info(&self, conn: ConnId, profile: Profile) {
        if let Some(partner) = self.counterpart(conn).await {
            self.registry
                .send(partner, &ChatServerEvent::ReceiveInfo(profile))
                .await;
        }
    }

    /// Relays an opaque signaling payload (e.g. a peer-session id) to the
    /// counterpart. The payload is not interpreted here.
    pub async fn relay_signal(&self, conn: ConnId, peer_id: String) {
        if let Some(partner) = self.counterpart(conn).await {
            self.registry
                .send(partner, &ChatServerEvent::ReceivePeerId(peer_id))
                .await;
        }
    }

    /// Delivers a chat message to the counterpart, stamped as coming from a
    /// stranger. The message is never stored or echoed back.
    pub async fn send_message(&self, conn: ConnId, message: String) {
        if let Some(partner) = self.counterpart(conn).await {
            self.registry
                .send(
                    partner,
                    &ChatServerEvent::ReceiveMessage {
                        sender: SenderRole::Stranger,
                        message,
                    },
                )
                .await;
        }
    }

    /// Reconciler step for a terminated connection: purge it from every
    /// waiting queue (any kind), then run the same notify-then-remove
    /// sequence as `disconnect_pair`. Idempotent.
    pub async fn handle_disconnect(&self, conn: ConnId) {
        let partner = {
            let mut table = self.table.lock().await;
            for queue in table.waiting.values_mut() {
                queue.retain(|waiting| *waiting != conn);
            }
            table.unpair(conn)
        };
        if let Some(partner) = partner {
            tracing::debug!(%conn, %partner, "pair disconnected");
            self.registry
                .send(partner, &ChatServerEvent::PairDisconnected)
                .await;
        }
    }

    async fn counterpart(&self, conn: ConnId) -> Option<ConnId> {
        self.table.lock().await.pairs.get(&conn).copied()
    }
}

#[cfg(test)]
impl Matchmaker {
    async fn waiting_len(&self, kind: ChatKind) -> usize {
        self.table
            .lock()
            .await
            .waiting
            .get(&kind)
            .map_or(0, VecDeque::len)
    }

    async fn pairing_count(&self) -> usize {
        self.table.lock().await.pairs.len() / 2
    }

    async fn is_paired(&self, conn: ConnId) -> bool {
        self.table.lock().await.pairs.contains_key(&conn)
    }
}
