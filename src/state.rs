use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type EventTx = mpsc::UnboundedSender<String>;

/* ------------ connection identity ------------ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/* ------------ connection registry ------------ */

/// Live connections and their outbound event channels. Delivery is
/// fire-and-forget: a send to a connection that already went away is
/// silently dropped — the disconnect path cleans the entry up on its own.
#[derive(Default)]
pub struct Registry {
    clients: RwLock<HashMap<ConnId, EventTx>>,
}

impl Registry {
    pub async fn insert(&self, id: ConnId, tx: EventTx) {
        self.clients.write().await.insert(id, tx);
    }

    pub async fn remove(&self, id: ConnId) {
        self.clients.write().await.remove(&id);
    }

    pub async fn send<E: Serialize>(&self, id: ConnId, event: &E) {
        let Ok(json) = serde_json::to_string(event) else {
            return;
        };
        if let Some(tx) = self.clients.read().await.get(&id) {
            let _ = tx.send(json);
        }
    }
}
