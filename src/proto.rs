//! Wire events for both websocket namespaces.
//!
//! Frames are JSON text, adjacently tagged: `{"event":"<name>","data":...}`.
//! Frames that fail to parse are dropped at the socket boundary and never
//! reach the coordinators.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::state::ConnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Text,
    Video,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

/// Caller-supplied descriptive data; not validated for truthfulness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub location: String,
}

/// Sender role stamped on relayed pair messages, from the recipient's
/// perspective.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Stranger,
}

/* ------------ default namespace (random pairing) ------------ */

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChatClientEvent {
    FindPair,
    FindVideoPair,
    ExchangeInfo(Profile),
    SendPeerId(String),
    SendMessage(String),
    DisconnectPair,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChatServerEvent {
    PairFound,
    ReceiveInfo(Profile),
    ReceivePeerId(String),
    ReceiveMessage { sender: SenderRole, message: String },
    PairDisconnected,
}

/* ------------ /room namespace ------------ */

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RoomClientEvent {
    JoinRoom { room: String, profile: Profile },
    SendMessage { room: String, message: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RoomServerEvent {
    /// Join acknowledgement to the caller, sent after the membership
    /// broadcasts.
    RoomJoined { room: String },
    UserConnected(Profile),
    ReceiveMembers(HashMap<ConnId, Profile>),
    ReceiveMessage { profile: Profile, message: String },
    UserDisconnected(Profile),
}
