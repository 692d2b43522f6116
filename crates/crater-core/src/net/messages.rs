use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// Winner string the relay uses when a seated player leaves mid-match.
pub const OPPONENT_LEFT: &str = "opponent_left";

/// Winner string for a match where both teams fell on the same blast.
pub const DRAW: &str = "draw";

/// A room advertised in the lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: String,
    pub host_name: String,
    pub player_count: usize,
    pub spectator_count: usize,
}

/// Messages sent from a client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    SetName {
        name: String,
    },
    GetRooms,
    CreateRoom,
    JoinRoom {
        code: String,
        #[serde(default)]
        as_spectator: bool,
    },
    LeaveRoom,
    StartGame,
    /// Opaque action payload, forwarded verbatim to the rest of the room.
    GameAction {
        action: serde_json::Value,
    },
    EndTurn,
    GameOver {
        winner: String,
    },
}

/// Messages sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Connected {
        client_id: PlayerId,
    },
    NameSet {
        name: String,
    },
    RoomList {
        rooms: Vec<RoomSummary>,
    },
    RoomCreated {
        code: String,
        is_host: bool,
        seed: u64,
    },
    RoomJoined {
        code: String,
        is_host: bool,
        is_spectator: bool,
        host_name: String,
        seed: u64,
        players: Vec<String>,
    },
    PlayerJoined {
        name: String,
        is_spectator: bool,
        players: Vec<String>,
        can_start: bool,
    },
    LeftRoom,
    PlayerLeft {
        name: String,
        players: Vec<String>,
        can_start: bool,
    },
    BecameHost,
    GameStart {
        players: Vec<Player>,
        seed: u64,
        first_player: usize,
    },
    GameAction {
        action: serde_json::Value,
        player_id: PlayerId,
    },
    TurnChange {
        current_player: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
    },
    GameOver {
        winner: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Error {
        message: String,
    },
}
