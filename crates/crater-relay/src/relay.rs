use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{RwLock, mpsc};

use crater_core::net::messages::{ClientMessage, OPPONENT_LEFT, RoomSummary, ServerMessage};
use crater_core::net::protocol::{encode_server_message, sanitize_name};
use crater_core::player::{Player, PlayerId};
use crater_core::room::{PLAYERS_PER_MATCH, RoomState, generate_room_code, generate_seed};

/// Outbound channel of one connection. Carries encoded JSON frames.
pub type ClientTx = mpsc::UnboundedSender<String>;

/// Name a connection has until it sends `setName`.
const DEFAULT_NAME: &str = "Player";

/// Why a room operation was refused. The `Display` text is what the client
/// sees in the `error` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    InvalidName,
    AlreadyInRoom,
    RoomNotFound,
    RoomFull,
    NeedTwoPlayers,
    RoomLimit,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::InvalidName => write!(f, "Name must be at least 3 characters"),
            RelayError::AlreadyInRoom => write!(f, "Already in a room"),
            RelayError::RoomNotFound => write!(f, "Room not found"),
            RelayError::RoomFull => write!(f, "Room is full"),
            RelayError::NeedTwoPlayers => write!(f, "Need 2 players to start"),
            RelayError::RoomLimit => write!(f, "Maximum room limit reached"),
        }
    }
}

impl std::error::Error for RelayError {}

struct Client {
    tx: ClientTx,
    name: String,
    room: Option<String>,
    is_host: bool,
    is_spectator: bool,
}

struct Room {
    host_name: String,
    /// Seated players in seat order. Seat 0 plays team A.
    players: Vec<PlayerId>,
    spectators: Vec<PlayerId>,
    state: RoomState,
    seed: u64,
    current_turn: usize,
    /// First result reported for the match.
    result: Option<String>,
}

impl Room {
    fn members(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().chain(&self.spectators).copied()
    }

    fn can_start(&self) -> bool {
        self.players.len() == PLAYERS_PER_MATCH
    }
}

/// All connections and rooms of one relay process.
pub struct RelayState {
    clients: HashMap<PlayerId, Client>,
    rooms: HashMap<String, Room>,
    max_rooms: usize,
    next_id: PlayerId,
    rng: StdRng,
}

/// Shared relay state behind an async RwLock.
pub type SharedRelayState = Arc<RwLock<RelayState>>;

impl RelayState {
    pub fn new(max_rooms: usize) -> Self {
        Self::with_rng(max_rooms, StdRng::from_os_rng())
    }

    /// Relay with a fixed generator for room codes and seeds.
    pub fn with_rng(max_rooms: usize, rng: StdRng) -> Self {
        Self {
            clients: HashMap::new(),
            rooms: HashMap::new(),
            max_rooms,
            next_id: 1,
            rng,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn room_state(&self, code: &str) -> Option<RoomState> {
        self.rooms.get(code).map(|r| r.state)
    }

    /// Register a new connection and greet it with its id.
    pub fn connect(&mut self, tx: ClientTx) -> PlayerId {
        let id = self.next_id;
        self.next_id += 1;
        self.clients.insert(
            id,
            Client {
                tx,
                name: DEFAULT_NAME.to_string(),
                room: None,
                is_host: false,
                is_spectator: false,
            },
        );
        self.send(id, &ServerMessage::Connected { client_id: id });
        tracing::debug!(client_id = id, "Client connected");
        id
    }

    /// Drop a connection, leaving its room first.
    pub fn disconnect(&mut self, id: PlayerId) {
        self.leave_room(id);
        if self.clients.remove(&id).is_some() {
            tracing::debug!(client_id = id, "Client disconnected");
        }
    }

    /// Process one decoded message. Refusals are reported back to the sender.
    pub fn handle(&mut self, id: PlayerId, msg: ClientMessage) {
        if !self.clients.contains_key(&id) {
            return;
        }
        let result = match msg {
            ClientMessage::SetName { name } => self.set_name(id, &name),
            ClientMessage::GetRooms => {
                let rooms = self.room_list();
                self.send(id, &ServerMessage::RoomList { rooms });
                Ok(())
            },
            ClientMessage::CreateRoom => self.create_room(id),
            ClientMessage::JoinRoom { code, as_spectator } => {
                self.join_room(id, &code, as_spectator)
            },
            ClientMessage::LeaveRoom => {
                self.leave_room(id);
                Ok(())
            },
            ClientMessage::StartGame => self.start_game(id),
            ClientMessage::GameAction { action } => {
                self.game_action(id, action);
                Ok(())
            },
            ClientMessage::EndTurn => {
                self.end_turn(id);
                Ok(())
            },
            ClientMessage::GameOver { winner } => {
                self.game_over(id, winner);
                Ok(())
            },
        };
        if let Err(e) = result {
            tracing::debug!(client_id = id, error = %e, "Request refused");
            self.send(
                id,
                &ServerMessage::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    fn set_name(&mut self, id: PlayerId, raw: &str) -> Result<(), RelayError> {
        let name = sanitize_name(raw).ok_or(RelayError::InvalidName)?;
        if let Some(client) = self.clients.get_mut(&id) {
            client.name = name.clone();
        }
        self.send(id, &ServerMessage::NameSet { name });
        Ok(())
    }

    /// Rooms still waiting for players, ordered by code.
    pub fn room_list(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.state == RoomState::Waiting)
            .map(|(code, room)| RoomSummary {
                code: code.clone(),
                host_name: room.host_name.clone(),
                player_count: room.players.len(),
                spectator_count: room.spectators.len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.code.cmp(&b.code));
        rooms
    }

    fn create_room(&mut self, id: PlayerId) -> Result<(), RelayError> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        if client.room.is_some() {
            return Err(RelayError::AlreadyInRoom);
        }
        if self.rooms.len() >= self.max_rooms {
            return Err(RelayError::RoomLimit);
        }
        let host_name = client.name.clone();

        let code = loop {
            let code = generate_room_code(&mut self.rng);
            if !self.rooms.contains_key(&code) {
                break code;
            }
        };
        let seed = generate_seed(&mut self.rng);
        self.rooms.insert(
            code.clone(),
            Room {
                host_name,
                players: vec![id],
                spectators: Vec::new(),
                state: RoomState::Waiting,
                seed,
                current_turn: 0,
                result: None,
            },
        );
        if let Some(client) = self.clients.get_mut(&id) {
            client.room = Some(code.clone());
            client.is_host = true;
            client.is_spectator = false;
        }
        tracing::info!(room = %code, client_id = id, seed, "Room created");

        self.send(
            id,
            &ServerMessage::RoomCreated {
                code,
                is_host: true,
                seed,
            },
        );
        self.broadcast_room_list();
        Ok(())
    }

    fn join_room(&mut self, id: PlayerId, code: &str, as_spectator: bool) -> Result<(), RelayError> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        if client.room.is_some() {
            return Err(RelayError::AlreadyInRoom);
        }
        let name = client.name.clone();
        let code = code.trim().to_ascii_uppercase();
        let room = self.rooms.get_mut(&code).ok_or(RelayError::RoomNotFound)?;

        if as_spectator {
            room.spectators.push(id);
        } else {
            if room.players.len() >= PLAYERS_PER_MATCH {
                return Err(RelayError::RoomFull);
            }
            room.players.push(id);
        }
        let (host_name, seed, can_start) = (room.host_name.clone(), room.seed, room.can_start());
        if let Some(client) = self.clients.get_mut(&id) {
            client.room = Some(code.clone());
            client.is_host = false;
            client.is_spectator = as_spectator;
        }
        let players = self.player_names(&code);
        tracing::info!(room = %code, client_id = id, as_spectator, "Joined room");

        self.send(
            id,
            &ServerMessage::RoomJoined {
                code: code.clone(),
                is_host: false,
                is_spectator: as_spectator,
                host_name,
                seed,
                players: players.clone(),
            },
        );
        self.broadcast(
            &code,
            &ServerMessage::PlayerJoined {
                name,
                is_spectator: as_spectator,
                players,
                can_start,
            },
            Some(id),
        );
        self.broadcast_room_list();
        Ok(())
    }

    /// Take a connection out of its room. Hands host to the next seated
    /// player, and ends a running match the leaver was seated in.
    pub fn leave_room(&mut self, id: PlayerId) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let Some(code) = client.room.take() else {
            return;
        };
        let was_host = std::mem::replace(&mut client.is_host, false);
        client.is_spectator = false;
        let name = client.name.clone();
        self.send(id, &ServerMessage::LeftRoom);

        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        room.players.retain(|&p| p != id);
        room.spectators.retain(|&p| p != id);

        if room.players.is_empty() && room.spectators.is_empty() {
            self.rooms.remove(&code);
            tracing::info!(room = %code, "Room closed");
            self.broadcast_room_list();
            return;
        }

        let new_host = if was_host { room.players.first().copied() } else { None };
        let abandoned = room.state == RoomState::Playing && room.players.len() < PLAYERS_PER_MATCH;
        if abandoned {
            room.state = RoomState::Finished;
        }
        let can_start = room.can_start();

        if let Some(host_id) = new_host {
            let host_name = self.clients.get_mut(&host_id).map(|host| {
                host.is_host = true;
                host.name.clone()
            });
            if let (Some(room), Some(host_name)) = (self.rooms.get_mut(&code), host_name) {
                room.host_name = host_name;
            }
            tracing::info!(room = %code, client_id = host_id, "Host reassigned");
            self.send(host_id, &ServerMessage::BecameHost);
        }

        let players = self.player_names(&code);
        self.broadcast(
            &code,
            &ServerMessage::PlayerLeft {
                name,
                players,
                can_start,
            },
            None,
        );
        if abandoned {
            tracing::info!(room = %code, client_id = id, "Match abandoned");
            self.broadcast(
                &code,
                &ServerMessage::GameOver {
                    winner: OPPONENT_LEFT.to_string(),
                    reason: Some("Opponent disconnected".to_string()),
                },
                None,
            );
        }
        self.broadcast_room_list();
    }

    fn start_game(&mut self, id: PlayerId) -> Result<(), RelayError> {
        let Some((code, true)) = self
            .clients
            .get(&id)
            .and_then(|c| c.room.clone().map(|code| (code, c.is_host)))
        else {
            tracing::debug!(client_id = id, "Start ignored from non-host");
            return Ok(());
        };
        let room = self.rooms.get_mut(&code).ok_or(RelayError::NeedTwoPlayers)?;
        if !room.can_start() {
            return Err(RelayError::NeedTwoPlayers);
        }
        room.state = RoomState::Playing;
        room.current_turn = 0;
        room.result = None;
        let seed = room.seed;
        let seats = room.players.clone();
        let players: Vec<Player> = seats
            .into_iter()
            .map(|pid| Player {
                id: pid,
                name: self.name_of(pid),
            })
            .collect();
        tracing::info!(room = %code, seed, "Match started");

        self.broadcast(
            &code,
            &ServerMessage::GameStart {
                players,
                seed,
                first_player: 0,
            },
            None,
        );
        self.broadcast_room_list();
        Ok(())
    }

    /// Forward an opaque action to the rest of the room. Only seated players
    /// of a running match are heard.
    fn game_action(&mut self, id: PlayerId, action: serde_json::Value) {
        let Some(code) = self.playing_room_of(id) else {
            return;
        };
        if self.clients.get(&id).is_some_and(|c| c.is_spectator) {
            tracing::debug!(room = %code, client_id = id, "Spectator action ignored");
            return;
        }
        self.broadcast(
            &code,
            &ServerMessage::GameAction {
                action,
                player_id: id,
            },
            Some(id),
        );
    }

    fn end_turn(&mut self, id: PlayerId) {
        let Some(code) = self.playing_room_of(id) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        // Only the seat holding the turn can hand it on.
        if room.players.get(room.current_turn) != Some(&id) {
            tracing::debug!(room = %code, client_id = id, "End turn out of turn ignored");
            return;
        }
        room.current_turn = (room.current_turn + 1) % PLAYERS_PER_MATCH;
        let current = room.current_turn;
        let next = room.players.get(current).copied();
        let player_name = next.map(|pid| self.name_of(pid));
        tracing::debug!(room = %code, current, "Turn changed");
        self.broadcast(
            &code,
            &ServerMessage::TurnChange {
                current_player: current,
                player_name,
            },
            None,
        );
    }

    /// Record and announce a match result. Later reports for the same match
    /// are only compared, never re-announced.
    fn game_over(&mut self, id: PlayerId, winner: String) {
        let Some(code) = self.clients.get(&id).and_then(|c| c.room.clone()) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        if !room.players.contains(&id) {
            return;
        }
        if let Some(first) = &room.result {
            if *first != winner {
                tracing::warn!(room = %code, %first, second = %winner, "Peers reported different results");
            }
            return;
        }
        room.state = RoomState::Finished;
        room.result = Some(winner.clone());
        tracing::info!(room = %code, %winner, "Match finished");
        self.broadcast(&code, &ServerMessage::GameOver { winner, reason: None }, None);
    }

    fn playing_room_of(&self, id: PlayerId) -> Option<String> {
        let code = self.clients.get(&id)?.room.clone()?;
        (self.rooms.get(&code)?.state == RoomState::Playing).then_some(code)
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.clients
            .get(&id)
            .map_or_else(|| "Unknown".to_string(), |c| c.name.clone())
    }

    fn player_names(&self, code: &str) -> Vec<String> {
        self.rooms
            .get(code)
            .map(|room| room.players.iter().map(|&pid| self.name_of(pid)).collect())
            .unwrap_or_default()
    }

    fn send(&self, id: PlayerId, msg: &ServerMessage) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        match encode_server_message(msg) {
            Ok(text) => {
                let _ = client.tx.send(text);
            },
            Err(e) => tracing::error!(error = %e, "Failed to encode relay message"),
        }
    }

    /// Send to every member of a room, optionally skipping one.
    fn broadcast(&self, code: &str, msg: &ServerMessage, exclude: Option<PlayerId>) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let text = match encode_server_message(msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(room = code, error = %e, "Failed to encode relay message");
                return;
            },
        };
        for id in room.members().filter(|&id| Some(id) != exclude) {
            if let Some(client) = self.clients.get(&id) {
                let _ = client.tx.send(text.clone());
            }
        }
    }

    /// Push the lobby listing to every connection not in a room.
    fn broadcast_room_list(&self) {
        let msg = ServerMessage::RoomList {
            rooms: self.room_list(),
        };
        let Ok(text) = encode_server_message(&msg) else {
            return;
        };
        for client in self.clients.values().filter(|c| c.room.is_none()) {
            let _ = client.tx.send(text.clone());
        }
    }
}
