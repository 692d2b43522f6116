//! Two-peer lockstep over the relay.
//!
//! Each peer runs its own full simulation from the shared `gameStart` seed.
//! Only discrete actions cross the wire: the local team's actions go out as
//! `gameAction`, the peer's come back in and are applied to the remote team.
//! Each payload carries the turn it was made in, so an action that arrives
//! after its turn already ended here is dropped rather than replayed later.
//! Nothing is reconciled. If the two simulations drift apart the session can
//! only log it.

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crater_core::game_trait::{
    ActionError, GameEvent, GameOverReason, MatchOutcome, MatchSetup, TurnBasedGame,
};
use crater_core::net::messages::{ClientMessage, DRAW, OPPONENT_LEFT, ServerMessage};
use crater_core::player::{Controller, Player, PlayerId, Team};

/// Remote actions held back while the local simulation catches up.
const MAX_DEFERRED: usize = 64;

/// Field added to outgoing action payloads naming the turn they were made in.
const TURN_FIELD: &str = "turn";

/// Why a session could not be set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The bootstrap message was not `gameStart`.
    NotGameStart,
    /// This client is not one of the seated players.
    NotSeated(PlayerId),
    /// A match needs exactly two seated players.
    RosterSize(usize),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NotGameStart => write!(f, "expected a gameStart message"),
            SyncError::NotSeated(id) => write!(f, "client {id} is not seated in this match"),
            SyncError::RosterSize(n) => write!(f, "a match needs 2 players, got {n}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Relay label for a match result.
pub fn winner_label(winner: Option<Team>) -> String {
    match winner {
        Some(team) => team.to_string(),
        None => DRAW.to_string(),
    }
}

/// Copy of `action` tagged with the turn it was made in. Non-object payloads
/// go out untagged.
pub fn stamp_turn(action: &serde_json::Value, turn: u32) -> serde_json::Value {
    let mut stamped = action.clone();
    if let Some(fields) = stamped.as_object_mut() {
        fields.insert(TURN_FIELD.to_string(), turn.into());
    }
    stamped
}

/// Strip the turn tag from a received payload.
pub fn take_turn(mut action: serde_json::Value) -> (Option<u32>, serde_json::Value) {
    let turn = action
        .as_object_mut()
        .and_then(|fields| fields.remove(TURN_FIELD))
        .and_then(|t| t.as_u64())
        .and_then(|t| u32::try_from(t).ok());
    (turn, action)
}

/// A remote action waiting for the local simulation to reach its turn.
#[derive(Debug, Clone)]
struct Held {
    /// Turn the peer made it in. Untagged payloads wait for any remote turn.
    turn: Option<u32>,
    action: serde_json::Value,
}

/// Where a tagged remote action stands against the local turn counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    Early,
    Current,
    Stale,
}

/// Inverse of [`winner_label`]. `None` for labels that name no result.
pub fn parse_winner(label: &str) -> Option<Option<Team>> {
    match label {
        "A" => Some(Some(Team::A)),
        "B" => Some(Some(Team::B)),
        DRAW => Some(None),
        _ => None,
    }
}

/// A match played against a peer through the relay.
pub struct NetworkMatch<G: TurnBasedGame> {
    game: G,
    players: Vec<Player>,
    local_team: Team,
    inbox: UnboundedReceiver<ServerMessage>,
    outbox: UnboundedSender<ClientMessage>,
    /// Remote actions that arrived before the local simulation reached the
    /// turn or phase they belong to. Retried in order every step.
    deferred: VecDeque<Held>,
    /// Team the relay says holds the turn, when the local simulation has not
    /// got there yet.
    expected_turn: Option<Team>,
    connected: bool,
}

impl<G: TurnBasedGame> NetworkMatch<G> {
    /// Start a session from the relay's `gameStart`. The seat order in
    /// `players` decides the teams: slot 0 plays A, slot 1 plays B.
    pub fn from_game_start(
        mut game: G,
        local_id: PlayerId,
        start: ServerMessage,
        inbox: UnboundedReceiver<ServerMessage>,
        outbox: UnboundedSender<ClientMessage>,
    ) -> Result<Self, SyncError> {
        let ServerMessage::GameStart {
            players,
            seed,
            first_player,
        } = start
        else {
            return Err(SyncError::NotGameStart);
        };
        if players.len() != 2 {
            return Err(SyncError::RosterSize(players.len()));
        }
        let slot = players
            .iter()
            .position(|p| p.id == local_id)
            .ok_or(SyncError::NotSeated(local_id))?;
        let local_team = Team::from_slot(slot);

        let mut controllers = [Controller::Remote; 2];
        controllers[local_team.index()] = Controller::Local;
        game.init(&MatchSetup {
            seed,
            players: players.clone(),
            first_team: Team::from_slot(first_player),
            controllers,
        });
        tracing::info!(seed, team = %local_team, "Network match started");

        Ok(Self {
            game,
            players,
            local_team,
            inbox,
            outbox,
            deferred: VecDeque::new(),
            expected_turn: None,
            connected: true,
        })
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn local_team(&self) -> Team {
        self.local_team
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Remote actions still waiting to apply.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Apply a local action and forward it to the peer, tagged with the
    /// current turn. Rejected actions are not forwarded.
    pub fn submit(&mut self, action: &serde_json::Value) -> Result<(), ActionError> {
        let turn = self.game.turn_number();
        self.game.apply_action(self.local_team, action)?;
        self.send(ClientMessage::GameAction {
            action: stamp_turn(action, turn),
        });
        Ok(())
    }

    /// Drain the inbox, retry held remote actions, then advance the
    /// simulation by one step.
    pub fn step(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while self.connected {
            match self.inbox.try_recv() {
                Ok(msg) => events.extend(self.handle(msg)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Relay connection lost");
                    self.connected = false;
                    events.extend(self.game.force_game_over(MatchOutcome {
                        winner: None,
                        reason: GameOverReason::ConnectionLost,
                    }));
                },
            }
        }
        self.retry_deferred();

        let stepped = self.game.update();
        for event in &stepped {
            match event {
                GameEvent::TurnEnded { team } if *team == self.local_team => {
                    self.send(ClientMessage::EndTurn);
                },
                GameEvent::TurnStarted { team, .. } => self.check_turn(*team),
                GameEvent::GameOver {
                    winner,
                    reason: GameOverReason::TeamEliminated,
                } => {
                    self.send(ClientMessage::GameOver {
                        winner: winner_label(*winner),
                    });
                },
                _ => {},
            }
        }
        events.extend(stepped);
        events
    }

    fn handle(&mut self, msg: ServerMessage) -> Vec<GameEvent> {
        match msg {
            ServerMessage::GameAction { action, player_id } => {
                if self.seat_of(player_id) == Some(self.local_team) {
                    return Vec::new();
                }
                self.apply_remote(action);
                Vec::new()
            },
            ServerMessage::TurnChange { current_player, .. } => {
                let team = Team::from_slot(current_player);
                if self.game.active_team() != team {
                    self.expected_turn = Some(team);
                }
                Vec::new()
            },
            ServerMessage::GameOver { winner, reason } => {
                if winner == OPPONENT_LEFT {
                    tracing::info!(reason = ?reason, "Opponent left the match");
                    return self.game.force_game_over(MatchOutcome {
                        winner: Some(self.local_team),
                        reason: GameOverReason::OpponentDisconnected,
                    });
                }
                match parse_winner(&winner) {
                    Some(result) if self.game.is_game_over() => {
                        if self.game.winner() != result {
                            tracing::warn!(
                                remote = %winner,
                                local = ?self.game.winner(),
                                "Peers disagree on the match result"
                            );
                        }
                        Vec::new()
                    },
                    Some(result) => self.game.force_game_over(MatchOutcome {
                        winner: result,
                        reason: GameOverReason::TeamEliminated,
                    }),
                    None => {
                        tracing::warn!(%winner, "Unrecognized match result");
                        Vec::new()
                    },
                }
            },
            ServerMessage::Error { message } => {
                tracing::warn!(%message, "Relay reported an error");
                Vec::new()
            },
            other => {
                tracing::debug!(msg = ?other, "Ignored relay message");
                Vec::new()
            },
        }
    }

    fn apply_remote(&mut self, action: serde_json::Value) {
        let (turn, action) = take_turn(action);
        let held = Held { turn, action };
        if !self.deferred.is_empty() {
            self.defer(held);
            return;
        }
        match self.timing(held.turn) {
            Timing::Stale => self.drop_stale(&held),
            Timing::Early => self.defer(held),
            Timing::Current => match self.game.apply_action(self.local_team.other(), &held.action) {
                Ok(()) => {},
                Err(ActionError::NotYourTurn(_) | ActionError::WrongPhase) => self.defer(held),
                Err(e) => tracing::warn!(error = %e, "Dropped remote action"),
            },
        }
    }

    /// A tagged action belongs to the remote team's turn with that number.
    /// Once the local counter has moved past it, that turn is over here.
    fn timing(&self, turn: Option<u32>) -> Timing {
        let Some(turn) = turn else {
            return Timing::Current;
        };
        let local = self.game.turn_number();
        if turn < local || (turn == local && self.game.active_team() == self.local_team) {
            Timing::Stale
        } else if turn > local {
            Timing::Early
        } else {
            Timing::Current
        }
    }

    fn drop_stale(&self, held: &Held) {
        tracing::warn!(
            turn = ?held.turn,
            local_turn = self.game.turn_number(),
            "Dropped remote action for a turn that already ended"
        );
    }

    fn defer(&mut self, held: Held) {
        if self.deferred.len() >= MAX_DEFERRED {
            tracing::warn!(held = self.deferred.len(), "Remote action queue full, dropping");
            return;
        }
        self.deferred.push_back(held);
    }

    fn retry_deferred(&mut self) {
        let remote = self.local_team.other();
        while let Some(held) = self.deferred.front() {
            match self.timing(held.turn) {
                Timing::Stale => self.drop_stale(held),
                Timing::Early => return,
                Timing::Current => match self.game.apply_action(remote, &held.action) {
                    Ok(()) => {},
                    Err(ActionError::NotYourTurn(_) | ActionError::WrongPhase) => return,
                    Err(e) => tracing::warn!(error = %e, "Dropped held remote action"),
                },
            }
            self.deferred.pop_front();
        }
    }

    fn check_turn(&mut self, started: Team) {
        if let Some(expected) = self.expected_turn.take()
            && expected != started
        {
            tracing::warn!(
                %expected,
                %started,
                "Turn order diverged from the relay"
            );
        }
    }

    fn seat_of(&self, id: PlayerId) -> Option<Team> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .map(Team::from_slot)
    }

    fn send(&self, msg: ClientMessage) {
        if self.outbox.send(msg).is_err() {
            tracing::debug!("Outbound channel closed");
        }
    }
}
