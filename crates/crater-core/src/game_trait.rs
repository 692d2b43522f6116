use std::fmt;

use serde::{Deserialize, Serialize};

use crate::player::{Controller, Player, Team};

/// Core trait for a two-team, turn-based simulation.
///
/// The game advances one fixed step per `update` call and never reads a
/// wall clock. Both peers of a networked match run their own instance from
/// the same [`MatchSetup`] and feed it the same actions in the same order.
pub trait TurnBasedGame: Send {
    /// Descriptive metadata.
    fn metadata(&self) -> GameMetadata;

    /// Reset to the opening position of a new match.
    fn init(&mut self, setup: &MatchSetup);

    /// Advance exactly one simulation step. Returns the events raised during it.
    fn update(&mut self) -> Vec<GameEvent>;

    /// Apply an action payload on behalf of `team`. Rejected actions leave
    /// the simulation untouched.
    fn apply_action(&mut self, team: Team, action: &serde_json::Value) -> Result<(), ActionError>;

    /// Serialize the full simulation state.
    fn serialize_state(&self) -> Vec<u8>;

    /// Replace the simulation state with a previously serialized one.
    fn apply_state(&mut self, state: &[u8]);

    /// Number of the turn in progress, counted from 1. Peers in lockstep
    /// agree on it, so it tags which turn an action belongs to.
    fn turn_number(&self) -> u32;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Whether the match has reached its terminal state.
    fn is_game_over(&self) -> bool;

    /// Winning team once the match is over. `None` while playing or on a draw.
    fn winner(&self) -> Option<Team>;

    /// The team whose turn it currently is.
    fn active_team(&self) -> Team;

    /// End the match immediately, e.g. when the peer disconnects.
    /// Has no effect if the match already ended.
    fn force_game_over(&mut self, outcome: MatchOutcome) -> Vec<GameEvent>;
}

/// Game metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub name: String,
    pub description: String,
    pub units_per_team: u8,
}

/// Everything both peers need to build an identical opening position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSetup {
    pub seed: u64,
    /// Seated players; index 0 plays team A, index 1 plays team B.
    pub players: Vec<Player>,
    pub first_team: Team,
    /// Controller per team, indexed by [`Team::index`].
    pub controllers: [Controller; 2],
}

impl MatchSetup {
    /// A single-machine match against the CPU: team A local, team B CPU.
    pub fn versus_cpu(seed: u64, difficulty: crate::player::Difficulty) -> Self {
        Self {
            seed,
            players: vec![
                Player {
                    id: 0,
                    name: "Player".to_string(),
                },
                Player {
                    id: 1,
                    name: "CPU".to_string(),
                },
            ],
            first_team: Team::A,
            controllers: [Controller::Local, Controller::Cpu(difficulty)],
        }
    }

    pub fn controller(&self, team: Team) -> Controller {
        self.controllers[team.index()]
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    /// A team has no living units left.
    TeamEliminated,
    /// The relay reported that the peer left the room.
    OpponentDisconnected,
    /// The connection to the relay itself was lost.
    ConnectionLost,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TeamEliminated => write!(f, "team eliminated"),
            Self::OpponentDisconnected => write!(f, "Opponent disconnected"),
            Self::ConnectionLost => write!(f, "connection lost"),
        }
    }
}

/// Terminal result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub winner: Option<Team>,
    pub reason: GameOverReason,
}

/// Events emitted by a game during update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    TurnStarted { team: Team, unit: usize, wind: f32 },
    TurnEnded { team: Team },
    ShotFired { team: Team, unit: usize, angle: f32, power: f32 },
    Detonation { x: f32, y: f32, radius: f32 },
    UnitDamaged { team: Team, unit: usize, amount: i32, health: i32 },
    UnitEliminated { team: Team, unit: usize },
    GameOver { winner: Option<Team>, reason: GameOverReason },
}

/// Reasons an action is refused at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The payload did not decode into a known action.
    Malformed(String),
    /// A numeric field was outside its accepted range.
    OutOfRange { field: &'static str, value: f32 },
    /// The acting team does not hold the turn.
    NotYourTurn(Team),
    /// The team is driven by the CPU and takes no outside input.
    CpuControlled(Team),
    /// The turn is not in a phase that accepts this action.
    WrongPhase,
    /// The active unit is missing, dead, or airborne.
    UnitNotReady,
    /// The match has ended.
    GameOver,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed action: {e}"),
            Self::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            },
            Self::NotYourTurn(team) => write!(f, "team {team} does not hold the turn"),
            Self::CpuControlled(team) => write!(f, "team {team} is CPU controlled"),
            Self::WrongPhase => write!(f, "action not accepted in the current phase"),
            Self::UnitNotReady => write!(f, "active unit cannot act"),
            Self::GameOver => write!(f, "match is over"),
        }
    }
}

impl std::error::Error for ActionError {}

/// Generates the `TurnBasedGame` methods that only touch the state blob and
/// the pause flag: `serialize_state`, `apply_state`, `pause`, `resume`,
/// `is_game_over`, `winner`.
///
/// Requires the implementing struct to have `state: $StateType` and
/// `paused: bool` fields, and `$StateType` to have an
/// `outcome: Option<MatchOutcome>` field.
#[macro_export]
macro_rules! crater_game_boilerplate {
    (state_type: $StateType:ty) => {
        fn serialize_state(&self) -> Vec<u8> {
            match rmp_serde::to_vec(&self.state) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize game state");
                    Vec::new()
                },
            }
        }

        fn apply_state(&mut self, state: &[u8]) {
            match rmp_serde::from_slice::<$StateType>(state) {
                Ok(s) => self.state = s,
                Err(e) => tracing::debug!(error = %e, "Ignored undecodable game state"),
            }
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn resume(&mut self) {
            self.paused = false;
        }

        fn is_game_over(&self) -> bool {
            self.state.outcome.is_some()
        }

        fn winner(&self) -> Option<$crate::player::Team> {
            self.state.outcome.and_then(|o| o.winner)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Difficulty;

    #[test]
    fn versus_cpu_setup_seats_cpu_on_team_b() {
        let setup = MatchSetup::versus_cpu(7, Difficulty::Hard);
        assert_eq!(setup.controller(Team::A), Controller::Local);
        assert_eq!(setup.controller(Team::B), Controller::Cpu(Difficulty::Hard));
        assert_eq!(setup.players.len(), 2);
    }

    #[test]
    fn action_error_messages() {
        let e = ActionError::OutOfRange {
            field: "power",
            value: 2.0,
        };
        assert_eq!(e.to_string(), "power out of range: 2");
        assert_eq!(
            ActionError::NotYourTurn(Team::B).to_string(),
            "team B does not hold the turn"
        );
    }

    #[test]
    fn disconnect_reason_text_matches_relay() {
        assert_eq!(
            GameOverReason::OpponentDisconnected.to_string(),
            "Opponent disconnected"
        );
    }
}
