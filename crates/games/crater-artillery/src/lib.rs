pub mod action;
pub mod ai;
pub mod arena;
pub mod config;
pub mod explosion;
pub mod projectile;
pub mod sync;
pub mod terrain;
pub mod turn;
pub mod worm;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crater_core::crater_game_boilerplate;
use crater_core::game_trait::{
    ActionError, GameEvent, GameMetadata, MatchOutcome, MatchSetup, TurnBasedGame,
};
use crater_core::player::{Controller, Team};

use action::Action;
use arena::Arena;
use config::ArtilleryConfig;
use terrain::Terrain;
use turn::{MatchRng, Phase, TurnState};

/// Mixed into the match seed for the CPU's private random stream.
const AI_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Serializable simulation state. Identical on both peers of a match that
/// has seen the same actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtilleryState {
    pub arena: Arena,
    pub turn: TurnState,
    pub outcome: Option<MatchOutcome>,
    /// Simulation steps since the match began.
    pub step: u64,
}

/// Turn-based artillery on destructible terrain.
pub struct Artillery {
    state: ArtilleryState,
    config: ArtilleryConfig,
    controllers: [Controller; 2],
    rng: MatchRng,
    paused: bool,
    /// Events raised outside `update` (init, accepted actions), handed out by
    /// the next `update`.
    pending: Vec<GameEvent>,
}

impl Artillery {
    pub fn new() -> Self {
        Self::with_config(ArtilleryConfig::load())
    }

    pub fn with_config(config: ArtilleryConfig) -> Self {
        let terrain = Terrain::empty(config.terrain.width, config.terrain.height);
        Self {
            state: ArtilleryState {
                arena: Arena::new(terrain),
                turn: TurnState::new(Team::A, 0.0),
                outcome: None,
                step: 0,
            },
            config,
            controllers: [Controller::Local, Controller::Local],
            rng: MatchRng {
                world: StdRng::seed_from_u64(0),
                ai: StdRng::seed_from_u64(AI_SEED_SALT),
            },
            paused: false,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> &ArtilleryState {
        &self.state
    }

    pub fn config(&self) -> &ArtilleryConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.turn.phase
    }

    pub fn wind(&self) -> f32 {
        self.state.turn.wind
    }

    /// SHA-256 of the serialized state, hex encoded. Two peers in lockstep
    /// report the same digest after the same step.
    pub fn state_digest(&self) -> String {
        hex::encode(Sha256::digest(self.serialize_state()))
    }
}

impl Default for Artillery {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnBasedGame for Artillery {
    fn metadata(&self) -> GameMetadata {
        GameMetadata {
            name: "Crater Artillery".to_string(),
            description: "Take turns lobbing shells across destructible hills. Last squad standing wins."
                .to_string(),
            units_per_team: self.config.spawn.units_per_team.min(u8::MAX as usize) as u8,
        }
    }

    fn init(&mut self, setup: &MatchSetup) {
        self.rng = MatchRng {
            world: StdRng::seed_from_u64(setup.seed),
            ai: StdRng::seed_from_u64(setup.seed ^ AI_SEED_SALT),
        };
        self.controllers = setup.controllers;
        self.paused = false;

        let arena = Arena::generate(&mut self.rng.world, &self.config);
        let max_wind = self.config.turn.max_wind;
        let wind = if max_wind > 0.0 {
            self.rng.world.random_range(-max_wind..max_wind)
        } else {
            0.0
        };
        let mut turn = TurnState::new(setup.first_team, wind);
        let started = turn.begin(&self.config, &mut self.rng.world);

        self.state = ArtilleryState {
            arena,
            turn,
            outcome: None,
            step: 0,
        };
        self.pending = vec![started];
        tracing::info!(
            seed = setup.seed,
            first = %setup.first_team,
            a = ?self.controllers[0],
            b = ?self.controllers[1],
            "Match initialized"
        );
    }

    fn update(&mut self) -> Vec<GameEvent> {
        if self.paused || self.state.outcome.is_some() {
            return Vec::new();
        }
        let mut events = std::mem::take(&mut self.pending);
        let state = &mut self.state;

        events.extend(state.arena.step(state.turn.wind, &self.config));
        let (turn_events, result) =
            state
                .turn
                .tick(&mut state.arena, &self.controllers, &self.config, &mut self.rng);
        events.extend(turn_events);
        if result.is_some() {
            state.outcome = result;
        }
        state.step += 1;
        events
    }

    fn apply_action(&mut self, team: Team, action: &serde_json::Value) -> Result<(), ActionError> {
        if self.state.outcome.is_some() {
            return Err(ActionError::GameOver);
        }
        if let Controller::Cpu(_) = self.controllers[team.index()] {
            return Err(ActionError::CpuControlled(team));
        }
        let result = Action::parse(action, &self.config.turn).and_then(|action| {
            self.state
                .turn
                .apply(&mut self.state.arena, team, action, &self.config)
        });
        match result {
            Ok(events) => {
                tracing::debug!(team = %team, %action, "Action applied");
                self.pending.extend(events);
                Ok(())
            },
            Err(e) => {
                tracing::debug!(team = %team, error = %e, "Action rejected");
                Err(e)
            },
        }
    }

    crater_game_boilerplate!(state_type: ArtilleryState);

    fn active_team(&self) -> Team {
        self.state.turn.active
    }

    fn turn_number(&self) -> u32 {
        self.state.turn.turn_number
    }

    fn force_game_over(&mut self, outcome: MatchOutcome) -> Vec<GameEvent> {
        if self.state.outcome.is_some() {
            return Vec::new();
        }
        tracing::info!(winner = ?outcome.winner, reason = %outcome.reason, "Match ended early");
        self.state.outcome = Some(outcome);
        self.state.turn.phase = Phase::GameOver;
        self.pending.clear();
        vec![GameEvent::GameOver {
            winner: outcome.winner,
            reason: outcome.reason,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crater_core::game_trait::GameOverReason;
    use crater_core::player::Difficulty;
    use crater_core::test_helpers::{self, cpu_setup, local_setup, run_steps};
    use serde_json::json;

    fn game() -> Artillery {
        Artillery::with_config(ArtilleryConfig::default())
    }

    fn started(seed: u64) -> Artillery {
        let mut g = game();
        g.init(&local_setup(seed));
        g
    }

    // ================================================================
    // Trait contract
    // ================================================================

    #[test]
    fn contract_init_creates_state() {
        test_helpers::contract_init_creates_state(&mut game());
    }

    #[test]
    fn contract_update_advances_state() {
        test_helpers::contract_update_advances_state(&mut game());
    }

    #[test]
    fn contract_state_roundtrip_preserves() {
        let mut g = started(5);
        run_steps(&mut g, 120);
        test_helpers::contract_state_roundtrip_preserves(&mut g);
    }

    #[test]
    fn contract_pause_stops_updates() {
        test_helpers::contract_pause_stops_updates(&mut started(5));
    }

    #[test]
    fn contract_malformed_action_rejected() {
        test_helpers::contract_malformed_action_rejected(&mut started(5));
    }

    #[test]
    fn contract_out_of_turn_action_rejected() {
        let action = json!({"type": "aim", "angle": -1.0});
        test_helpers::contract_out_of_turn_action_rejected(&mut started(5), &action);
    }

    #[test]
    fn contract_force_game_over_is_terminal() {
        test_helpers::contract_force_game_over_is_terminal(&mut started(5));
    }

    #[test]
    fn contract_cpu_turns_alternate() {
        test_helpers::contract_cpu_turns_alternate(&mut game(), 17, 2500);
    }

    // ================================================================
    // Match flow
    // ================================================================

    #[test]
    fn first_update_reports_turn_start() {
        let mut g = started(8);
        let events = g.update();
        assert!(matches!(
            events.first(),
            Some(GameEvent::TurnStarted { team: Team::A, unit: 0, .. })
        ));
        assert!(g.wind().abs() <= 5.0);
        assert_eq!(g.turn_number(), 1);
    }

    #[test]
    fn accepted_shot_is_reported_on_next_update() {
        let mut g = started(8);
        g.update();
        g.apply_action(Team::A, &json!({"type": "shoot", "angle": -1.0, "power": 0.6}))
            .unwrap();
        assert_eq!(g.phase(), Phase::Shooting);
        let events = g.update();
        assert!(events.iter().any(|e| matches!(e, GameEvent::ShotFired { team: Team::A, .. })));
        assert_eq!(g.state().arena.projectiles.len(), 1);
    }

    #[test]
    fn cpu_team_takes_no_outside_input() {
        let mut g = game();
        g.init(&cpu_setup(3, Difficulty::Easy));
        assert_eq!(
            g.apply_action(Team::A, &json!({"type": "aim", "angle": -1.0})),
            Err(ActionError::CpuControlled(Team::A))
        );
    }

    #[test]
    fn finished_match_rejects_actions() {
        let mut g = started(8);
        g.force_game_over(MatchOutcome {
            winner: Some(Team::A),
            reason: GameOverReason::OpponentDisconnected,
        });
        assert_eq!(
            g.apply_action(Team::A, &json!({"type": "aim", "angle": -1.0})),
            Err(ActionError::GameOver)
        );
    }

    #[test]
    fn last_survivor_dying_hands_team_b_the_win() {
        let mut g = started(21);
        let config = g.config.clone();
        let state = &mut g.state;
        for w in state.arena.squads[0].iter_mut().skip(1) {
            w.take_damage(1000);
        }
        let survivor = &mut state.arena.squads[0][0];
        survivor.health = 1;
        let (x, y) = (survivor.x, survivor.y);
        state.arena.detonate(x, y, &config);
        state.turn.phase = Phase::Shooting;
        assert_eq!(state.arena.living(Team::A), 0);

        let mut over = None;
        for _ in 0..600 {
            for e in g.update() {
                if let GameEvent::GameOver { winner, reason } = e {
                    over = Some((winner, reason));
                }
            }
            if over.is_some() {
                break;
            }
        }
        assert_eq!(over, Some((Some(Team::B), GameOverReason::TeamEliminated)));
        assert!(g.is_game_over());
        assert_eq!(g.winner(), Some(Team::B));
        assert!(g.update().is_empty());
    }

    #[test]
    fn same_seed_same_digest() {
        let run = |seed| {
            let mut g = game();
            g.init(&cpu_setup(seed, Difficulty::Medium));
            run_steps(&mut g, 900);
            g.state_digest()
        };
        assert_eq!(run(12), run(12));
        assert_ne!(run(12), run(13));
    }

    #[test]
    fn apply_state_restores_snapshot() {
        let mut g = started(4);
        run_steps(&mut g, 30);
        let snapshot = g.serialize_state();
        let digest = g.state_digest();
        g.apply_action(Team::A, &json!({"type": "move", "direction": 1}))
            .unwrap();
        run_steps(&mut g, 30);
        assert_ne!(digest, g.state_digest());
        g.apply_state(&snapshot);
        assert_eq!(digest, g.state_digest());
    }

    #[test]
    fn garbage_snapshot_is_ignored() {
        let mut g = started(4);
        let digest = g.state_digest();
        g.apply_state(&[0xc1, 0x00, 0xff]);
        assert_eq!(digest, g.state_digest());
    }
}
