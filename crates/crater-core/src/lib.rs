pub mod game_trait;
pub mod net;
pub mod player;
pub mod room;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::game_trait::{GameEvent, GameOverReason, MatchOutcome, MatchSetup, TurnBasedGame};
    use crate::player::{Controller, Difficulty, Player, Team};

    /// Create `n` test players with sequential IDs starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                id: i as u64 + 1,
                name: format!("Player{}", i + 1),
            })
            .collect()
    }

    /// A setup where both teams are driven through `apply_action`.
    pub fn local_setup(seed: u64) -> MatchSetup {
        MatchSetup {
            seed,
            players: make_players(2),
            first_team: Team::A,
            controllers: [Controller::Local, Controller::Local],
        }
    }

    /// A setup where the CPU plays both sides.
    pub fn cpu_setup(seed: u64, difficulty: Difficulty) -> MatchSetup {
        MatchSetup {
            seed,
            players: make_players(2),
            first_team: Team::A,
            controllers: [Controller::Cpu(difficulty), Controller::Cpu(difficulty)],
        }
    }

    /// Run `n` steps, returning all accumulated events.
    pub fn run_steps(game: &mut dyn TurnBasedGame, n: usize) -> Vec<GameEvent> {
        let mut all_events = Vec::new();
        for _ in 0..n {
            all_events.extend(game.update());
        }
        all_events
    }

    // ================================================================
    // Game Trait Contract Tests
    // ================================================================
    // Every TurnBasedGame implementation must pass these. Game crates call
    // them from their own #[cfg(test)] modules with a concrete instance.

    /// After init(), serialize_state() must return non-empty bytes.
    pub fn contract_init_creates_state(game: &mut dyn TurnBasedGame) {
        game.init(&local_setup(42));
        assert!(
            !game.serialize_state().is_empty(),
            "serialize_state() must return non-empty bytes after init"
        );
        assert!(!game.is_game_over(), "a fresh match must not be over");
    }

    /// update() must advance the state (at least the turn timer).
    pub fn contract_update_advances_state(game: &mut dyn TurnBasedGame) {
        game.init(&local_setup(42));
        let before = game.serialize_state();
        game.update();
        assert_ne!(before, game.serialize_state(), "update() must advance state");
    }

    /// serialize → apply → serialize must be stable.
    pub fn contract_state_roundtrip_preserves(game: &mut dyn TurnBasedGame) {
        let state_a = game.serialize_state();
        game.apply_state(&state_a);
        let state_b = game.serialize_state();
        assert_eq!(state_a, state_b, "state must survive a serialize/apply roundtrip");
    }

    /// pause() must freeze the simulation, resume() must unfreeze it.
    pub fn contract_pause_stops_updates(game: &mut dyn TurnBasedGame) {
        game.pause();
        let before = game.serialize_state();
        let events = game.update();
        assert!(events.is_empty(), "no events while paused");
        assert_eq!(before, game.serialize_state(), "state must not change while paused");

        game.resume();
        game.update();
        assert_ne!(before, game.serialize_state(), "state must change after resume");
    }

    /// Garbage payloads must be refused without touching the state.
    pub fn contract_malformed_action_rejected(game: &mut dyn TurnBasedGame) {
        let team = game.active_team();
        let before = game.serialize_state();
        for payload in [
            serde_json::json!(null),
            serde_json::json!({"type": "teleport"}),
            serde_json::json!({"type": "shoot"}),
            serde_json::json!({"type": "move", "direction": "sideways"}),
        ] {
            assert!(
                game.apply_action(team, &payload).is_err(),
                "payload {payload} must be rejected"
            );
        }
        assert_eq!(before, game.serialize_state(), "rejected actions must not mutate state");
    }

    /// A valid action from the team that does not hold the turn is refused.
    pub fn contract_out_of_turn_action_rejected(
        game: &mut dyn TurnBasedGame,
        valid_action: &serde_json::Value,
    ) {
        let idle = game.active_team().other();
        let before = game.serialize_state();
        assert!(game.apply_action(idle, valid_action).is_err());
        assert_eq!(before, game.serialize_state());
    }

    /// force_game_over() ends the match and later updates do nothing.
    pub fn contract_force_game_over_is_terminal(game: &mut dyn TurnBasedGame) {
        let events = game.force_game_over(MatchOutcome {
            winner: Some(Team::B),
            reason: GameOverReason::OpponentDisconnected,
        });
        assert!(
            events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })),
            "force_game_over must emit GameOver"
        );
        assert!(game.is_game_over());
        assert_eq!(game.winner(), Some(Team::B));

        let frozen = game.serialize_state();
        assert!(game.update().is_empty());
        assert_eq!(frozen, game.serialize_state());
        assert!(
            game.force_game_over(MatchOutcome {
                winner: Some(Team::A),
                reason: GameOverReason::ConnectionLost,
            })
            .is_empty(),
            "a second force_game_over is ignored"
        );
        assert_eq!(game.winner(), Some(Team::B));
    }

    /// In a CPU-vs-CPU match both teams must get a turn within `max_steps`.
    pub fn contract_cpu_turns_alternate(game: &mut dyn TurnBasedGame, seed: u64, max_steps: usize) {
        game.init(&cpu_setup(seed, Difficulty::Hard));
        let opening = game.active_team();
        for _ in 0..max_steps {
            game.update();
            if game.active_team() != opening || game.is_game_over() {
                return;
            }
        }
        panic!("CPU turn with seed {seed} did not hand over within {max_steps} steps");
    }
}
