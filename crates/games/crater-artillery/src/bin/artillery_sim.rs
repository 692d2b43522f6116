use tracing_subscriber::EnvFilter;

use crater_artillery::Artillery;
use crater_core::game_trait::{GameEvent, MatchSetup, TurnBasedGame};
use crater_core::player::{Controller, Difficulty, Player, Team};

fn arg<T: std::str::FromStr>(prefix: &str) -> Option<T> {
    std::env::args()
        .skip(1)
        .find_map(|a| a.strip_prefix(prefix).map(String::from))
        .and_then(|v| v.parse::<T>().ok())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let seed = arg::<u64>("--seed=").unwrap_or(1);
    let difficulty = arg::<Difficulty>("--difficulty=").unwrap_or_default();
    let max_steps = arg::<u64>("--max-steps=").unwrap_or(200_000);

    let mut game = Artillery::new();
    game.init(&MatchSetup {
        seed,
        players: vec![
            Player {
                id: 1,
                name: "West".to_string(),
            },
            Player {
                id: 2,
                name: "East".to_string(),
            },
        ],
        first_team: Team::A,
        controllers: [Controller::Cpu(difficulty); 2],
    });
    tracing::info!(seed, ?difficulty, max_steps, "Simulating CPU vs CPU");

    for _ in 0..max_steps {
        for event in game.update() {
            match event {
                GameEvent::TurnStarted { team, unit, wind } => {
                    tracing::info!(%team, unit, wind, "Turn started");
                },
                GameEvent::ShotFired {
                    team,
                    unit,
                    angle,
                    power,
                } => tracing::info!(%team, unit, angle, power, "Shot fired"),
                GameEvent::UnitDamaged {
                    team,
                    unit,
                    amount,
                    health,
                } => tracing::info!(%team, unit, amount, health, "Unit damaged"),
                GameEvent::UnitEliminated { team, unit } => {
                    tracing::info!(%team, unit, "Unit eliminated");
                },
                GameEvent::GameOver { winner, reason } => {
                    tracing::info!(?winner, %reason, "Game over");
                },
                other => tracing::debug!(event = ?other),
            }
        }
        if game.is_game_over() {
            break;
        }
    }

    let state = game.state();
    tracing::info!(
        steps = state.step,
        turns = state.turn.turn_number,
        a_alive = state.arena.living(Team::A),
        b_alive = state.arena.living(Team::B),
        digest = %game.state_digest(),
        "Simulation finished"
    );
}
