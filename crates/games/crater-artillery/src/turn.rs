use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crater_core::game_trait::{ActionError, GameEvent, GameOverReason, MatchOutcome};
use crater_core::player::{Controller, Difficulty, Team};

use crate::action::{Action, faces_right};
use crate::ai::{self, AiDecision};
use crate::arena::Arena;
use crate::config::ArtilleryConfig;
use crate::worm::Worm;

/// Turn phases. `GameOver` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Waiting for input (or the CPU) from the active unit.
    Aiming,
    /// A shot is in the air or its aftermath has not settled.
    Shooting,
    /// The active unit is walking or jumping.
    Moving,
    /// Short pause before the next turn.
    Waiting,
    GameOver,
}

/// Input mode the active side last picked. Reset to `Attack` every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectedAction {
    #[default]
    Attack,
    Move,
    Jump,
}

/// CPU progress within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AiTurnState {
    pub think_steps: u32,
    pub decision: Option<AiDecision>,
    pub aim_steps: u32,
}

/// The two independent random streams of a match.
#[derive(Debug, Clone)]
pub struct MatchRng {
    /// Terrain, spawns and wind. Identical on both peers.
    pub world: StdRng,
    /// CPU decisions. Local only, so a CPU can never perturb lockstep.
    pub ai: StdRng,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    pub active: Team,
    /// Index of the unit each team plays next, by [`Team::index`].
    pub current: [usize; 2],
    pub phase: Phase,
    /// Steps left before an idle turn is skipped.
    pub timer: u32,
    pub wind: f32,
    /// Steps left in the `Waiting` phase.
    pub settle: u32,
    pub selected: SelectedAction,
    pub ai: AiTurnState,
    pub turn_number: u32,
}

/// Next living unit after `from`, wrapping around. `from` itself comes last.
pub fn next_alive(squad: &[Worm], from: usize) -> Option<usize> {
    let n = squad.len();
    (1..=n).map(|i| (from + i) % n).find(|&i| squad[i].alive)
}

/// First living unit at or after `from`, wrapping around.
fn first_alive_from(squad: &[Worm], from: usize) -> Option<usize> {
    let n = squad.len();
    (0..n).map(|i| (from + i) % n).find(|&i| squad[i].alive)
}

/// Game over iff a team has no living units. Both wiped out is a draw.
pub fn outcome(arena: &Arena) -> Option<MatchOutcome> {
    let a = arena.living(Team::A) > 0;
    let b = arena.living(Team::B) > 0;
    let winner = match (a, b) {
        (true, true) => return None,
        (true, false) => Some(Team::A),
        (false, true) => Some(Team::B),
        (false, false) => None,
    };
    Some(MatchOutcome {
        winner,
        reason: GameOverReason::TeamEliminated,
    })
}

impl TurnState {
    pub fn new(first: Team, wind: f32) -> Self {
        Self {
            active: first,
            current: [0, 0],
            phase: Phase::Aiming,
            timer: 0,
            wind,
            settle: 0,
            selected: SelectedAction::Attack,
            ai: AiTurnState::default(),
            turn_number: 0,
        }
    }

    pub fn active_unit(&self) -> usize {
        self.current[self.active.index()]
    }

    /// Move the finished team to its next living unit, hand the turn over,
    /// and make sure the incoming team's unit is alive.
    pub fn advance(&mut self, arena: &Arena) {
        let ended = self.active;
        if let Some(next) = next_alive(arena.squad(ended), self.current[ended.index()]) {
            self.current[ended.index()] = next;
        }
        self.active = ended.other();
        let incoming = self.active.index();
        if !arena.squad(self.active).get(self.current[incoming]).is_some_and(|w| w.alive)
            && let Some(idx) = first_alive_from(arena.squad(self.active), self.current[incoming])
        {
            self.current[incoming] = idx;
        }
    }

    /// Reset per-turn state and nudge the wind.
    pub fn begin(&mut self, config: &ArtilleryConfig, world: &mut StdRng) -> GameEvent {
        let turn = &config.turn;
        self.phase = Phase::Aiming;
        self.timer = turn.turn_steps();
        self.settle = 0;
        self.selected = SelectedAction::Attack;
        self.ai = AiTurnState::default();
        self.turn_number += 1;
        let delta = if turn.wind_delta > 0.0 {
            world.random_range(-turn.wind_delta..turn.wind_delta)
        } else {
            0.0
        };
        self.wind = (self.wind + delta).clamp(-turn.max_wind, turn.max_wind);
        tracing::debug!(
            turn = self.turn_number,
            team = %self.active,
            unit = self.active_unit(),
            wind = self.wind,
            "Turn started"
        );
        GameEvent::TurnStarted {
            team: self.active,
            unit: self.active_unit(),
            wind: self.wind,
        }
    }

    /// Close the current turn: either the match is decided or the other team
    /// gets the next turn.
    fn end(
        &mut self,
        arena: &Arena,
        config: &ArtilleryConfig,
        world: &mut StdRng,
    ) -> (Vec<GameEvent>, Option<MatchOutcome>) {
        if let Some(result) = outcome(arena) {
            self.phase = Phase::GameOver;
            tracing::info!(winner = ?result.winner, turns = self.turn_number, "Match decided");
            let event = GameEvent::GameOver {
                winner: result.winner,
                reason: result.reason,
            };
            return (vec![event], Some(result));
        }
        let ended = GameEvent::TurnEnded { team: self.active };
        self.advance(arena);
        let started = self.begin(config, world);
        (vec![ended, started], None)
    }

    fn wait(&mut self, steps: u32) {
        self.phase = Phase::Waiting;
        self.settle = steps.max(1);
    }

    /// Advance the turn machine by one step, after the arena has stepped.
    pub fn tick(
        &mut self,
        arena: &mut Arena,
        controllers: &[Controller; 2],
        config: &ArtilleryConfig,
        rng: &mut MatchRng,
    ) -> (Vec<GameEvent>, Option<MatchOutcome>) {
        match self.phase {
            Phase::Aiming => {
                let team = self.active;
                if !arena.unit(team, self.active_unit()).is_some_and(|w| w.alive) {
                    tracing::debug!(team = %team, "Active unit is dead, skipping turn");
                    return self.end(arena, config, &mut rng.world);
                }
                let mut events = Vec::new();
                if let Controller::Cpu(difficulty) = controllers[team.index()] {
                    match self.drive_cpu(arena, difficulty, config, &mut rng.ai) {
                        CpuStep::Skip => return self.end(arena, config, &mut rng.world),
                        CpuStep::Fired(event) => events.push(event),
                        CpuStep::Idle => {},
                    }
                }
                if self.phase == Phase::Aiming {
                    self.timer = self.timer.saturating_sub(1);
                    if self.timer == 0 {
                        tracing::debug!(team = %team, "Turn timer expired");
                        let (more, result) = self.end(arena, config, &mut rng.world);
                        events.extend(more);
                        return (events, result);
                    }
                }
                (events, None)
            },
            Phase::Shooting => {
                if arena.shot_settled() {
                    self.wait(config.turn.shot_settle_steps());
                }
                (Vec::new(), None)
            },
            Phase::Moving => {
                if arena
                    .unit(self.active, self.active_unit())
                    .is_none_or(Worm::is_settled)
                {
                    self.wait(config.turn.move_settle_steps());
                }
                (Vec::new(), None)
            },
            Phase::Waiting => {
                self.settle = self.settle.saturating_sub(1);
                if self.settle == 0 {
                    return self.end(arena, config, &mut rng.world);
                }
                (Vec::new(), None)
            },
            Phase::GameOver => (Vec::new(), None),
        }
    }

    /// One step of CPU control. The CPU waits for its unit to be grounded,
    /// thinks for the preset delay, decides once, then carries the decision
    /// out; shots are lined up gradually before firing.
    fn drive_cpu(
        &mut self,
        arena: &mut Arena,
        difficulty: Difficulty,
        config: &ArtilleryConfig,
        rng: &mut StdRng,
    ) -> CpuStep {
        let team = self.active;
        let unit = self.active_unit();
        let preset = *config.ai.preset(difficulty);
        let decision = match self.ai.decision {
            Some(decision) => decision,
            None => {
                let Some(worm) = arena.unit(team, unit).filter(|w| w.grounded) else {
                    return CpuStep::Idle;
                };
                self.ai.think_steps += 1;
                if self.ai.think_steps < preset.think_steps() {
                    return CpuStep::Idle;
                }
                let decision = ai::decide(
                    worm,
                    arena.squad(team.other()),
                    &arena.terrain,
                    self.wind,
                    &preset,
                    config,
                    rng,
                );
                tracing::debug!(team = %team, unit, ?decision, "CPU decided");
                self.ai.decision = Some(decision);
                decision
            },
        };

        let Some(worm) = arena.unit_mut(team, unit) else {
            return CpuStep::Skip;
        };
        match decision {
            AiDecision::Wait => CpuStep::Skip,
            AiDecision::Move { direction } => {
                worm.start_auto_move(direction, config.turn.auto_move_distance);
                self.selected = SelectedAction::Move;
                self.phase = Phase::Moving;
                CpuStep::Idle
            },
            AiDecision::Jump { direction } => {
                worm.jump(direction, &config.worm);
                self.selected = SelectedAction::Jump;
                self.phase = Phase::Moving;
                CpuStep::Idle
            },
            AiDecision::Shoot { angle, power } => {
                self.ai.aim_steps += 1;
                let diff = angle - worm.aim;
                if diff.abs() <= config.ai.aim_tolerance
                    || self.ai.aim_steps > config.ai.aim_budget_steps()
                {
                    match arena.fire(team, unit, power, config) {
                        Some(event) => {
                            self.phase = Phase::Shooting;
                            CpuStep::Fired(event)
                        },
                        None => CpuStep::Skip,
                    }
                } else {
                    worm.aim_by(diff.signum() * config.ai.aim_slew.min(diff.abs()));
                    worm.facing_right = faces_right(worm.aim);
                    CpuStep::Idle
                }
            },
        }
    }

    /// Apply a validated human or remote action for `team`.
    pub fn apply(
        &mut self,
        arena: &mut Arena,
        team: Team,
        action: Action,
        config: &ArtilleryConfig,
    ) -> Result<Vec<GameEvent>, ActionError> {
        if team != self.active {
            return Err(ActionError::NotYourTurn(team));
        }
        if self.phase != Phase::Aiming {
            return Err(ActionError::WrongPhase);
        }
        let unit = self.active_unit();
        let worm = arena
            .unit_mut(team, unit)
            .filter(|w| w.alive)
            .ok_or(ActionError::UnitNotReady)?;

        match action {
            Action::Move {
                direction,
                distance,
            } => {
                let distance = distance.unwrap_or(config.turn.auto_move_distance);
                worm.start_auto_move(direction as i8, distance);
                self.selected = SelectedAction::Move;
                self.phase = Phase::Moving;
                Ok(Vec::new())
            },
            Action::Jump { direction } => {
                if !worm.jump(direction as i8, &config.worm) {
                    return Err(ActionError::UnitNotReady);
                }
                self.selected = SelectedAction::Jump;
                self.phase = Phase::Moving;
                Ok(Vec::new())
            },
            Action::Aim {
                angle,
                facing_right,
            } => {
                worm.set_aim(angle);
                worm.facing_right = facing_right.unwrap_or_else(|| faces_right(angle));
                self.selected = SelectedAction::Attack;
                Ok(Vec::new())
            },
            Action::Shoot { angle, power } => {
                worm.set_aim(angle);
                worm.facing_right = faces_right(angle);
                self.selected = SelectedAction::Attack;
                let event = arena
                    .fire(team, unit, power, config)
                    .ok_or(ActionError::UnitNotReady)?;
                self.phase = Phase::Shooting;
                Ok(vec![event])
            },
        }
    }
}

enum CpuStep {
    Idle,
    Skip,
    Fired(GameEvent),
}
