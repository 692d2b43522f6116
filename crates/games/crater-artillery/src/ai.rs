//! CPU opponent: target choice, line-of-sight check, shot search against a
//! terrain-free ballistic predictor, and difficulty-scaled error.

use std::f32::consts::{FRAC_PI_4, PI};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{AiConfig, AiPreset, ArtilleryConfig};
use crate::projectile::Ballistic;
use crate::terrain::Terrain;
use crate::worm::Worm;

/// What the CPU wants its active unit to do this turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AiDecision {
    Move { direction: i8 },
    Jump { direction: i8 },
    Shoot { angle: f32, power: f32 },
    /// Nothing to shoot at; skip the turn.
    Wait,
}

/// Result of the shot search, before error injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotPlan {
    pub angle: f32,
    pub power: f32,
    /// Weighted landing error of the chosen shot.
    pub error: f32,
    /// Best error of the coarse sweep alone.
    pub coarse_error: f32,
    /// Whether the power/angle refinement ran.
    pub refined: bool,
}

/// Pick the living target with the highest score. Ties keep the earlier unit.
pub fn choose_target<'a>(
    shooter: &Worm,
    targets: &'a [Worm],
    config: &AiConfig,
) -> Option<&'a Worm> {
    let mut best: Option<(&Worm, f32)> = None;
    for target in targets.iter().filter(|t| t.alive) {
        let d = ((target.x - shooter.x).powi(2) + (target.y - shooter.y).powi(2)).sqrt();
        let score = (config.distance_bias - d)
            + (config.health_bias - target.health as f32) * config.health_weight;
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((target, score));
        }
    }
    best.map(|(t, _)| t)
}

/// Sample the straight line between the two units at head height.
pub fn is_path_blocked(
    shooter: &Worm,
    target: &Worm,
    terrain: &Terrain,
    config: &AiConfig,
) -> bool {
    let n = config.sight_segments.max(1);
    let dx = (target.x - shooter.x) / n as f32;
    let dy = (target.y - shooter.y) / n as f32;
    (1..n).any(|i| {
        let i = i as f32;
        terrain.is_solid(shooter.x + dx * i, shooter.y - config.sight_height + dy * i)
    })
}

/// Where a shell fired from `shooter` would come down, ignoring terrain.
pub fn predict_landing(
    shooter: &Worm,
    angle: f32,
    power: f32,
    wind: f32,
    config: &ArtilleryConfig,
) -> (f32, f32) {
    let start = shooter.center(&config.worm);
    let mut body = Ballistic::launch(start, angle, power, &config.projectile);
    for _ in 0..config.ai.horizon {
        body.advance(wind, &config.projectile);
        if body.vy > 0.0 && body.y > start.1 + config.ai.drop_below {
            break;
        }
    }
    (body.x, body.y)
}

fn landing_error(landing: (f32, f32), target: &Worm, config: &AiConfig) -> f32 {
    (landing.0 - target.x).abs() + (landing.1 - target.y).abs() * config.vertical_weight
}

/// Number of samples from `start` stepping by `step` without passing `end`.
fn sweep_len(start: f32, end: f32, step: f32) -> u32 {
    if step <= 0.0 || end < start {
        return 0;
    }
    // The epsilon keeps an exact endpoint from being lost to rounding.
    ((end - start) / step + 1e-4).floor() as u32 + 1
}

/// Coarse angle sweep at a distance-derived power, refined over power and
/// angle when the best landing is still far off.
pub fn plan_shot(shooter: &Worm, target: &Worm, wind: f32, config: &ArtilleryConfig) -> ShotPlan {
    let ai = &config.ai;
    let d = ((target.x - shooter.x).powi(2) + (target.y - shooter.y).powi(2)).sqrt();
    let mut power = (d / ai.power_distance_scale).clamp(ai.sweep_min_power, 1.0);
    let mut angle = -FRAC_PI_4;
    let mut error = f32::INFINITY;

    let coarse = sweep_len(ai.coarse_margin, PI - ai.coarse_margin, ai.coarse_step);
    for k in 0..coarse {
        let candidate = -ai.coarse_margin - k as f32 * ai.coarse_step;
        let e = landing_error(predict_landing(shooter, candidate, power, wind, config), target, ai);
        if e < error {
            error = e;
            angle = candidate;
        }
    }
    let coarse_error = error;

    let refined = error > ai.refine_threshold;
    if refined {
        let powers = sweep_len(ai.refine_power_min, 1.0, ai.refine_power_step);
        let angles = sweep_len(ai.refine_margin, PI - ai.refine_margin, ai.refine_angle_step);
        for p in 0..powers {
            let candidate_power = ai.refine_power_min + p as f32 * ai.refine_power_step;
            for a in 0..angles {
                let candidate = -ai.refine_margin - a as f32 * ai.refine_angle_step;
                let landing = predict_landing(shooter, candidate, candidate_power, wind, config);
                let e = landing_error(landing, target, ai);
                if e < error {
                    error = e;
                    angle = candidate;
                    power = candidate_power;
                }
            }
        }
    }

    ShotPlan {
        angle,
        power,
        error,
        coarse_error,
        refined,
    }
}

/// Make this turn's decision for `shooter` against the living `targets`.
pub fn decide<R: Rng + ?Sized>(
    shooter: &Worm,
    targets: &[Worm],
    terrain: &Terrain,
    wind: f32,
    preset: &AiPreset,
    config: &ArtilleryConfig,
    rng: &mut R,
) -> AiDecision {
    let ai = &config.ai;
    let Some(target) = choose_target(shooter, targets, ai) else {
        return AiDecision::Wait;
    };
    let dx = target.x - shooter.x;
    let dist = (dx * dx + (target.y - shooter.y).powi(2)).sqrt();
    let toward: i8 = if dx >= 0.0 { 1 } else { -1 };

    if preset.checks_blocked
        && dist < ai.reposition_range
        && is_path_blocked(shooter, target, terrain, ai)
    {
        let away = if shooter.x < terrain.width() as f32 / 2.0 { -1 } else { 1 };
        return AiDecision::Move { direction: away };
    }

    let roll = rng.random::<f32>();
    if roll < preset.move_chance {
        let direction = if dist > ai.far_range {
            toward
        } else if rng.random_bool(0.5) {
            1
        } else {
            -1
        };
        return AiDecision::Move { direction };
    }
    if roll < preset.move_chance * ai.jump_chance_factor {
        return AiDecision::Jump { direction: toward };
    }

    let plan = plan_shot(shooter, target, wind, config);
    let aim_error = (rng.random::<f32>() - 0.5) * 2.0 * preset.aim_error;
    let power_error = 1.0 + (rng.random::<f32>() - 0.5) * 2.0 * preset.power_error;
    AiDecision::Shoot {
        angle: (plan.angle + aim_error).clamp(-PI, 0.0),
        power: (plan.power * power_error).clamp(ai.min_power, 1.0),
    }
}
