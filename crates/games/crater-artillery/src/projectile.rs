use serde::{Deserialize, Serialize};

use crater_core::player::Team;

use crate::config::{ProjectileConfig, WormConfig};
use crate::terrain::Terrain;
use crate::worm::Worm;

/// Point mass under gravity and wind. Shared by live shells and the AI's
/// landing predictor so both integrate identically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ballistic {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl Ballistic {
    /// Spawn at the muzzle in front of `center` travelling along `angle`.
    pub fn launch(center: (f32, f32), angle: f32, power: f32, config: &ProjectileConfig) -> Self {
        let (sin, cos) = angle.sin_cos();
        let speed = power * config.launch_speed;
        Self {
            x: center.0 + cos * config.muzzle_offset,
            y: center.1 + sin * config.muzzle_offset,
            vx: cos * speed,
            vy: sin * speed,
        }
    }

    /// One semi-implicit Euler step: velocity first, then position.
    pub fn advance(&mut self, wind: f32, config: &ProjectileConfig) {
        self.vx += wind * config.wind_coupling;
        self.vy += config.gravity;
        self.x += self.vx;
        self.y += self.vy;
    }
}

/// What a shell did this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileStatus {
    Flying,
    /// Fuse ran out, a unit was struck, or the shell bounced its last.
    Detonate,
    /// Left the field; removed without exploding.
    Gone,
}

/// A live shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub body: Ballistic,
    /// Remaining steps before forced detonation.
    pub fuse: i32,
    pub bounces: u32,
    /// Shooter, for attribution only.
    pub team: Team,
    pub unit: usize,
}

impl Projectile {
    pub fn new(body: Ballistic, team: Team, unit: usize, config: &ProjectileConfig) -> Self {
        Self {
            body,
            fuse: config.fuse_steps as i32,
            bounces: 0,
            team,
            unit,
        }
    }

    /// Advance one step and report whether the shell should explode.
    pub fn step(
        &mut self,
        wind: f32,
        terrain: &Terrain,
        squads: &[Vec<Worm>; 2],
        config: &ProjectileConfig,
        worm_config: &WormConfig,
    ) -> ProjectileStatus {
        self.body.advance(wind, config);

        if terrain.is_solid(self.body.x, self.body.y) && self.bounces < config.max_bounces {
            self.bounce(terrain, config);
        }

        self.fuse -= 1;

        let Ballistic { x, y, .. } = self.body;
        let margin = config.bounds_margin;
        if x < -margin || x > terrain.width() as f32 + margin || y > terrain.height() as f32 + margin
        {
            return ProjectileStatus::Gone;
        }

        if self.fuse <= 0 || self.hits_unit(squads, config, worm_config) {
            ProjectileStatus::Detonate
        } else {
            ProjectileStatus::Flying
        }
    }

    /// Reflect off whichever face the side probes say was struck.
    fn bounce(&mut self, terrain: &Terrain, config: &ProjectileConfig) {
        let b = &mut self.body;
        let d = config.probe_distance;
        let left = terrain.is_solid(b.x - d, b.y);
        let right = terrain.is_solid(b.x + d, b.y);
        let up = terrain.is_solid(b.x, b.y - d);
        let down = terrain.is_solid(b.x, b.y + d);

        if down && !up {
            b.vy = -b.vy.abs() * config.restitution;
            b.vx *= config.friction;
            b.y -= config.bounce_lift;
        } else if up && !down {
            b.vy = b.vy.abs() * config.restitution;
        } else if left && !right {
            b.vx = b.vx.abs() * config.restitution;
        } else if right && !left {
            b.vx = -b.vx.abs() * config.restitution;
        } else {
            // Embedded.
            self.fuse = 0;
        }

        self.bounces += 1;
        if self.bounces >= config.max_bounces {
            self.fuse = 0;
        }

        if b.vx.abs() < config.rest_speed && b.vy.abs() < config.rest_speed {
            b.vx = 0.0;
            b.vy = 0.0;
        }
    }

    fn hits_unit(
        &self,
        squads: &[Vec<Worm>; 2],
        config: &ProjectileConfig,
        worm_config: &WormConfig,
    ) -> bool {
        let reach = config.radius + config.hit_padding;
        squads.iter().flatten().filter(|w| w.alive).any(|w| {
            let (cx, cy) = w.center(worm_config);
            let (dx, dy) = (self.body.x - cx, self.body.y - cy);
            (dx * dx + dy * dy).sqrt() < reach
        })
    }
}
