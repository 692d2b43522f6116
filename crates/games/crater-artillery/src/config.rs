use serde::{Deserialize, Serialize};

use crater_core::player::Difficulty;
use crater_core::time::{DEFAULT_STEP_HZ, secs_to_steps};

/// Data-driven configuration for the artillery game. Every rate is expressed
/// per simulation step at [`DEFAULT_STEP_HZ`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArtilleryConfig {
    pub terrain: TerrainConfig,
    pub worm: WormConfig,
    pub projectile: ProjectileConfig,
    pub explosion: ExplosionConfig,
    pub turn: TurnConfig,
    pub spawn: SpawnConfig,
    pub ai: AiConfig,
}

impl ArtilleryConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CRATER_ARTILLERY_CONFIG")
            && let Some(config) = Self::read(&path)
        {
            return config;
        }
        Self::read("config/artillery.toml").unwrap_or_default()
    }

    fn read(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let parsed = toml::from_str::<Self>(&contents)
            .map_err(|e| e.to_string())
            .and_then(|config| config.validate().map(|()| config));
        match parsed {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path, error = %e, "Invalid artillery config, using defaults");
                None
            },
        }
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.terrain.width == 0 || self.terrain.height == 0 {
            return Err("terrain must have a non-zero size".to_string());
        }
        if (self.terrain.width as f32) < self.worm.width {
            return Err(format!(
                "terrain width {} is narrower than a unit ({})",
                self.terrain.width, self.worm.width
            ));
        }
        if self.turn.max_wind.is_nan() || self.turn.max_wind < 0.0 {
            return Err(format!("max_wind must be non-negative, got {}", self.turn.max_wind));
        }
        for (field, value) in [
            ("ai.sweep_min_power", self.ai.sweep_min_power),
            ("ai.min_power", self.ai.min_power),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{field} must be within 0..=1, got {value}"));
            }
        }
        Ok(())
    }
}

/// One sine component of the surface profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Radians per surface segment.
    pub frequency: f32,
    /// Peak offset in pixels.
    pub amplitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub width: u32,
    pub height: u32,
    /// Resting surface height as a fraction of the field height.
    pub base_height_ratio: f32,
    /// Number of straight segments the surface polyline is built from.
    pub segments: u32,
    pub waves: Vec<Wave>,
    /// Draw a random phase per wave from the match seed. When false the
    /// profile is identical for every seed.
    pub randomize_phases: bool,
    /// Cosmetic darker patches handed to renderers.
    pub decor_patches: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 600,
            base_height_ratio: 0.6,
            segments: 50,
            waves: vec![
                Wave {
                    frequency: 0.3,
                    amplitude: 50.0,
                },
                Wave {
                    frequency: 0.7,
                    amplitude: 30.0,
                },
                Wave {
                    frequency: 0.1,
                    amplitude: 40.0,
                },
            ],
            randomize_phases: true,
            decor_patches: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WormConfig {
    pub width: f32,
    pub height: f32,
    pub max_health: i32,
    pub gravity: f32,
    pub terminal_velocity: f32,
    pub move_speed: f32,
    /// Highest ledge a walking unit climbs without jumping.
    pub max_step: u32,
    pub jump_speed_x: f32,
    pub jump_speed_y: f32,
    pub ground_friction: f32,
    /// Horizontal speed below which a grounded unit stops sliding.
    pub slide_cutoff: f32,
    pub fall_damage_threshold: f32,
    pub fall_damage_per_px: f32,
    /// Height of the body center above the feet.
    pub body_center: f32,
    /// Height above the feet probed for walls while sliding.
    pub wall_probe: f32,
    /// Inset of the two outer foot samples from the body edge.
    pub foot_inset: f32,
}

impl Default for WormConfig {
    fn default() -> Self {
        Self {
            width: 20.0,
            height: 20.0,
            max_health: 100,
            gravity: 0.5,
            terminal_velocity: 15.0,
            move_speed: 2.0,
            max_step: 10,
            jump_speed_x: 5.0,
            jump_speed_y: 8.0,
            ground_friction: 0.8,
            slide_cutoff: 0.1,
            fall_damage_threshold: 50.0,
            fall_damage_per_px: 0.3,
            body_center: 12.0,
            wall_probe: 10.0,
            foot_inset: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub radius: f32,
    pub gravity: f32,
    /// Fraction of the wind scalar added to horizontal velocity each step.
    pub wind_coupling: f32,
    /// Launch speed at full power.
    pub launch_speed: f32,
    /// Distance from the shooter's body center to the spawn point.
    pub muzzle_offset: f32,
    pub explosion_radius: f32,
    pub damage: i32,
    pub fuse_steps: u32,
    pub restitution: f32,
    pub friction: f32,
    pub max_bounces: u32,
    /// Offset of the four side probes used to find the struck face.
    pub probe_distance: f32,
    /// Per-axis speed under which a bouncing shell comes to rest.
    pub rest_speed: f32,
    /// Lift applied after landing on a floor so the shell clears it.
    pub bounce_lift: f32,
    /// Added to `radius` to get the direct-hit distance to a body center.
    pub hit_padding: f32,
    /// How far outside the left, right, and bottom edges a shell may travel.
    pub bounds_margin: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            radius: 6.0,
            gravity: 0.3,
            wind_coupling: 0.01,
            launch_speed: 15.0,
            muzzle_offset: 20.0,
            explosion_radius: 50.0,
            damage: 35,
            fuse_steps: 180,
            restitution: 0.4,
            friction: 0.8,
            max_bounces: 3,
            probe_distance: 5.0,
            rest_speed: 0.5,
            bounce_lift: 2.0,
            hit_padding: 10.0,
            bounds_margin: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosionConfig {
    /// Extra reach beyond the crater radius within which units are hurt.
    pub unit_padding: f32,
    /// Knockback magnitude at falloff 1.
    pub knockback: f32,
    /// Steps a blast stays on the field before the shot counts as settled.
    pub linger_steps: u32,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self {
            unit_padding: 20.0,
            knockback: 10.0,
            linger_steps: 34,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    pub turn_secs: f32,
    /// Wind is kept within `-max_wind..=max_wind`.
    pub max_wind: f32,
    /// Largest wind change applied when a turn begins.
    pub wind_delta: f32,
    pub shot_settle_secs: f32,
    pub move_settle_secs: f32,
    /// Distance walked by a move action that names none.
    pub auto_move_distance: f32,
    /// Longest distance a move action may request.
    pub max_move_distance: f32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_secs: 30.0,
            max_wind: 5.0,
            wind_delta: 1.0,
            shot_settle_secs: 0.5,
            move_settle_secs: 0.3,
            auto_move_distance: 60.0,
            max_move_distance: 200.0,
        }
    }
}

impl TurnConfig {
    pub fn turn_steps(&self) -> u32 {
        secs_to_steps(self.turn_secs, DEFAULT_STEP_HZ).max(1)
    }

    pub fn shot_settle_steps(&self) -> u32 {
        secs_to_steps(self.shot_settle_secs, DEFAULT_STEP_HZ).max(1)
    }

    pub fn move_settle_steps(&self) -> u32 {
        secs_to_steps(self.move_settle_secs, DEFAULT_STEP_HZ).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub units_per_team: usize,
    /// Team A spawns in `edge_margin..width * team_a_max_ratio`.
    pub team_a_max_ratio: f32,
    /// Team B spawns in `width * team_b_min_ratio..width - edge_margin`.
    pub team_b_min_ratio: f32,
    pub edge_margin: f32,
    pub min_separation: f32,
    /// Columns whose ground lies within this distance of the bottom are rejected.
    pub min_floor_clearance: f32,
    pub max_attempts: u32,
    pub names: Vec<String>,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            units_per_team: 5,
            team_a_max_ratio: 0.4,
            team_b_min_ratio: 0.6,
            edge_margin: 50.0,
            min_separation: 50.0,
            min_floor_clearance: 50.0,
            max_attempts: 50,
            names: [
                "Bob", "Tim", "Joe", "Max", "Sam", "Rex", "Ace", "Zap", "Pip", "Gus",
            ]
            .iter()
            .map(|n| n.to_string())
            .collect(),
        }
    }
}

/// Per-difficulty tuning of the CPU opponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiPreset {
    /// Largest angle perturbation in radians.
    pub aim_error: f32,
    /// Largest relative power perturbation.
    pub power_error: f32,
    pub think_secs: f32,
    pub move_chance: f32,
    pub checks_blocked: bool,
}

impl AiPreset {
    pub fn think_steps(&self) -> u32 {
        secs_to_steps(self.think_secs, DEFAULT_STEP_HZ)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub easy: AiPreset,
    pub medium: AiPreset,
    pub hard: AiPreset,
    /// Target score is `(distance_bias - d) + (health_bias - hp) * health_weight`.
    pub distance_bias: f32,
    pub health_bias: f32,
    pub health_weight: f32,
    /// Line-of-sight samples between attacker and target.
    pub sight_segments: u32,
    /// Height above the feet the sight line is drawn from.
    pub sight_height: f32,
    /// A blocked target closer than this triggers a reposition.
    pub reposition_range: f32,
    /// Beyond this distance a random move heads toward the target.
    pub far_range: f32,
    /// Jump probability is `move_chance * (jump_chance_factor - 1)`.
    pub jump_chance_factor: f32,
    /// Coarse sweep power is `clamp(d / power_distance_scale, sweep_min_power, 1)`.
    pub power_distance_scale: f32,
    pub sweep_min_power: f32,
    pub coarse_step: f32,
    pub coarse_margin: f32,
    /// Refinement runs when the coarse error exceeds this.
    pub refine_threshold: f32,
    pub refine_power_min: f32,
    pub refine_power_step: f32,
    pub refine_angle_step: f32,
    pub refine_margin: f32,
    /// Predictor horizon in steps.
    pub horizon: u32,
    /// Prediction stops once descending this far below the launch height.
    pub drop_below: f32,
    /// Weight of vertical landing error relative to horizontal.
    pub vertical_weight: f32,
    /// Lowest power the CPU fires at after error injection.
    pub min_power: f32,
    /// Aim rotation per step while lining up a shot.
    pub aim_slew: f32,
    pub aim_tolerance: f32,
    /// Aiming gives up and fires after this long.
    pub aim_budget_secs: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            easy: AiPreset {
                aim_error: 0.3,
                power_error: 0.25,
                think_secs: 1.5,
                move_chance: 0.25,
                checks_blocked: false,
            },
            medium: AiPreset {
                aim_error: 0.15,
                power_error: 0.1,
                think_secs: 1.0,
                move_chance: 0.1,
                checks_blocked: true,
            },
            hard: AiPreset {
                aim_error: 0.03,
                power_error: 0.03,
                think_secs: 0.5,
                move_chance: 0.02,
                checks_blocked: true,
            },
            distance_bias: 1000.0,
            health_bias: 100.0,
            health_weight: 3.0,
            sight_segments: 10,
            sight_height: 10.0,
            reposition_range: 200.0,
            far_range: 300.0,
            jump_chance_factor: 1.5,
            power_distance_scale: 350.0,
            sweep_min_power: 0.4,
            coarse_step: 0.1,
            coarse_margin: 0.1,
            refine_threshold: 100.0,
            refine_power_min: 0.3,
            refine_power_step: 0.1,
            refine_angle_step: 0.15,
            refine_margin: 0.2,
            horizon: 180,
            drop_below: 50.0,
            vertical_weight: 0.5,
            min_power: 0.3,
            aim_slew: 0.08,
            aim_tolerance: 0.1,
            aim_budget_secs: 2.0,
        }
    }
}

impl AiConfig {
    pub fn preset(&self, difficulty: Difficulty) -> &AiPreset {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn aim_budget_steps(&self) -> u32 {
        secs_to_steps(self.aim_budget_secs, DEFAULT_STEP_HZ)
    }
}
