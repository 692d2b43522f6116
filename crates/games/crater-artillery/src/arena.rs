use rand::Rng;
use serde::{Deserialize, Serialize};

use crater_core::game_trait::GameEvent;
use crater_core::player::Team;

use crate::config::{ArtilleryConfig, SpawnConfig};
use crate::explosion::{self, Blast};
use crate::projectile::{Ballistic, Projectile, ProjectileStatus};
use crate::terrain::Terrain;
use crate::worm::Worm;

/// Everything physical on the field: ground, both squads, live shells and
/// lingering blasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub terrain: Terrain,
    /// Units per team, indexed by [`Team::index`]. Dead units stay in place.
    pub squads: [Vec<Worm>; 2],
    pub projectiles: Vec<Projectile>,
    pub blasts: Vec<Blast>,
}

impl Arena {
    /// An arena with the given ground and no units.
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            squads: [Vec::new(), Vec::new()],
            projectiles: Vec::new(),
            blasts: Vec::new(),
        }
    }

    /// Generate the ground and place both squads, team A on the left and
    /// team B on the right.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, config: &ArtilleryConfig) -> Self {
        let mut arena = Self::new(Terrain::generate(&config.terrain, rng));
        let spawn = &config.spawn;
        let w = config.terrain.width as f32;
        let mut names = spawn.names.clone();

        for team in Team::ALL {
            let (min_x, max_x) = match team {
                Team::A => (spawn.edge_margin, w * spawn.team_a_max_ratio),
                Team::B => (w * spawn.team_b_min_ratio, w - spawn.edge_margin),
            };
            for _ in 0..spawn.units_per_team {
                let (x, y) = arena.find_spawn(rng, min_x, max_x, spawn);
                let name = draw_name(rng, &mut names, arena.unit_count());
                let worm = Worm::new(name, team, x, y, &config.worm);
                arena.squads[team.index()].push(worm);
            }
        }
        tracing::debug!(
            units = arena.unit_count(),
            solid = arena.terrain.solid_count(),
            "Arena generated"
        );
        arena
    }

    /// Best-effort placement: a column with ground well above the bottom and
    /// room from every placed unit. Falls back to any column in range.
    fn find_spawn<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min_x: f32,
        max_x: f32,
        spawn: &SpawnConfig,
    ) -> (f32, f32) {
        let floor = self.terrain.height() as f32 - spawn.min_floor_clearance;
        let pick = |rng: &mut R| {
            let x = (rng.random::<f32>() * (max_x - min_x)).floor() + min_x;
            (x, self.terrain.ground_level(x))
        };
        for _ in 0..spawn.max_attempts {
            let (x, y) = pick(rng);
            if y < floor && self.clear_of_units(x, y, spawn.min_separation) {
                return (x, y);
            }
        }
        tracing::debug!(min_x, max_x, "No clear spawn found, overlapping");
        pick(rng)
    }

    fn clear_of_units(&self, x: f32, y: f32, separation: f32) -> bool {
        self.squads
            .iter()
            .flatten()
            .all(|w| ((w.x - x).powi(2) + (w.y - y).powi(2)).sqrt() >= separation)
    }

    fn unit_count(&self) -> usize {
        self.squads.iter().map(Vec::len).sum()
    }

    pub fn squad(&self, team: Team) -> &[Worm] {
        &self.squads[team.index()]
    }

    pub fn unit(&self, team: Team, index: usize) -> Option<&Worm> {
        self.squads[team.index()].get(index)
    }

    pub fn unit_mut(&mut self, team: Team, index: usize) -> Option<&mut Worm> {
        self.squads[team.index()].get_mut(index)
    }

    /// Number of living units on `team`.
    pub fn living(&self, team: Team) -> usize {
        self.squad(team).iter().filter(|w| w.alive).count()
    }

    /// Advance units, then shells, then blasts by one step.
    pub fn step(&mut self, wind: f32, config: &ArtilleryConfig) -> Vec<GameEvent> {
        let mut events = Vec::new();

        for team in Team::ALL {
            for (unit, worm) in self.squads[team.index()].iter_mut().enumerate() {
                let (health, alive) = (worm.health, worm.alive);
                worm.update(&self.terrain, &config.worm);
                if worm.health < health {
                    events.push(GameEvent::UnitDamaged {
                        team,
                        unit,
                        amount: health - worm.health,
                        health: worm.health,
                    });
                }
                if alive && !worm.alive {
                    events.push(GameEvent::UnitEliminated { team, unit });
                }
            }
        }

        let shells = std::mem::take(&mut self.projectiles);
        for mut shell in shells {
            let status = shell.step(
                wind,
                &self.terrain,
                &self.squads,
                &config.projectile,
                &config.worm,
            );
            match status {
                ProjectileStatus::Flying => self.projectiles.push(shell),
                ProjectileStatus::Detonate => {
                    events.extend(self.detonate(shell.body.x, shell.body.y, config));
                },
                ProjectileStatus::Gone => {
                    tracing::debug!(x = shell.body.x, y = shell.body.y, "Shell left the field");
                },
            }
        }

        self.blasts.retain_mut(Blast::tick);
        events
    }

    /// Explode a standard shell at `(x, y)`.
    pub fn detonate(&mut self, x: f32, y: f32, config: &ArtilleryConfig) -> Vec<GameEvent> {
        let radius = config.projectile.explosion_radius;
        self.blasts.push(Blast {
            x,
            y,
            radius,
            steps_left: config.explosion.linger_steps,
        });
        explosion::resolve(
            &mut self.terrain,
            &mut self.squads,
            x,
            y,
            radius,
            config.projectile.damage,
            &config.explosion,
        )
    }

    /// Launch a shell from a living unit along its current aim.
    pub fn fire(
        &mut self,
        team: Team,
        unit: usize,
        power: f32,
        config: &ArtilleryConfig,
    ) -> Option<GameEvent> {
        let worm = self.unit(team, unit).filter(|w| w.alive)?;
        let angle = worm.aim;
        let body = Ballistic::launch(worm.center(&config.worm), angle, power, &config.projectile);
        self.projectiles
            .push(Projectile::new(body, team, unit, &config.projectile));
        Some(GameEvent::ShotFired {
            team,
            unit,
            angle,
            power,
        })
    }

    /// No shell in flight, no blast lingering, and every living unit on the
    /// ground.
    pub fn shot_settled(&self) -> bool {
        self.projectiles.is_empty()
            && self.blasts.is_empty()
            && self.squads.iter().flatten().all(|w| !w.alive || w.grounded)
    }
}

/// Draw a name without replacement. Falls back to a numbered name once the
/// pool runs dry.
fn draw_name<R: Rng + ?Sized>(rng: &mut R, pool: &mut Vec<String>, placed: usize) -> String {
    if pool.is_empty() {
        return format!("Unit {}", placed + 1);
    }
    let idx = rng.random_range(0..pool.len());
    pool.swap_remove(idx)
}
