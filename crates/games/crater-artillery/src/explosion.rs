use serde::{Deserialize, Serialize};

use crater_core::game_trait::GameEvent;
use crater_core::player::Team;

use crate::config::ExplosionConfig;
use crate::terrain::Terrain;
use crate::worm::Worm;

/// Linear falloff: 1 at the epicenter, 0 at `reach` and beyond.
pub fn falloff(distance: f32, reach: f32) -> f32 {
    if reach <= 0.0 || distance.is_nan() || distance >= reach {
        0.0
    } else {
        1.0 - distance / reach
    }
}

/// A detonation that is still visible on the field. Shots do not count as
/// settled until every blast has expired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Blast {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub steps_left: u32,
}

impl Blast {
    /// Count down one step. Returns false once the blast has expired.
    pub fn tick(&mut self) -> bool {
        self.steps_left = self.steps_left.saturating_sub(1);
        self.steps_left > 0
    }
}

/// Carve the crater at `(x, y)` and hurt every living unit in reach.
///
/// Damage is `floor(damage * falloff)` measured from the unit's feet;
/// knockback is scaled by the same falloff and only applied to survivors.
pub fn resolve(
    terrain: &mut Terrain,
    squads: &mut [Vec<Worm>; 2],
    x: f32,
    y: f32,
    radius: f32,
    damage: i32,
    config: &ExplosionConfig,
) -> Vec<GameEvent> {
    let mut events = vec![GameEvent::Detonation { x, y, radius }];
    terrain.destroy(x, y, radius);

    let reach = radius + config.unit_padding;
    for team in Team::ALL {
        for (unit, worm) in squads[team.index()].iter_mut().enumerate() {
            if !worm.alive {
                continue;
            }
            let distance = ((worm.x - x).powi(2) + (worm.y - y).powi(2)).sqrt();
            let f = falloff(distance, reach);
            if f <= 0.0 {
                continue;
            }
            let amount = (damage as f32 * f).floor() as i32;
            let killed = worm.take_damage(amount);
            if amount > 0 {
                events.push(GameEvent::UnitDamaged {
                    team,
                    unit,
                    amount,
                    health: worm.health,
                });
            }
            if killed {
                events.push(GameEvent::UnitEliminated { team, unit });
            } else {
                worm.apply_explosion_force(x, y, f * config.knockback);
            }
        }
    }
    events
}
