use std::f32::consts::{FRAC_PI_4, PI};

use serde::{Deserialize, Serialize};

use crater_core::player::Team;

use crate::config::WormConfig;
use crate::terrain::Terrain;

/// A pending multi-step walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoMove {
    pub direction: i8,
    pub distance: f32,
    pub traveled: f32,
}

/// One soldier. Position is the feet; `y` grows downward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worm {
    pub name: String,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: i32,
    pub alive: bool,
    pub grounded: bool,
    /// Radians in `[-PI, 0]`; `-PI/2` points straight up.
    pub aim: f32,
    pub facing_right: bool,
    /// Height at which the current involuntary fall began.
    pub fall_start: Option<f32>,
    /// Set by a voluntary jump until the next landing; suppresses fall damage.
    pub jumping: bool,
    pub auto_move: Option<AutoMove>,
}

impl Worm {
    pub fn new(name: String, team: Team, x: f32, y: f32, config: &WormConfig) -> Self {
        let facing_right = team == Team::A;
        Self {
            name,
            team,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            health: config.max_health,
            alive: true,
            grounded: false,
            aim: if facing_right { -FRAC_PI_4 } else { -3.0 * FRAC_PI_4 },
            facing_right,
            fall_start: None,
            jumping: false,
            auto_move: None,
        }
    }

    /// Body center, where projectiles are launched from and hit.
    pub fn center(&self, config: &WormConfig) -> (f32, f32) {
        (self.x, self.y - config.body_center)
    }

    pub fn is_moving(&self) -> bool {
        self.auto_move.is_some()
    }

    /// Alive units count as settled only once grounded with no walk pending.
    pub fn is_settled(&self) -> bool {
        !self.alive || (self.grounded && !self.is_moving())
    }

    fn feet_touch(&self, terrain: &Terrain, config: &WormConfig) -> bool {
        let side = config.width / 2.0 - config.foot_inset;
        terrain.is_solid(self.x, self.y)
            || terrain.is_solid(self.x - side, self.y)
            || terrain.is_solid(self.x + side, self.y)
    }

    /// Advance one simulation step.
    pub fn update(&mut self, terrain: &Terrain, config: &WormConfig) {
        if !self.alive {
            return;
        }
        let was_grounded = self.grounded;

        if let Some(mut walk) = self.auto_move
            && self.grounded
        {
            self.walk(walk.direction, terrain, config);
            walk.traveled += config.move_speed;
            self.auto_move = (walk.traveled < walk.distance).then_some(walk);
        }

        if !self.grounded {
            self.vy = (self.vy + config.gravity).min(config.terminal_velocity);
        }

        if self.vx != 0.0 {
            let next_x = self.x + self.vx;
            if terrain.is_solid(next_x, self.y - config.wall_probe) {
                self.vx = 0.0;
            } else {
                self.x = next_x;
            }
            if self.grounded {
                self.vx *= config.ground_friction;
                if self.vx.abs() < config.slide_cutoff {
                    self.vx = 0.0;
                }
            }
        }

        if !was_grounded && self.vy > 0.0 && self.fall_start.is_none() && !self.jumping {
            self.fall_start = Some(self.y);
        }

        self.y += self.vy;

        self.grounded = false;
        if self.feet_touch(terrain, config) {
            while terrain.is_solid(self.x, self.y - 1.0) && self.y > 0.0 {
                self.y -= 1.0;
            }
            if let Some(start) = self.fall_start
                && !self.jumping
            {
                let fall = self.y - start;
                if fall > config.fall_damage_threshold {
                    let damage =
                        ((fall - config.fall_damage_threshold) * config.fall_damage_per_px) as i32;
                    self.take_damage(damage);
                }
            }
            self.grounded = true;
            self.vy = 0.0;
            self.fall_start = None;
            self.jumping = false;
        }

        // Not clamp: the field may be narrower than the unit.
        self.x = self
            .x
            .max(config.width / 2.0)
            .min(terrain.width() as f32 - config.width / 2.0);
    }

    /// Take one walking stride. Climbs ledges up to `max_step` pixels and
    /// follows the ground down by as much; refuses walls and low ceilings.
    /// Returns whether the unit moved.
    pub fn walk(&mut self, direction: i8, terrain: &Terrain, config: &WormConfig) -> bool {
        if !self.grounded || !self.alive || direction == 0 {
            return false;
        }
        let dir = f32::from(direction.signum());
        let next_x = self.x + dir * config.move_speed;
        let head = self.y - config.height;
        if terrain.is_solid(next_x, head)
            || terrain.is_solid(next_x + dir * config.width / 2.0, head)
        {
            return false;
        }

        let mut target_y = self.y;
        let mut climbed = 0;
        while terrain.is_solid(next_x, target_y - 1.0) {
            if climbed == config.max_step {
                return false;
            }
            target_y -= 1.0;
            climbed += 1;
        }
        if climbed == 0 {
            let mut dropped = 0;
            while dropped < config.max_step && !terrain.is_solid(next_x, target_y) {
                target_y += 1.0;
                dropped += 1;
            }
            if !terrain.is_solid(next_x, target_y) {
                // Ledge: step off at the current height and let gravity act.
                target_y = self.y;
            }
        }
        if terrain.is_solid(next_x, target_y - config.height) {
            return false;
        }

        self.x = next_x;
        self.y = target_y;
        self.facing_right = dir > 0.0;
        true
    }

    pub fn start_auto_move(&mut self, direction: i8, distance: f32) {
        self.auto_move = Some(AutoMove {
            direction: direction.signum(),
            distance,
            traveled: 0.0,
        });
        if direction != 0 {
            self.facing_right = direction > 0;
        }
    }

    pub fn stop_auto_move(&mut self) {
        self.auto_move = None;
    }

    /// Leap with an upward and direction-scaled sideways impulse. Only a
    /// grounded unit can jump; returns whether it did.
    pub fn jump(&mut self, direction: i8, config: &WormConfig) -> bool {
        if !self.grounded || !self.alive {
            return false;
        }
        let dir = f32::from(direction.signum());
        self.vy = -config.jump_speed_y;
        self.vx = dir * config.jump_speed_x;
        self.grounded = false;
        self.facing_right = direction >= 0;
        self.jumping = true;
        self.stop_auto_move();
        true
    }

    /// Set the aim angle, clamped to the upper hemisphere.
    pub fn set_aim(&mut self, angle: f32) {
        self.aim = angle.clamp(-PI, 0.0);
    }

    pub fn aim_by(&mut self, delta: f32) {
        self.set_aim(self.aim + delta);
    }

    /// Subtract `amount` health. Returns true if this call killed the unit.
    /// Dead units and non-positive amounts are ignored.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.alive || amount <= 0 {
            return false;
        }
        self.health -= amount;
        if self.health <= 0 {
            self.health = 0;
            self.alive = false;
            return true;
        }
        false
    }

    /// Shove the unit away from `(ex, ey)`. A unit sitting on the epicenter is
    /// thrown straight up.
    pub fn apply_explosion_force(&mut self, ex: f32, ey: f32, force: f32) {
        let dx = self.x - ex;
        let dy = self.y - ey;
        let dist = (dx * dx + dy * dy).sqrt();
        let (push_x, push_y) = if dist < 1.0 {
            (0.0, -force)
        } else {
            (dx / dist * force, dy / dist * force)
        };
        self.x += push_x;
        self.vy = push_y;
        self.grounded = false;
        self.jumping = false;
        self.fall_start = Some(self.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> WormConfig {
        WormConfig::default()
    }

    /// Drop a unit onto flat ground and let it settle.
    fn settled(terrain: &Terrain, x: f32) -> Worm {
        let config = cfg();
        let mut w = Worm::new("Bob".into(), Team::A, x, terrain.ground_level(x), &config);
        for _ in 0..5 {
            w.update(terrain, &config);
        }
        assert!(w.grounded);
        w
    }

    #[test]
    fn default_aim_faces_the_enemy() {
        let a = Worm::new("A".into(), Team::A, 0.0, 0.0, &cfg());
        let b = Worm::new("B".into(), Team::B, 0.0, 0.0, &cfg());
        assert!(a.facing_right && !b.facing_right);
        assert!((a.aim + FRAC_PI_4).abs() < 1e-6);
        assert!((b.aim + 3.0 * FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn field_narrower_than_unit_does_not_panic() {
        let config = cfg();
        let t = Terrain::flat(4, 100, 50);
        let mut w = Worm::new("Tiny".into(), Team::A, 2.0, 50.0, &config);
        w.update(&t, &config);
        assert!(w.x <= 4.0 - config.width / 2.0 + 1e-6);
    }

    #[test]
    fn lands_on_flat_ground() {
        let t = Terrain::flat(400, 300, 200);
        let w = settled(&t, 100.0);
        assert!(w.y >= 200.0 && w.y < 201.0, "y={}", w.y);
        assert_eq!(w.health, 100);
    }

    #[test]
    fn short_drop_is_free_long_drop_hurts() {
        let t = Terrain::flat(400, 300, 250);
        let config = cfg();
        let mut short = Worm::new("S".into(), Team::A, 100.0, 220.0, &config);
        let mut long = Worm::new("L".into(), Team::A, 200.0, 100.0, &config);
        for _ in 0..120 {
            short.update(&t, &config);
            long.update(&t, &config);
        }
        assert_eq!(short.health, 100);
        // A fall of about 150 px is 100 px over the threshold: 30 damage.
        assert!(long.health < 100 && long.health >= 65, "health={}", long.health);
        assert!(long.grounded);
    }

    #[test]
    fn jump_requires_ground() {
        let config = cfg();
        let mut w = Worm::new("A".into(), Team::A, 10.0, 10.0, &config);
        assert!(!w.jump(1, &config));
    }

    #[test]
    fn jump_cancels_auto_move() {
        let t = Terrain::flat(400, 300, 200);
        let config = cfg();
        let mut w = settled(&t, 100.0);
        w.start_auto_move(1, 60.0);
        w.jump(-1, &config);
        assert!(!w.is_moving());
        assert!(!w.facing_right);
    }

    #[test]
    fn auto_move_covers_requested_distance() {
        let t = Terrain::flat(400, 300, 200);
        let config = cfg();
        let mut w = settled(&t, 100.0);
        w.start_auto_move(1, 60.0);
        let mut steps = 0;
        while w.is_moving() {
            w.update(&t, &config);
            steps += 1;
            assert!(steps < 100);
        }
        assert_eq!(steps, 30);
        assert!((w.x - 160.0).abs() < 1e-3, "x={}", w.x);
    }

    /// Floor at 205 left of x=110 and `205 - rise` from there on.
    fn ledge(rise: u32) -> Terrain {
        Terrain::from_profile(400, 300, |px| if px < 110 { 205 } else { 205 - rise })
    }

    fn standing(x: f32, y: f32) -> Worm {
        let mut w = Worm::new("A".into(), Team::A, x, y, &cfg());
        w.grounded = true;
        w
    }

    #[test]
    fn climbs_small_step() {
        let mut w = standing(108.0, 205.0);
        assert!(w.walk(1, &ledge(5), &cfg()));
        assert_eq!(w.x, 110.0);
        assert_eq!(w.y, 200.0);
    }

    #[test]
    fn refuses_step_above_climb_limit() {
        let mut w = standing(108.0, 205.0);
        assert!(!w.walk(1, &ledge(15), &cfg()));
        assert_eq!((w.x, w.y), (108.0, 205.0));
    }

    #[test]
    fn refuses_wall_at_head_height() {
        let mut w = standing(108.0, 205.0);
        assert!(!w.walk(1, &ledge(30), &cfg()));
        assert_eq!(w.x, 108.0);
    }

    #[test]
    fn follows_small_drop_down() {
        let t = Terrain::from_profile(400, 300, |px| if px < 110 { 200 } else { 204 });
        let mut w = standing(108.0, 200.0);
        assert!(w.walk(1, &t, &cfg()));
        assert_eq!(w.y, 204.0);
    }

    /// High shelf on the left, deep floor from x=200.
    fn cliff() -> Terrain {
        Terrain::from_profile(400, 400, |px| if px < 200 { 100 } else { 350 })
    }

    #[test]
    fn walking_off_a_cliff_hurts() {
        let t = cliff();
        let config = cfg();
        let mut w = settled(&t, 190.0);
        w.start_auto_move(1, 60.0);
        for _ in 0..300 {
            w.update(&t, &config);
        }
        assert!(w.y > 340.0, "y={}", w.y);
        assert!(w.health < 100);
    }

    #[test]
    fn jumping_off_a_cliff_is_free() {
        let t = cliff();
        let config = cfg();
        let mut w = settled(&t, 190.0);
        assert!(w.jump(1, &config));
        for _ in 0..300 {
            w.update(&t, &config);
        }
        assert!(w.y > 340.0, "y={}", w.y);
        assert_eq!(w.health, 100);
        assert!(w.grounded && !w.jumping);
    }

    #[test]
    fn take_damage_clamps_and_kills_once() {
        let mut w = Worm::new("A".into(), Team::A, 0.0, 0.0, &cfg());
        assert!(!w.take_damage(40));
        assert_eq!(w.health, 60);
        assert!(!w.take_damage(0));
        assert!(!w.take_damage(-20));
        assert_eq!(w.health, 60);
        assert!(w.take_damage(500));
        assert_eq!(w.health, 0);
        assert!(!w.alive);
        assert!(!w.take_damage(10));
        assert_eq!(w.health, 0);
    }

    #[test]
    fn aim_is_clamped_to_upper_hemisphere() {
        let mut w = Worm::new("A".into(), Team::A, 0.0, 0.0, &cfg());
        w.set_aim(0.5);
        assert_eq!(w.aim, 0.0);
        w.aim_by(-10.0);
        assert_eq!(w.aim, -PI);
    }

    #[test]
    fn explosion_pushes_away_and_arms_fall_damage() {
        let t = Terrain::flat(400, 300, 200);
        let mut w = settled(&t, 100.0);
        w.jumping = true;
        let y = w.y;
        w.apply_explosion_force(80.0, y, 8.0);
        assert!((w.x - 108.0).abs() < 1e-4);
        assert!(!w.grounded);
        assert!(!w.jumping);
        assert_eq!(w.fall_start, Some(y));
    }

    #[test]
    fn epicenter_knockback_is_straight_up() {
        let mut w = Worm::new("A".into(), Team::A, 50.0, 50.0, &cfg());
        w.apply_explosion_force(50.0, 50.0, 10.0);
        assert_eq!(w.x, 50.0);
        assert_eq!(w.vy, -10.0);
    }

    #[test]
    fn bottom_edge_catches_units() {
        let t = Terrain::empty(200, 100);
        let config = cfg();
        let mut w = Worm::new("A".into(), Team::A, 100.0, 50.0, &config);
        for _ in 0..200 {
            w.update(&t, &config);
        }
        assert!(w.alive && w.grounded);
        assert!(w.y >= 100.0 && w.y < 101.0, "y={}", w.y);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn health_never_rises(hits in proptest::collection::vec(-20i32..80, 1..20)) {
                let mut w = Worm::new("A".into(), Team::A, 0.0, 0.0, &WormConfig::default());
                for amount in hits {
                    let before = w.health;
                    let was_alive = w.alive;
                    w.take_damage(amount);
                    prop_assert!(w.health <= before);
                    prop_assert!(w.health >= 0);
                    if was_alive && amount > 0 {
                        prop_assert!(w.health < before || w.health == 0);
                    }
                    if !was_alive {
                        prop_assert_eq!(w.health, before);
                        prop_assert!(!w.alive);
                    }
                }
            }
        }
    }
}
