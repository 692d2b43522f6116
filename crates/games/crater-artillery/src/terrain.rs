use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TerrainConfig;

/// A cosmetic darker patch inside the ground. Never consulted by physics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecorPatch {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Destructible solid/empty field, one bit per pixel, row-major.
///
/// `y` grows downward. Everything at or below the bottom edge counts as
/// solid so a unit can never fall through the floor of an intact column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    width: u32,
    height: u32,
    words_per_row: usize,
    cells: Vec<u64>,
    decor: Vec<DecorPatch>,
}

impl Terrain {
    /// An empty field with nothing solid inside the bounds.
    pub fn empty(width: u32, height: u32) -> Self {
        let words_per_row = (width as usize).div_ceil(64);
        Self {
            width,
            height,
            words_per_row,
            cells: vec![0; words_per_row * height as usize],
            decor: Vec::new(),
        }
    }

    /// A field filled solid from `ground_y` (inclusive) to the bottom.
    pub fn flat(width: u32, height: u32, ground_y: u32) -> Self {
        Self::from_profile(width, height, |_| ground_y)
    }

    /// A field whose column `px` is solid from `surface(px)` to the bottom.
    pub fn from_profile(width: u32, height: u32, surface: impl Fn(u32) -> u32) -> Self {
        let mut terrain = Self::empty(width, height);
        for px in 0..width {
            for py in surface(px).min(height)..height {
                terrain.set(px, py);
            }
        }
        terrain
    }

    /// Build the rolling-hills field. All randomness is drawn from `rng`, so
    /// two generators seeded alike yield identical fields.
    pub fn generate<R: Rng + ?Sized>(config: &TerrainConfig, rng: &mut R) -> Self {
        let mut terrain = Self::empty(config.width, config.height);
        let phases: Vec<f32> = config
            .waves
            .iter()
            .map(|_| {
                if config.randomize_phases {
                    rng.random_range(0.0..TAU)
                } else {
                    0.0
                }
            })
            .collect();

        let w = config.width as f32;
        let h = config.height as f32;
        let base = h * config.base_height_ratio;
        let segments = config.segments.max(1);
        let segment_width = w / segments as f32;

        let knots: Vec<f32> = (0..=segments)
            .map(|i| {
                let i = i as f32;
                base + config
                    .waves
                    .iter()
                    .zip(&phases)
                    .map(|(wave, phase)| (i * wave.frequency + phase).sin() * wave.amplitude)
                    .sum::<f32>()
            })
            .collect();

        for px in 0..config.width {
            let cx = px as f32 + 0.5;
            let seg = ((cx / segment_width) as usize).min(segments as usize - 1);
            let t = (cx - seg as f32 * segment_width) / segment_width;
            let surface = knots[seg] + (knots[seg + 1] - knots[seg]) * t;
            for py in 0..config.height {
                if py as f32 + 0.5 >= surface {
                    terrain.set(px, py);
                }
            }
        }

        let patches = config.decor_patches;
        if patches > 0 {
            let section = (w - 100.0).max(0.0) / patches as f32;
            for i in 0..patches {
                let x = 50.0 + i as f32 * section + rng.random::<f32>() * section * 0.7;
                let y = base + 70.0 + rng.random::<f32>() * (h - base - 90.0).max(0.0);
                let radius = 20.0 + rng.random::<f32>() * 35.0;
                terrain.decor.push(DecorPatch { x, y, radius });
            }
        }

        terrain
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn decor(&self) -> &[DecorPatch] {
        &self.decor
    }

    fn bit(&self, px: u32, py: u32) -> (usize, u64) {
        let word = py as usize * self.words_per_row + (px as usize >> 6);
        (word, 1u64 << (px & 63))
    }

    fn set(&mut self, px: u32, py: u32) {
        let (word, mask) = self.bit(px, py);
        self.cells[word] |= mask;
    }

    fn cell(&self, px: u32, py: u32) -> bool {
        let (word, mask) = self.bit(px, py);
        self.cells[word] & mask != 0
    }

    /// Whether the pixel containing `(x, y)` holds material. Defined for every
    /// input: outside the field only the region at or below the bottom edge is
    /// solid.
    pub fn is_solid(&self, x: f32, y: f32) -> bool {
        let h = self.height as f32;
        if !(x >= 0.0 && x < self.width as f32 && y >= 0.0 && y < h) {
            return y >= h;
        }
        self.cell(x as u32, y as u32)
    }

    /// Topmost solid y in the column containing `x`, or the field height if
    /// the column is empty. `x` is clamped into the field.
    pub fn ground_level(&self, x: f32) -> f32 {
        if self.width == 0 {
            return self.height as f32;
        }
        let px = if x.is_nan() {
            0
        } else {
            x.clamp(0.0, (self.width - 1) as f32) as u32
        };
        (0..self.height)
            .find(|&py| self.cell(px, py))
            .unwrap_or(self.height) as f32
    }

    /// Clear every pixel whose center lies within `radius` of `(cx, cy)`.
    /// Only ever removes material.
    pub fn destroy(&mut self, cx: f32, cy: f32, radius: f32) {
        if radius.is_nan() || radius <= 0.0 || !cx.is_finite() || !cy.is_finite() {
            return;
        }
        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(self.width);
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(self.height);
        let r2 = radius * radius;
        for py in y0..y1 {
            let dy = py as f32 + 0.5 - cy;
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r2 {
                    let (word, mask) = self.bit(px, py);
                    self.cells[word] &= !mask;
                }
            }
        }
    }

    /// Number of solid pixels inside the field.
    pub fn solid_count(&self) -> usize {
        self.cells.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn hills(seed: u64) -> Terrain {
        Terrain::generate(&TerrainConfig::default(), &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn below_bottom_is_solid_sky_is_not() {
        let t = Terrain::empty(100, 100);
        assert!(t.is_solid(50.0, 100.0));
        assert!(t.is_solid(-10.0, 500.0));
        assert!(!t.is_solid(50.0, -5.0));
        assert!(!t.is_solid(-1.0, 50.0));
        assert!(!t.is_solid(f32::NAN, 10.0));
    }

    #[test]
    fn flat_ground_level() {
        let t = Terrain::flat(64, 80, 60);
        assert_eq!(t.ground_level(10.0), 60.0);
        assert!(t.is_solid(10.0, 60.0));
        assert!(!t.is_solid(10.0, 59.9));
        // Out-of-range columns clamp to the edge.
        assert_eq!(t.ground_level(-100.0), 60.0);
        assert_eq!(t.ground_level(1e9), 60.0);
    }

    #[test]
    fn empty_column_reports_field_height() {
        let mut t = Terrain::flat(64, 80, 60);
        t.destroy(10.0, 70.0, 30.0);
        assert_eq!(t.ground_level(10.0), 80.0);
    }

    #[test]
    fn destroy_carves_circle() {
        let mut t = Terrain::flat(200, 200, 100);
        let before = t.solid_count();
        t.destroy(100.0, 100.0, 20.0);
        assert!(!t.is_solid(100.0, 110.0));
        assert!(!t.is_solid(115.0, 105.0));
        assert!(t.is_solid(100.0, 125.0));
        assert!(t.is_solid(130.0, 101.0));
        assert!(t.solid_count() < before);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut t = hills(5);
        t.destroy(300.0, 380.0, 50.0);
        let once = t.clone();
        t.destroy(300.0, 380.0, 50.0);
        assert_eq!(t, once);
    }

    #[test]
    fn destroy_ignores_degenerate_radius() {
        let mut t = hills(5);
        let before = t.clone();
        t.destroy(300.0, 380.0, 0.0);
        t.destroy(300.0, 380.0, -4.0);
        t.destroy(f32::NAN, 380.0, 10.0);
        assert_eq!(t, before);
    }

    #[test]
    fn destroy_off_field_is_clamped() {
        let mut t = Terrain::flat(50, 50, 10);
        t.destroy(-30.0, 60.0, 40.0);
        t.destroy(1e6, 1e6, 5.0);
        assert!(!t.is_solid(0.0, 49.0));
    }

    #[test]
    fn same_seed_same_field() {
        let a = hills(77);
        let b = hills(77);
        for x in (0..1024).step_by(7) {
            for y in (0..600).step_by(5) {
                assert_eq!(a.is_solid(x as f32, y as f32), b.is_solid(x as f32, y as f32));
            }
        }
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_profile_ignores_seed() {
        let config = TerrainConfig {
            randomize_phases: false,
            decor_patches: 0,
            ..TerrainConfig::default()
        };
        let a = Terrain::generate(&config, &mut StdRng::seed_from_u64(1));
        let b = Terrain::generate(&config, &mut StdRng::seed_from_u64(2));
        assert_eq!(a, b);
        // Knot 0 sits on the base line when every phase is zero.
        let g = a.ground_level(0.0);
        assert!((360.0..=362.0).contains(&g), "ground={g}");
    }

    #[test]
    fn surface_stays_within_wave_envelope() {
        let t = hills(3);
        for x in (0..1024).step_by(16) {
            let g = t.ground_level(x as f32);
            assert!((240.0..=481.0).contains(&g), "x={x} ground={g}");
        }
    }

    #[test]
    fn decor_is_generated() {
        let t = hills(3);
        assert_eq!(t.decor().len(), 10);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn destruction_never_regrows(
                cx in -50.0f32..250.0,
                cy in -50.0f32..250.0,
                r in 0.0f32..80.0,
                px in 0u32..200,
                py in 0u32..200,
            ) {
                let before = Terrain::flat(200, 200, 120);
                let mut after = before.clone();
                after.destroy(cx, cy, r);
                let (x, y) = (px as f32 + 0.5, py as f32 + 0.5);
                if after.is_solid(x, y) {
                    prop_assert!(before.is_solid(x, y));
                }
            }

            #[test]
            fn outside_radius_untouched(
                cx in 20.0f32..180.0,
                cy in 100.0f32..180.0,
                r in 1.0f32..40.0,
                px in 0u32..200,
                py in 120u32..200,
            ) {
                let before = Terrain::flat(200, 200, 120);
                let mut after = before.clone();
                after.destroy(cx, cy, r);
                let (x, y) = (px as f32 + 0.5, py as f32 + 0.5);
                let d2 = (x - cx).powi(2) + (y - cy).powi(2);
                if d2 > r * r {
                    prop_assert_eq!(after.is_solid(x, y), before.is_solid(x, y));
                }
            }
        }
    }
}
