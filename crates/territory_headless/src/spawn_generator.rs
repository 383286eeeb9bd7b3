//! Seeded spawn position generator.
//!
//! Generates spawn positions that keep every starting territory inside the
//! map and apart from the others, so bot matches start fair.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use territory_core::config::SimConfig;
use territory_core::math::Vec2;

/// Maximum rejection-sampling attempts per random spawn.
const MAX_ATTEMPTS: u32 = 64;

/// Spawn configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Minimum distance between spawn points, in spawn radii.
    pub min_separation_radii: f64,
    /// Minimum distance from the map edge, in spawn radii.
    pub edge_padding_radii: f64,
    /// Spawn pattern to use.
    pub pattern: SpawnPattern,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            min_separation_radii: 4.0,
            edge_padding_radii: 2.0,
            pattern: SpawnPattern::Ring,
        }
    }
}

/// Predefined spawn patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPattern {
    /// Evenly spaced on a circle around the map centre, randomly rotated.
    Ring,
    /// Rows and columns filling the map.
    Grid,
    /// Random positions with a minimum separation.
    Random,
}

/// Simple deterministic RNG for spawns and bots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRng {
    state: u64,
}

impl SpawnRng {
    /// Create new RNG from seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        // xorshift never leaves zero
        let state = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        Self {
            state: if state == 0 { 0x9E37_79B9_7F4A_7C15 } else { state },
        }
    }

    /// Get next random value.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        // xorshift64*
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Get random float in 0.0..1.0.
    pub fn next_f64(&mut self) -> f64 {
        (self.next() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Get random float in `[min, max)`.
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_f64()
    }
}

/// Generate `count` spawn positions for the map described by `sim_config`.
#[must_use]
pub fn generate_spawns(
    sim_config: &SimConfig,
    count: usize,
    seed: u64,
    config: &SpawnConfig,
) -> Vec<Vec2> {
    let mut rng = SpawnRng::new(seed);
    let radius = sim_config.territory.spawn_radius;
    let padding = radius * config.edge_padding_radii;
    let (width, height) = (sim_config.world.width, sim_config.world.height);

    let spawns = match config.pattern {
        SpawnPattern::Ring => ring_spawns(width, height, padding, count, &mut rng),
        SpawnPattern::Grid => grid_spawns(width, height, padding, count),
        SpawnPattern::Random => random_spawns(
            width,
            height,
            padding,
            radius * config.min_separation_radii,
            count,
            &mut rng,
        ),
    };
    spawns
        .into_iter()
        .map(|p| clamp_spawn(p, width, height, padding))
        .collect()
}

fn ring_spawns(width: f64, height: f64, padding: f64, count: usize, rng: &mut SpawnRng) -> Vec<Vec2> {
    let center = Vec2::new(width / 2.0, height / 2.0);
    let radius = (width.min(height) / 2.0 - padding).max(0.0);
    let base = rng.next_range(0.0, TAU);
    (0..count)
        .map(|i| center + Vec2::from_angle(base + TAU * i as f64 / count.max(1) as f64) * radius)
        .collect()
}

fn grid_spawns(width: f64, height: f64, padding: f64, count: usize) -> Vec<Vec2> {
    let columns = (count as f64).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(columns).max(1);
    let cell_w = (width - 2.0 * padding).max(0.0) / columns as f64;
    let cell_h = (height - 2.0 * padding).max(0.0) / rows as f64;
    (0..count)
        .map(|i| {
            Vec2::new(
                padding + cell_w * ((i % columns) as f64 + 0.5),
                padding + cell_h * ((i / columns) as f64 + 0.5),
            )
        })
        .collect()
}

fn random_spawns(
    width: f64,
    height: f64,
    padding: f64,
    separation: f64,
    count: usize,
    rng: &mut SpawnRng,
) -> Vec<Vec2> {
    let mut spawns: Vec<Vec2> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut candidate = Vec2::ZERO;
        for _ in 0..MAX_ATTEMPTS {
            candidate = Vec2::new(
                rng.next_range(padding, (width - padding).max(padding)),
                rng.next_range(padding, (height - padding).max(padding)),
            );
            if spawns.iter().all(|s| s.distance(candidate) >= separation) {
                break;
            }
        }
        // Crowded maps keep the last candidate
        spawns.push(candidate);
    }
    spawns
}

fn clamp_spawn(p: Vec2, width: f64, height: f64, padding: f64) -> Vec2 {
    let pad_x = padding.min(width / 2.0);
    let pad_y = padding.min(height / 2.0);
    Vec2::new(p.x.clamp(pad_x, width - pad_x), p.y.clamp(pad_y, height - pad_y))
}

/// Spawn fairness summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnBalanceMetrics {
    /// Closest pair of spawns.
    pub min_distance: f64,
    /// Farthest pair of spawns.
    pub max_distance: f64,
}

impl SpawnBalanceMetrics {
    /// Evaluate a spawn layout. `None` with fewer than two spawns.
    #[must_use]
    pub fn evaluate(spawns: &[Vec2]) -> Option<Self> {
        let mut min_distance = f64::INFINITY;
        let mut max_distance: f64 = 0.0;
        for (i, a) in spawns.iter().enumerate() {
            for b in &spawns[i + 1..] {
                let d = a.distance(*b);
                min_distance = min_distance.min(d);
                max_distance = max_distance.max(d);
            }
        }
        (spawns.len() >= 2).then_some(Self {
            min_distance,
            max_distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = SpawnRng::new(12345);
        let mut rng2 = SpawnRng::new(12345);

        for _ in 0..100 {
            assert_eq!(rng1.next(), rng2.next());
        }
    }

    #[test]
    fn test_rng_float_range() {
        let mut rng = SpawnRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_range(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&v));
        }
    }

    #[test]
    fn test_ring_spawns_are_evenly_spaced() {
        let config = SimConfig::default();
        let spawns = generate_spawns(&config, 4, 42, &SpawnConfig::default());
        assert_eq!(spawns.len(), 4);
        let metrics = SpawnBalanceMetrics::evaluate(&spawns).unwrap();
        // Square on a circle: sides and diagonals
        assert!((metrics.max_distance / metrics.min_distance - 2f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_spawns_stay_inside_map() {
        let config = SimConfig::default();
        for pattern in [SpawnPattern::Ring, SpawnPattern::Grid, SpawnPattern::Random] {
            let spawn_config = SpawnConfig {
                pattern,
                ..Default::default()
            };
            for p in generate_spawns(&config, 9, 3, &spawn_config) {
                let pad = config.territory.spawn_radius;
                assert!(p.x >= pad && p.x <= config.world.width - pad);
                assert!(p.y >= pad && p.y <= config.world.height - pad);
            }
        }
    }

    #[test]
    fn test_random_spawns_respect_separation() {
        let config = SimConfig::default();
        let spawn_config = SpawnConfig {
            pattern: SpawnPattern::Random,
            ..Default::default()
        };
        let spawns = generate_spawns(&config, 6, 99, &spawn_config);
        let metrics = SpawnBalanceMetrics::evaluate(&spawns).unwrap();
        assert!(metrics.min_distance >= config.territory.spawn_radius * 4.0);
    }

    #[test]
    fn test_different_seeds_different_spawns() {
        let config = SimConfig::default();
        let a = generate_spawns(&config, 3, 1, &SpawnConfig::default());
        let b = generate_spawns(&config, 3, 2, &SpawnConfig::default());
        assert_ne!(a, b);
    }
}
