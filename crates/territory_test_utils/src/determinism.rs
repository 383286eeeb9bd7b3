//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A room runs exactly one authoritative simulation, and clients hold
//! speculative copies that get overwritten by snapshots. Both only work if
//! the same inputs always give the same state. Sources of non-determinism
//! include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted player ID order.
//!
//! - **Order-dependent eliminations**: Resolving a kill mid-scan makes the
//!   outcome depend on storage order. Kills are collected, then applied.
//!
//! - **System randomness**: No calls to `rand()` without explicit seeds.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual modules (capture, fuse, drones, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full simulation scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use territory_core::simulation::Simulation;
use tracing::warn;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use territory_test_utils::determinism::verify_determinism;
/// use territory_test_utils::fixtures::{grid_arena, step_loops};
///
/// let result = verify_determinism(
///     3,
///     120,
///     || grid_arena(4, 250.0),
///     |sim| { step_loops(sim, 40); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and steering and verifies
/// the final state hashes match exactly.
pub fn verify_simulation_determinism<F, S>(setup_fn: F, step_fn: S, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
    S: Fn(&mut Simulation),
{
    let result = verify_determinism(2, num_ticks, &setup_fn, &step_fn, |sim| sim.state_hash());
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// This is useful for catching non-determinism that only manifests
/// under thread scheduling variations, memory layout differences, etc.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations_scoped<F, S>(
    setup_fn: F,
    step_fn: S,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
    S: Fn(&mut Simulation) + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        step_fn(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F, S>(setup_fn: F, step_fn: S, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
    S: Fn(&mut Simulation),
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        step_fn(&mut sim1);
        step_fn(&mut sim2);

        if sim1.state_hash() != sim2.state_hash() {
            warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves simulation state exactly, and
/// that the restored copy keeps tracking the original.
pub fn verify_serialization_determinism<F, S>(setup_fn: F, step_fn: S, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
    S: Fn(&mut Simulation),
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        step_fn(&mut sim);
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..num_ticks.min(60) {
        step_fn(&mut sim);
        step_fn(&mut restored);
    }
    restored.state_hash() == sim.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for geometry and simulation testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use std::f64::consts::TAU;

    use proptest::prelude::*;
    use territory_core::geometry::{regular_polygon, Ring};
    use territory_core::math::Vec2;

    /// A position inside a 3000x3000 map, away from the border.
    pub fn arb_position() -> impl Strategy<Value = Vec2> {
        (200.0..2800.0f64, 200.0..2800.0f64).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// Any heading in radians.
    pub fn arb_heading() -> impl Strategy<Value = f64> {
        -std::f64::consts::PI..std::f64::consts::PI
    }

    /// A sequence of headings, one per steering change.
    pub fn arb_heading_script(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(arb_heading(), 1..max_len.max(2))
    }

    /// Spawn positions for a handful of players.
    pub fn arb_spawn_layout(max_players: usize) -> impl Strategy<Value = Vec<Vec2>> {
        proptest::collection::vec(arb_position(), 1..max_players.max(2))
    }

    /// Regular polygon with random centre, radius, vertex count and rotation.
    pub fn arb_regular_ring() -> impl Strategy<Value = Ring> {
        (arb_position(), 20.0..200.0f64, 3usize..32, 0.0..TAU).prop_map(
            |(center, radius, sides, rotation)| {
                regular_polygon(Vec2::ZERO, radius, sides)
                    .into_iter()
                    .map(|p| {
                        let (s, c) = rotation.sin_cos();
                        center + Vec2::new(p.x * c - p.y * s, p.x * s + p.y * c)
                    })
                    .collect()
            },
        )
    }

    /// Star-shaped (simple, usually concave) ring around `center`.
    pub fn arb_star_ring() -> impl Strategy<Value = Ring> {
        (arb_position(), proptest::collection::vec(30.0..150.0f64, 5..24)).prop_map(
            |(center, radii)| {
                let n = radii.len();
                radii
                    .iter()
                    .enumerate()
                    .map(|(i, r)| center + Vec2::from_angle(TAU * i as f64 / n as f64) * *r)
                    .collect()
            },
        )
    }

    /// Two regular rings whose centres are close enough to overlap often.
    pub fn arb_ring_pair() -> impl Strategy<Value = (Ring, Ring)> {
        (
            arb_position(),
            -150.0..150.0f64,
            -150.0..150.0f64,
            40.0..150.0f64,
            40.0..150.0f64,
            5usize..20,
            5usize..20,
        )
            .prop_map(|(center, dx, dy, ra, rb, na, nb)| {
                (
                    regular_polygon(center, ra, na),
                    regular_polygon(center + Vec2::new(dx, dy), rb, nb),
                )
            })
    }

    /// A territory plus a trail that leaves it and comes back.
    ///
    /// The territory is a regular polygon of radius `r` with at least six
    /// sides. The trail starts and ends inside at `0.8 r`, goes straight out
    /// to a larger radius, sweeps an arc outside the territory and comes
    /// straight back in.
    pub fn arb_capture_case() -> impl Strategy<Value = (Ring, Vec<Vec2>)> {
        (
            arb_position(),
            30.0..120.0f64,
            6usize..24,
            0.0..TAU,
            0.3..5.5f64,
            1.3..3.0f64,
        )
            .prop_map(|(center, r, sides, start, span, out)| {
                let territory = regular_polygon(center, r, sides);
                let steps = (span / 0.25).ceil() as usize;
                let mut trail = vec![center + Vec2::from_angle(start) * (0.8 * r)];
                for k in 0..=steps {
                    let angle = start + span * k as f64 / steps as f64;
                    trail.push(center + Vec2::from_angle(angle) * (out * r));
                }
                trail.push(center + Vec2::from_angle(start + span) * (0.8 * r));
                (territory, trail)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{grid_arena, live_config, step_loops};
    use proptest::prelude::*;
    use territory_core::capture::capture;
    use territory_core::clip::{GreinerHormann, PolygonOps};
    use territory_core::collision::detect;
    use territory_core::components::{Player, PlayerState};
    use territory_core::config::SnipConfig;
    use territory_core::geometry::{point_in_polygon, polygon_area};
    use territory_core::math::Vec2;
    use territory_core::snip::{advance, start_fuse};

    fn loops(sim: &mut Simulation) {
        step_loops(sim, 45);
    }

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(Simulation::default, |s| { s.tick(); }, 100));
    }

    #[test]
    fn test_arena_determinism() {
        assert!(verify_simulation_determinism(|| grid_arena(6, 220.0), loops, 600));
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        assert_eq!(find_first_divergence(|| grid_arena(4, 220.0), loops, 300), None);
    }

    #[test]
    fn test_serialization_preserves_empty_sim() {
        assert!(verify_serialization_determinism(Simulation::default, |s| { s.tick(); }, 5));
    }

    #[test]
    fn test_serialization_preserves_busy_arena() {
        assert!(verify_serialization_determinism(|| grid_arena(6, 220.0), loops, 400));
    }

    #[test]
    fn test_parallel_arena_simulations() {
        let result = run_parallel_simulations_scoped(|| grid_arena(6, 220.0), loops, 4, 400);
        result.assert_deterministic();
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, 2u64)), compute_hash(&(1u32, 2u64)));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Random spawn layouts and steering replay identically.
        #[test]
        fn prop_random_layouts_are_deterministic(
            spawns in strategies::arb_spawn_layout(6),
            script in strategies::arb_heading_script(8),
        ) {
            let setup = || {
                let mut sim = Simulation::new(live_config());
                for &p in &spawns {
                    let _ = sim.spawn_player(p);
                }
                sim
            };
            let step = |sim: &mut Simulation| {
                let leg = (sim.get_tick() / 30) as usize % script.len();
                for id in sim.players().sorted_ids() {
                    let _ = sim.set_target_heading(id, script[leg] + f64::from(id));
                }
                sim.tick();
            };
            let result = verify_determinism(2, 240, setup, step, |s| s.state_hash());
            prop_assert!(result.is_deterministic);
        }

        /// Point-in-polygon ignores the starting vertex and winding direction.
        #[test]
        fn prop_point_in_polygon_rotation_invariant(
            ring in strategies::arb_star_ring(),
            shift in 0usize..24,
            point in strategies::arb_position(),
        ) {
            let expected = point_in_polygon(point, &ring);
            let mut rotated = ring.clone();
            rotated.rotate_left(shift % ring.len());
            prop_assert_eq!(point_in_polygon(point, &rotated), expected);
            rotated.reverse();
            prop_assert_eq!(point_in_polygon(point, &rotated), expected);
        }

        /// Area is non-negative and invariant to winding and start offset.
        #[test]
        fn prop_area_invariant(ring in strategies::arb_star_ring(), shift in 0usize..24) {
            let area = polygon_area(&ring);
            prop_assert!(area >= 0.0);
            let mut rotated = ring.clone();
            rotated.rotate_left(shift % ring.len());
            rotated.reverse();
            prop_assert!((polygon_area(&rotated) - area).abs() <= 1e-9 * area.max(1.0));
        }

        /// A valid capture strictly grows territory and keeps it well formed.
        #[test]
        fn prop_capture_grows_territory((territory, trail) in strategies::arb_capture_case()) {
            let old = polygon_area(&territory);
            let result = capture(&territory, &trail, 1.0);
            prop_assert!(result.is_some());
            let result = result.unwrap();
            prop_assert!(polygon_area(&result.territory) >= old - 1.0);
            prop_assert!(result.area_delta > 0.0);
            prop_assert!(result.territory.len() >= 3);
        }

        /// Trimming a defender never leaves more land than the union.
        #[test]
        fn prop_difference_bounded_by_union((defender, capturer) in strategies::arb_ring_pair()) {
            let ops = GreinerHormann::default();
            let union = ops.union(&defender, &capturer);
            let difference = ops.difference(&defender, &capturer);
            prop_assume!(union.is_ok() && difference.is_ok());
            let union_area: f64 = union.unwrap().iter().map(|r| polygon_area(r)).sum();
            let kept: f64 = difference.unwrap().iter().map(|r| polygon_area(r)).sum();
            let tolerance = 1e-6 * union_area.max(1.0);
            prop_assert!(kept + polygon_area(&capturer) <= union_area + tolerance);
            prop_assert!(kept <= polygon_area(&defender) + tolerance);
        }

        /// The fuse never moves backwards and always catches its victim.
        #[test]
        fn prop_fuse_progress_monotone_and_finite(
            length in 10.0f64..2000.0,
            speed in 20.0f64..600.0,
            fleeing in any::<bool>(),
        ) {
            let config = SnipConfig::default();
            let dt = 1.0 / 60.0;
            let trail = [Vec2::ZERO, Vec2::new(length, 0.0)];
            let mut fuse = start_fuse(&trail, 0, Vec2::ZERO, trail[1], Some(2));
            prop_assert_eq!(fuse.progress, 0.0);
            prop_assert_eq!(fuse.elapsed, 0.0);

            let moved = if fleeing { speed * dt } else { 0.0 };
            let mut caught = false;
            for _ in 0..20_000 {
                let before = fuse.progress;
                caught = advance(&mut fuse, speed, moved, dt, &config);
                prop_assert!(fuse.progress >= before);
                prop_assert!(fuse.progress.is_finite());
                if caught {
                    break;
                }
            }
            prop_assert!(caught);
        }

        /// A trail owner standing in its own land cannot be snipped.
        #[test]
        fn prop_player_in_own_territory_is_never_snipped(
            p in strategies::arb_position(),
            heading in strategies::arb_heading(),
        ) {
            let config = live_config();
            let mut victim = Player::spawn(1, p, &config);
            victim.position = victim.spawn_point;
            prop_assume!(victim.in_own_territory());
            victim.state = PlayerState::Trailing;
            let reach = Vec2::from_angle(heading) * 40.0;
            victim.trail = vec![victim.position - reach, victim.position + reach];

            let mut hitter = Player::spawn(2, p, &config);
            hitter.position = victim.position;
            hitter.state = PlayerState::Safe;

            let report = detect(&[&victim, &hitter], &config.trail, config.territory.area_epsilon);
            prop_assert!(report.trail_hits.iter().all(|hit| hit.victim != 1));
        }

        /// Spawning anywhere on the map gives a player standing in its own land.
        #[test]
        fn prop_spawn_is_safe(p in strategies::arb_position()) {
            let mut sim = Simulation::new(live_config());
            let id = sim.spawn_player(p).unwrap();
            prop_assert!(sim.get_player(id).unwrap().in_own_territory());
        }
    }

    // =========================================================================
    // Stress tests (only run explicitly with --ignored)
    // =========================================================================

    #[test]
    #[ignore = "Long-running stress test"]
    fn stress_test_many_players() {
        let result = verify_determinism(3, 3000, || grid_arena(36, 200.0), loops, |s| s.state_hash());
        result.assert_deterministic();
    }

    #[test]
    #[ignore = "Long-running stress test"]
    fn stress_test_parallel_many_simulations() {
        let result = run_parallel_simulations_scoped(|| grid_arena(16, 200.0), loops, 16, 2000);
        result.assert_deterministic();
    }
}
