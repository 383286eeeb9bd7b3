//! Test fixtures and helpers.
//!
//! Pre-built rings, configurations and steering scripts for consistent
//! testing.

use std::f64::consts::{FRAC_PI_2, PI};

use territory_core::config::SimConfig;
use territory_core::events::TickEvents;
use territory_core::geometry::Ring;
use territory_core::math::Vec2;
use territory_core::simulation::Simulation;

/// Default config with the spawn countdown disabled, so players move on
/// the first tick.
#[must_use]
pub fn live_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.movement.spawn_countdown_secs = 0.0;
    config
}

/// Axis-aligned rectangle, counter-clockwise.
#[must_use]
pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Ring {
    vec![
        Vec2::new(x0, y0),
        Vec2::new(x1, y0),
        Vec2::new(x1, y1),
        Vec2::new(x0, y1),
    ]
}

/// Square of side `size` centred on `center`.
#[must_use]
pub fn square(center: Vec2, size: f64) -> Ring {
    let h = size / 2.0;
    rect(center.x - h, center.y - h, center.x + h, center.y + h)
}

/// Heading of a square loop: east, north, west, south, each leg lasting
/// `leg_ticks`. `phase` shifts the starting leg.
#[must_use]
pub fn loop_heading(tick: u64, leg_ticks: u64, phase: u64) -> f64 {
    let leg = (tick / leg_ticks.max(1) + phase) % 4;
    match leg {
        0 => 0.0,
        1 => FRAC_PI_2,
        2 => PI,
        _ => -FRAC_PI_2,
    }
}

/// Steer every living player along a square loop and advance one tick.
///
/// Each player's loop is phase-shifted by its id so that trails cross.
pub fn step_loops(sim: &mut Simulation, leg_ticks: u64) -> TickEvents {
    let tick = sim.get_tick();
    for id in sim.players().sorted_ids() {
        let heading = loop_heading(tick, leg_ticks, u64::from(id));
        // Dead players reject input; that is fine here
        let _ = sim.set_target_heading(id, heading);
    }
    sim.tick()
}

/// A simulation with `count` players on a grid, spaced `spacing` apart.
#[must_use]
pub fn grid_arena(count: usize, spacing: f64) -> Simulation {
    let mut config = live_config();
    let columns = (count as f64).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(columns).max(1);
    config.world.width = spacing * (columns as f64 + 1.0);
    config.world.height = spacing * (rows as f64 + 1.0);

    let mut sim = Simulation::new(config);
    for i in 0..count {
        let x = spacing * ((i % columns) as f64 + 1.0);
        let y = spacing * ((i / columns) as f64 + 1.0);
        // Grid positions always lie inside the map
        let _ = sim.spawn_player(Vec2::new(x, y));
    }
    sim
}
