//! Scripted bot strategies for headless playtesting.
//!
//! A bot only ever does what a networked client could do: pick a target
//! heading each tick.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};
use territory_core::components::{Player, PlayerId, PlayerState};
use territory_core::math::Vec2;
use territory_core::simulation::Simulation;

use crate::spawn_generator::SpawnRng;

/// How far a hunter looks for trails to cut.
const HUNT_RADIUS: f64 = 600.0;

/// Radius of the orbit bots fly while waiting at home.
const ORBIT_RADIUS: f64 = 25.0;

/// How far ahead on the orbit a waiting bot aims, in radians.
const ORBIT_LEAD: f64 = 0.8;

/// A bot behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Strategy {
    /// Square loops out of home territory, one leg every `leg_ticks`.
    Looper {
        /// Ticks per side of the loop.
        leg_ticks: u64,
    },
    /// Random turns; heads home after `max_outside_secs`.
    Wanderer {
        /// Ticks between heading changes.
        turn_interval: u64,
        /// Longest excursion before returning.
        max_outside_secs: f64,
    },
    /// Chases the nearest enemy trail to snip it.
    Hunter {
        /// Longest excursion before returning.
        max_outside_secs: f64,
    },
    /// Circles at home and never captures.
    Idle,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Looper { leg_ticks: 40 }
    }
}

impl Strategy {
    /// Short name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Looper { .. } => "looper",
            Self::Wanderer { .. } => "wanderer",
            Self::Hunter { .. } => "hunter",
            Self::Idle => "idle",
        }
    }
}

/// Per-bot decision state.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    strategy: Strategy,
    rng: SpawnRng,
    wander_heading: f64,
}

impl StrategyExecutor {
    /// Create an executor with its own seeded RNG.
    #[must_use]
    pub fn new(strategy: Strategy, seed: u64) -> Self {
        Self {
            strategy,
            rng: SpawnRng::new(seed),
            wander_heading: 0.0,
        }
    }

    /// The strategy being executed.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Choose a target heading for `me`.
    pub fn decide(&mut self, me: &Player, sim: &Simulation) -> f64 {
        let tick = sim.get_tick();
        let home = me.spawn_point;
        match self.strategy {
            Strategy::Looper { leg_ticks } => loop_heading(tick, leg_ticks, u64::from(me.id)),
            Strategy::Wanderer {
                turn_interval,
                max_outside_secs,
            } => {
                if me.time_outside > max_outside_secs || me.is_snipped() {
                    return heading_to(me.position, home);
                }
                if tick % turn_interval.max(1) == 0 {
                    self.wander_heading = me.heading + self.rng.next_range(-1.2, 1.2);
                }
                self.wander_heading
            }
            Strategy::Hunter { max_outside_secs } => {
                if me.time_outside > max_outside_secs || me.is_snipped() {
                    return heading_to(me.position, home);
                }
                match nearest_enemy_trail(me, sim) {
                    Some(target) => heading_to(me.position, target),
                    None if matches!(me.state, PlayerState::Safe) => orbit_heading(me),
                    None => heading_to(me.position, home),
                }
            }
            Strategy::Idle => orbit_heading(me),
        }
    }
}

/// Heading of a square loop: east, north, west, south, each leg lasting
/// `leg_ticks`. `phase` shifts the starting leg.
#[must_use]
pub fn loop_heading(tick: u64, leg_ticks: u64, phase: u64) -> f64 {
    match (tick / leg_ticks.max(1) + phase) % 4 {
        0 => 0.0,
        1 => FRAC_PI_2,
        2 => PI,
        _ => -FRAC_PI_2,
    }
}

/// Heading from `from` towards `to`.
#[must_use]
pub fn heading_to(from: Vec2, to: Vec2) -> f64 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Heading that keeps `me` circling close to its spawn point.
fn orbit_heading(me: &Player) -> f64 {
    let offset = me.position - me.spawn_point;
    let around = offset.y.atan2(offset.x) + ORBIT_LEAD;
    heading_to(me.position, me.spawn_point + Vec2::from_angle(around) * ORBIT_RADIUS)
}

/// Closest trail point of another trailing player within hunting range.
fn nearest_enemy_trail(me: &Player, sim: &Simulation) -> Option<Vec2> {
    let mut best: Option<(f64, PlayerId, Vec2)> = None;
    for other in sim.players().sorted() {
        if other.id == me.id || !matches!(other.state, PlayerState::Trailing) {
            continue;
        }
        for &point in &other.trail {
            let d = me.position.distance(point);
            if d <= HUNT_RADIUS && best.map_or(true, |(bd, _, _)| d < bd) {
                best = Some((d, other.id, point));
            }
        }
    }
    best.map(|(_, _, p)| p)
}
