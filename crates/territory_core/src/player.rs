//! Player construction and the per-tick movement integrator.
//!
//! A player only ever mutates its own record here. Effects on other players
//! (captures eating territory, collisions, drone fire) are decided by the
//! simulation step.

use crate::combat::sync_drones;
use crate::components::{Player, PlayerId, PlayerState};
use crate::config::{MovementConfig, SimConfig, WorldConfig};
use crate::geometry::regular_polygon;
use crate::math::{ease_out, turn_toward, Vec2};

/// State change caused by one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    None,
    /// Spawn countdown ran out.
    SpawnFinished,
    /// Safe -> Trailing.
    LeftTerritory,
    /// Trailing -> Safe. The trail is ready for capture.
    Returned,
    /// Snipped -> Safe. The trail was discarded.
    Escaped,
}

/// Outcome of [`Player::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Distance travelled this tick.
    pub distance: f64,
    /// Whether trail points were added or removed.
    pub trail_changed: bool,
    /// State change, if any.
    pub transition: Transition,
}

impl Step {
    const IDLE: Self = Self {
        distance: 0.0,
        trail_changed: false,
        transition: Transition::None,
    };
}

impl Player {
    /// Create a player at `position` with a fresh spawn polygon.
    #[must_use]
    pub fn spawn(id: PlayerId, position: Vec2, config: &SimConfig) -> Self {
        let mut player = Self {
            id,
            spawn_point: position,
            position,
            heading: 0.0,
            target_heading: 0.0,
            base_speed: config.movement.base_speed,
            speed_multiplier: 1.0,
            time_outside: 0.0,
            territory: Vec::new(),
            trail: Vec::new(),
            hp: config.combat.base_hp,
            max_hp: config.combat.base_hp,
            level: 1,
            xp: 0.0,
            kills: 0,
            state: PlayerState::Dead,
            drones: Vec::new(),
        };
        player.reset_at(position, config);
        player
    }

    /// Put the player back at `position` as if freshly spawned.
    ///
    /// Heading and target heading are kept.
    pub fn reset_at(&mut self, position: Vec2, config: &SimConfig) {
        self.spawn_point = position;
        self.position = position;
        self.base_speed = config.movement.base_speed;
        self.speed_multiplier = 1.0;
        self.time_outside = 0.0;
        self.territory = regular_polygon(
            position,
            config.territory.spawn_radius,
            config.territory.spawn_sides,
        );
        self.trail.clear();
        self.hp = config.combat.base_hp;
        self.max_hp = config.combat.base_hp;
        self.level = 1;
        self.xp = 0.0;
        self.kills = 0;
        self.state = if config.movement.spawn_countdown_secs > 0.0 {
            PlayerState::Spawning {
                remaining: config.movement.spawn_countdown_secs,
            }
        } else {
            PlayerState::Safe
        };
        self.drones.clear();
        sync_drones(self, &config.combat);
    }

    /// Trailing speed bonus after `time_outside` seconds outside territory.
    #[must_use]
    pub fn trail_speed_multiplier(time_outside: f64, movement: &MovementConfig) -> f64 {
        let ramp = ease_out(time_outside / movement.trail_speed_ramp_secs);
        1.0 + (movement.trail_speed_max_multiplier - 1.0) * ramp
    }

    /// Advance one tick: turn, move, clamp, then update the state machine.
    ///
    /// Fuse advancement is not handled here; see [`crate::snip`].
    pub fn step(&mut self, config: &SimConfig, dt: f64) -> Step {
        match self.state {
            PlayerState::Dead => return Step::IDLE,
            PlayerState::Spawning { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.state = PlayerState::Safe;
                    return Step {
                        transition: Transition::SpawnFinished,
                        ..Step::IDLE
                    };
                }
                self.state = PlayerState::Spawning { remaining };
                return Step::IDLE;
            }
            _ => {}
        }

        if matches!(self.state, PlayerState::Trailing) {
            self.time_outside += dt;
            self.speed_multiplier = Self::trail_speed_multiplier(self.time_outside, &config.movement);
        } else {
            self.speed_multiplier = 1.0;
        }

        self.heading = turn_toward(
            self.heading,
            self.target_heading,
            config.movement.turn_rate * dt,
        );
        let previous = self.position;
        let next = previous + Vec2::from_angle(self.heading) * (self.current_speed() * dt);
        self.position = clamp_to_world(next, &config.world);

        let mut step = Step {
            distance: previous.distance(self.position),
            ..Step::IDLE
        };
        let inside = self.in_own_territory();

        match self.state {
            PlayerState::Safe => {
                if inside {
                    self.regenerate(config.combat.regen_per_sec, dt);
                } else {
                    self.state = PlayerState::Trailing;
                    self.time_outside = 0.0;
                    self.trail.clear();
                    self.trail.push(previous);
                    self.trail.push(self.position);
                    step.trail_changed = true;
                    step.transition = Transition::LeftTerritory;
                }
            }
            PlayerState::Trailing => {
                if inside {
                    self.trail.push(self.position);
                    self.state = PlayerState::Safe;
                    self.time_outside = 0.0;
                    self.speed_multiplier = 1.0;
                    step.trail_changed = true;
                    step.transition = Transition::Returned;
                } else {
                    step.trail_changed = self.record_trail_point(config.trail.min_point_spacing);
                }
            }
            PlayerState::Snipped(_) => {
                if inside {
                    self.state = PlayerState::Safe;
                    self.time_outside = 0.0;
                    self.trail.clear();
                    step.trail_changed = true;
                    step.transition = Transition::Escaped;
                } else {
                    step.trail_changed = self.record_trail_point(config.trail.min_point_spacing);
                }
            }
            PlayerState::Spawning { .. } | PlayerState::Dead => {}
        }
        step
    }

    /// Append the current position if it is far enough from the last point.
    pub fn record_trail_point(&mut self, min_spacing: f64) -> bool {
        let far_enough = self
            .trail
            .last()
            .map_or(true, |last| last.distance(self.position) >= min_spacing);
        if far_enough {
            self.trail.push(self.position);
        }
        far_enough
    }

    /// Regenerate HP, capped at `max_hp`.
    pub fn regenerate(&mut self, per_sec: f64, dt: f64) {
        self.hp = (self.hp + per_sec * dt).min(self.max_hp);
    }

    /// Mark as dead, dropping territory, trail and drones.
    pub fn eliminate(&mut self) {
        self.state = PlayerState::Dead;
        self.territory.clear();
        self.trail.clear();
        self.drones.clear();
        self.speed_multiplier = 1.0;
        self.time_outside = 0.0;
        self.hp = 0.0;
    }
}

/// Clamp a position into the map. Movement slides along the border.
#[must_use]
pub fn clamp_to_world(position: Vec2, world: &WorldConfig) -> Vec2 {
    Vec2::new(
        position.x.clamp(0.0, world.width),
        position.y.clamp(0.0, world.height),
    )
}
