//! Player data.
//!
//! Components are pure data. Movement and state transitions live in
//! [`crate::player`], fuse math in [`crate::snip`].

use serde::{Deserialize, Serialize};

use crate::geometry::{point_in_polygon, polygon_area, Ring};
use crate::math::Vec2;

/// Stable player identifier. Never reused within one simulation.
pub type PlayerId = u32;

// ============================================================================
// Player State
// ============================================================================

/// Lifecycle state of a player.
///
/// `Spawning -> Safe <-> Trailing -> Snipped -> Safe`, and any state can end
/// in `Dead`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerState {
    /// Countdown before control goes live. Immune to collisions.
    Spawning {
        /// Seconds left.
        remaining: f64,
    },
    /// Inside own territory.
    Safe,
    /// Outside own territory, recording a trail.
    Trailing,
    /// A fuse is racing along the trail.
    Snipped(Fuse),
    /// Eliminated. Terminal until respawn.
    Dead,
}

impl PlayerState {
    /// Short name used in logs and JSON output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Spawning { .. } => "spawning",
            Self::Safe => "safe",
            Self::Trailing => "trailing",
            Self::Snipped(_) => "snipped",
            Self::Dead => "dead",
        }
    }
}

/// Pursuit point advancing along a snipped player's trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fuse {
    /// Player whose avatar touched the trail. `None` for a self-hit.
    pub attacker: Option<PlayerId>,
    /// Where the trail was touched.
    pub collision_point: Vec2,
    /// Index of the trail segment containing `collision_point`.
    pub segment_index: usize,
    /// Seconds since the snip started.
    pub elapsed: f64,
    /// Distance the fuse has covered.
    pub progress: f64,
    /// Trail length from `collision_point` to the victim's position.
    /// Grows as the victim keeps moving.
    pub total_length: f64,
    /// Fuse speed applied on the last tick.
    pub speed: f64,
}

impl Fuse {
    /// Distance between the fuse and the victim along the trail.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        (self.total_length - self.progress).max(0.0)
    }
}

// ============================================================================
// Combat Types
// ============================================================================

/// How a player was eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillType {
    /// Caught by a snip fuse.
    Trail,
    /// Lost a body collision.
    Body,
    /// Territory consumed, or avatar stranded inside an enemy capture.
    Trap,
    /// Drone damage brought HP to zero.
    Hp,
}

/// Orbiting hitscan drone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    /// Orbit angle around the owner in radians.
    pub angle: f64,
    /// Durability. Nothing damages drones yet, so this stays at its spawn value.
    pub hp: f64,
    /// Seconds until the drone may fire again.
    pub cooldown: f64,
    /// Target of the last shot.
    pub target: Option<PlayerId>,
}

// ============================================================================
// Player
// ============================================================================

/// A player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Centre of the spawn polygon. Overlap resolution prefers the
    /// territory piece containing it.
    pub spawn_point: Vec2,
    /// Avatar position.
    pub position: Vec2,
    /// Current heading in radians.
    pub heading: f64,
    /// Heading requested by input.
    pub target_heading: f64,
    /// Linear speed before multipliers.
    pub base_speed: f64,
    /// Trailing speed bonus, `1.0` when not trailing.
    pub speed_multiplier: f64,
    /// Seconds continuously spent outside territory.
    pub time_outside: f64,
    /// Owned polygon. Empty once dead.
    pub territory: Ring,
    /// Points recorded since leaving territory.
    pub trail: Vec<Vec2>,
    /// Hit points.
    pub hp: f64,
    /// Hit point ceiling.
    pub max_hp: f64,
    /// Level, starting at 1.
    pub level: u32,
    /// Experience toward the next level.
    pub xp: f64,
    /// Credited eliminations.
    pub kills: u32,
    /// Lifecycle state.
    pub state: PlayerState,
    /// Orbiting drones.
    pub drones: Vec<Drone>,
}

impl Player {
    /// Whether the player is not dead.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !matches!(self.state, PlayerState::Dead)
    }

    /// Whether the spawn countdown is running.
    #[must_use]
    pub const fn is_spawning(&self) -> bool {
        matches!(self.state, PlayerState::Spawning { .. })
    }

    /// Active fuse, if snipped.
    #[must_use]
    pub const fn fuse(&self) -> Option<&Fuse> {
        match &self.state {
            PlayerState::Snipped(fuse) => Some(fuse),
            _ => None,
        }
    }

    /// Whether the player is snipped.
    #[must_use]
    pub const fn is_snipped(&self) -> bool {
        matches!(self.state, PlayerState::Snipped(_))
    }

    /// Whether the avatar stands inside its own territory.
    #[must_use]
    pub fn in_own_territory(&self) -> bool {
        point_in_polygon(self.position, &self.territory)
    }

    /// Territory area.
    #[must_use]
    pub fn territory_area(&self) -> f64 {
        polygon_area(&self.territory)
    }

    /// Effective linear speed in pixels per second.
    #[must_use]
    pub fn current_speed(&self) -> f64 {
        self.base_speed * self.speed_multiplier
    }
}
