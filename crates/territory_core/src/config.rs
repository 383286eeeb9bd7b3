//! Simulation tuning.
//!
//! Every balance knob lives here, including the fuse constants, so matches
//! can be retuned from a RON file without recompiling. Each field carries a
//! serde default, which lets a RON file override only what it cares about.
//!
//! **Note:** This module contains no IO - it only parses text handed to it.
//! File loading is handled by `territory_headless`.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     world: (width: 2000.0, height: 2000.0, tick_rate: 60),
//!     snip: (acceleration: 0.9, grace_secs: 0.25),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Map and clock.
    pub world: WorldConfig,
    /// Steering and speed.
    pub movement: MovementConfig,
    /// Spawn territory and area tolerances.
    pub territory: TerritoryConfig,
    /// Trail recording and hit radius.
    pub trail: TrailConfig,
    /// Snip fuse pursuit.
    pub snip: SnipConfig,
    /// Drones and hit points.
    pub combat: CombatConfig,
    /// Experience and levels.
    pub progression: ProgressionConfig,
}

impl SimConfig {
    /// Parse from RON text and validate.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize config: {e}")))
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> f64 {
        1.0 / f64::from(self.world.tick_rate)
    }

    /// Reject values that would stall or explode the simulation.
    pub fn validate(&self) -> Result<()> {
        fn positive(field: &'static str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(GameError::InvalidConfig {
                    field,
                    message: format!("must be positive, got {value}"),
                })
            }
        }
        fn non_negative(field: &'static str, value: f64) -> Result<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(GameError::InvalidConfig {
                    field,
                    message: format!("must be non-negative, got {value}"),
                })
            }
        }

        positive("world.width", self.world.width)?;
        positive("world.height", self.world.height)?;
        if self.world.tick_rate == 0 {
            return Err(GameError::InvalidConfig {
                field: "world.tick_rate",
                message: "must be at least 1".to_string(),
            });
        }
        positive("movement.base_speed", self.movement.base_speed)?;
        positive("movement.turn_rate", self.movement.turn_rate)?;
        if self.movement.trail_speed_max_multiplier < 1.0 {
            return Err(GameError::InvalidConfig {
                field: "movement.trail_speed_max_multiplier",
                message: "must be at least 1.0".to_string(),
            });
        }
        positive("movement.trail_speed_ramp_secs", self.movement.trail_speed_ramp_secs)?;
        non_negative("movement.spawn_countdown_secs", self.movement.spawn_countdown_secs)?;
        positive("territory.spawn_radius", self.territory.spawn_radius)?;
        if self.territory.spawn_sides < 3 {
            return Err(GameError::InvalidConfig {
                field: "territory.spawn_sides",
                message: "must be at least 3".to_string(),
            });
        }
        non_negative("territory.area_epsilon", self.territory.area_epsilon)?;
        positive("trail.min_point_spacing", self.trail.min_point_spacing)?;
        positive("trail.avatar_radius", self.trail.avatar_radius)?;
        if !(self.snip.fuse_speed_multiplier > 1.0) {
            return Err(GameError::InvalidConfig {
                field: "snip.fuse_speed_multiplier",
                message: "fuse must start faster than its victim".to_string(),
            });
        }
        non_negative("snip.acceleration", self.snip.acceleration)?;
        non_negative("snip.grace_secs", self.snip.grace_secs)?;
        if !(self.snip.speed_cap_multiple >= self.snip.fuse_speed_multiplier) {
            return Err(GameError::InvalidConfig {
                field: "snip.speed_cap_multiple",
                message: "must be at least fuse_speed_multiplier".to_string(),
            });
        }
        positive("combat.base_hp", self.combat.base_hp)?;
        positive("combat.drone_hp", self.combat.drone_hp)?;
        positive("combat.cooldown_secs", self.combat.cooldown_secs)?;
        non_negative("combat.range", self.combat.range)?;
        non_negative("combat.damage_decay", self.combat.damage_decay)?;
        positive("progression.level_xp_base", self.progression.level_xp_base)?;
        if self.progression.level_xp_growth < 1.0 {
            return Err(GameError::InvalidConfig {
                field: "progression.level_xp_growth",
                message: "must be at least 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Map bounds and clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Map width in pixels; x spans `[0, width]`.
    pub width: f64,
    /// Map height in pixels; y spans `[0, height]`.
    pub height: f64,
    /// Fixed ticks per second.
    pub tick_rate: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 3000.0,
            height: 3000.0,
            tick_rate: 60,
        }
    }
}

/// Steering and speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Linear speed in pixels per second.
    pub base_speed: f64,
    /// Maximum heading change in radians per second.
    pub turn_rate: f64,
    /// Speed multiplier reached after a long stretch outside territory.
    pub trail_speed_max_multiplier: f64,
    /// Seconds outside territory to reach the full multiplier.
    pub trail_speed_ramp_secs: f64,
    /// Countdown before a freshly spawned player takes input.
    pub spawn_countdown_secs: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            base_speed: 180.0,
            turn_rate: 6.0,
            trail_speed_max_multiplier: 1.35,
            trail_speed_ramp_secs: 5.0,
            spawn_countdown_secs: 1.5,
        }
    }
}

/// Spawn territory shape and area tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryConfig {
    /// Radius of the spawn polygon.
    pub spawn_radius: f64,
    /// Vertex count of the spawn polygon.
    pub spawn_sides: usize,
    /// Area tolerance for capture guards and body-collision ties.
    pub area_epsilon: f64,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            spawn_radius: 60.0,
            spawn_sides: 12,
            area_epsilon: 1.0,
        }
    }
}

/// Trail recording and hit radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Minimum distance between recorded trail points.
    pub min_point_spacing: f64,
    /// Avatar radius used for trail hits and body collisions.
    pub avatar_radius: f64,
    /// Most recent own-trail segments ignored for self hits.
    pub self_hit_ignore_segments: usize,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            min_point_spacing: 6.0,
            avatar_radius: 8.0,
            self_hit_ignore_segments: 3,
        }
    }
}

/// Fuse pursuit constants.
///
/// Fuse speed is `v0 * exp(acceleration * max(0, elapsed - grace))` with
/// `v0 = victim speed * fuse_speed_multiplier`, capped at
/// `victim speed * speed_cap_multiple`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnipConfig {
    /// Fuse starts this many times faster than the victim.
    pub fuse_speed_multiplier: f64,
    /// Exponential acceleration rate `k` per second.
    pub acceleration: f64,
    /// Reaction window during which the fuse does not advance.
    pub grace_secs: f64,
    /// Fuse speed ceiling as a multiple of the victim's current speed.
    pub speed_cap_multiple: f64,
}

impl Default for SnipConfig {
    fn default() -> Self {
        Self {
            fuse_speed_multiplier: 1.15,
            acceleration: 0.6,
            grace_secs: 0.3,
            speed_cap_multiple: 3.0,
        }
    }
}

/// Drones and hit points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Drone count cap regardless of level.
    pub max_drones: usize,
    /// Orbit radius around the owner.
    pub orbit_radius: f64,
    /// Orbit angular speed in radians per second.
    pub orbit_speed: f64,
    /// Targeting range measured from the drone.
    pub range: f64,
    /// Seconds between shots of one drone.
    pub cooldown_secs: f64,
    /// Damage of the first drone.
    pub base_damage: f64,
    /// Multiplier applied to every drone after the first.
    pub extra_damage_multiplier: f64,
    /// Per-drone decay applied from the third drone on.
    pub damage_decay: f64,
    /// HP of a freshly granted drone.
    pub drone_hp: f64,
    /// Starting max HP.
    pub base_hp: f64,
    /// Max HP gained per level.
    pub hp_per_level: f64,
    /// HP regenerated per second while inside own territory.
    pub regen_per_sec: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_drones: 5,
            orbit_radius: 28.0,
            orbit_speed: 2.5,
            range: 160.0,
            cooldown_secs: 0.5,
            base_damage: 10.0,
            extra_damage_multiplier: 0.8,
            damage_decay: 0.75,
            drone_hp: 50.0,
            base_hp: 100.0,
            hp_per_level: 10.0,
            regen_per_sec: 8.0,
        }
    }
}

/// Experience and levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// XP per square pixel of captured area.
    pub xp_per_area: f64,
    /// XP for a credited kill.
    pub xp_per_kill: f64,
    /// XP needed to go from level 1 to 2.
    pub level_xp_base: f64,
    /// Growth factor of the requirement per level.
    pub level_xp_growth: f64,
    /// Level cap.
    pub max_level: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_area: 0.01,
            xp_per_kill: 50.0,
            level_xp_base: 100.0,
            level_xp_growth: 1.5,
            max_level: 20,
        }
    }
}
