//! Discrete events emitted by a simulation tick.
//!
//! Renderers, audio, networking and progression UIs consume these. The
//! simulation never reads them back.

use serde::{Deserialize, Serialize};

use crate::components::{KillType, PlayerId};
use crate::math::Vec2;

/// Territory grew after a trail closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// Capturing player.
    pub player: PlayerId,
    /// Area gained.
    pub area_delta: f64,
    /// Rough centre of the captured loop.
    pub location: Vec2,
}

/// A player was eliminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillEvent {
    /// Credited player. `None` for self-snips.
    pub attacker: Option<PlayerId>,
    /// Eliminated player.
    pub victim: PlayerId,
    /// Cause.
    pub kill_type: KillType,
}

/// A player gained a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpEvent {
    /// Player.
    pub player: PlayerId,
    /// Level reached.
    pub new_level: u32,
}

/// A drone fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitscanEvent {
    /// Drone position.
    pub from: Vec2,
    /// Target position.
    pub to: Vec2,
    /// Damage dealt.
    pub damage: f64,
    /// Drone owner.
    pub owner: PlayerId,
    /// Player hit.
    pub target: PlayerId,
}

/// Snip lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnipEvent {
    /// A fuse was lit on `victim`'s trail.
    Started {
        /// Snipped player.
        victim: PlayerId,
        /// Player that touched the trail. `None` for a self-hit.
        attacker: Option<PlayerId>,
        /// Where the trail was touched.
        point: Vec2,
    },
    /// The victim reached its territory before the fuse.
    Escaped {
        /// Player that escaped.
        victim: PlayerId,
    },
}

/// Per-tick fuse status of a snipped player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuseProgress {
    /// Snipped player.
    pub victim: PlayerId,
    /// Distance covered.
    pub progress: f64,
    /// Distance to cover.
    pub total_length: f64,
    /// Fuse position on the trail.
    pub position: Vec2,
}

/// Events generated during a simulation tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Successful captures.
    pub captures: Vec<CaptureEvent>,
    /// Eliminations, at most one per victim.
    pub kills: Vec<KillEvent>,
    /// Level ups.
    pub level_ups: Vec<LevelUpEvent>,
    /// Drone shots.
    pub hitscans: Vec<HitscanEvent>,
    /// Snip starts and escapes.
    pub snips: Vec<SnipEvent>,
    /// Fuse status of every snipped player still alive.
    pub fuses: Vec<FuseProgress>,
    /// Players whose territory ring changed.
    pub territory_changed: Vec<PlayerId>,
    /// Players whose trail changed.
    pub trail_changed: Vec<PlayerId>,
}

impl TickEvents {
    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
            && self.kills.is_empty()
            && self.level_ups.is_empty()
            && self.hitscans.is_empty()
            && self.snips.is_empty()
            && self.fuses.is_empty()
            && self.territory_changed.is_empty()
            && self.trail_changed.is_empty()
    }

    /// Record a territory change once.
    pub fn mark_territory(&mut self, id: PlayerId) {
        if !self.territory_changed.contains(&id) {
            self.territory_changed.push(id);
        }
    }

    /// Record a trail change once.
    pub fn mark_trail(&mut self, id: PlayerId) {
        if !self.trail_changed.contains(&id) {
            self.trail_changed.push(id);
        }
    }

    /// Whether `victim` was already eliminated this tick.
    #[must_use]
    pub fn is_killed(&self, victim: PlayerId) -> bool {
        self.kills.iter().any(|kill| kill.victim == victim)
    }
}
