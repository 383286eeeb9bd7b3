//! Experience and levels.
//!
//! XP comes from captured area and from credited kills. The XP needed for
//! the next level grows geometrically. A level up adds a drone (up to the
//! cap) and raises max HP.

use tracing::debug;

use crate::combat::sync_drones;
use crate::components::Player;
use crate::config::{ProgressionConfig, SimConfig};
use crate::events::LevelUpEvent;

/// XP needed to go from `level` to `level + 1`.
#[must_use]
pub fn xp_to_next(level: u32, config: &ProgressionConfig) -> f64 {
    let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
    config.level_xp_base * config.level_xp_growth.powi(exponent)
}

/// XP granted for capturing `area_delta` square pixels.
#[must_use]
pub fn capture_xp(area_delta: f64, config: &ProgressionConfig) -> f64 {
    area_delta.max(0.0) * config.xp_per_area
}

/// Add XP and apply any level ups.
pub fn award_xp(player: &mut Player, amount: f64, config: &SimConfig) -> Vec<LevelUpEvent> {
    let mut level_ups = Vec::new();
    if !player.is_alive() || !(amount > 0.0) {
        return level_ups;
    }
    player.xp += amount;
    while player.level < config.progression.max_level {
        let needed = xp_to_next(player.level, &config.progression);
        if player.xp < needed {
            break;
        }
        player.xp -= needed;
        player.level += 1;
        player.max_hp += config.combat.hp_per_level;
        player.hp += config.combat.hp_per_level;
        debug!(player = player.id, level = player.level, "Level up");
        level_ups.push(LevelUpEvent {
            player: player.id,
            new_level: player.level,
        });
    }
    if !level_ups.is_empty() {
        sync_drones(player, &config.combat);
    }
    level_ups
}
