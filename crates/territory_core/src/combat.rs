//! Drone combat.
//!
//! Each level grants one orbiting drone up to a cap. A ready drone shoots the
//! nearest enemy in range with instant hitscan damage. Shots are returned as
//! events; the simulation applies their damage after every drone has fired.

use std::f64::consts::TAU;

use crate::components::{Drone, Player, PlayerId};
use crate::config::CombatConfig;
use crate::events::HitscanEvent;
use crate::math::{wrap_angle, Vec2};

/// Cooldown at or below this counts as ready.
const READY_EPSILON: f64 = 1e-9;

/// Drones granted at `level`.
#[must_use]
pub fn drone_count(level: u32, config: &CombatConfig) -> usize {
    (level as usize).min(config.max_drones)
}

/// Damage of the drone at `index`.
///
/// The first drone deals full damage. Every further drone deals
/// `base * extra_damage_multiplier * damage_decay^(index - 1)`.
#[must_use]
pub fn drone_damage(index: usize, config: &CombatConfig) -> f64 {
    if index == 0 {
        return config.base_damage;
    }
    let decay = config.damage_decay.powi(i32::try_from(index - 1).unwrap_or(i32::MAX));
    config.base_damage * config.extra_damage_multiplier * decay
}

/// Resize `player.drones` to match its level and spread them evenly around
/// the orbit. Existing cooldowns are kept.
pub fn sync_drones(player: &mut Player, config: &CombatConfig) {
    let count = drone_count(player.level, config);
    let base = player.drones.first().map_or(0.0, |d| d.angle);
    player.drones.resize(
        count,
        Drone {
            angle: 0.0,
            hp: config.drone_hp,
            cooldown: 0.0,
            target: None,
        },
    );
    for (index, drone) in player.drones.iter_mut().enumerate() {
        drone.angle = wrap_angle(base + TAU * index as f64 / count as f64);
    }
}

/// World position of a drone orbiting `owner`.
#[must_use]
pub fn drone_position(owner: Vec2, drone: &Drone, orbit_radius: f64) -> Vec2 {
    owner + Vec2::from_angle(drone.angle) * orbit_radius
}

/// Orbit, cool down and fire `owner`'s drones.
///
/// `targets` holds the id and position of every player that can be hit,
/// sorted by id. Drones of a snipped or spawning owner are inert.
pub fn fire_drones(
    owner: &mut Player,
    targets: &[(PlayerId, Vec2)],
    dt: f64,
    config: &CombatConfig,
) -> Vec<HitscanEvent> {
    let mut shots = Vec::new();
    if !owner.is_alive() || owner.is_spawning() || owner.is_snipped() {
        return shots;
    }
    let origin = owner.position;
    let owner_id = owner.id;
    let range_sq = config.range * config.range;

    for (index, drone) in owner.drones.iter_mut().enumerate() {
        drone.angle = wrap_angle(drone.angle + config.orbit_speed * dt);
        drone.cooldown = (drone.cooldown - dt).max(0.0);
        if drone.cooldown > READY_EPSILON {
            continue;
        }

        let from = drone_position(origin, drone, config.orbit_radius);
        let mut nearest: Option<(f64, PlayerId, Vec2)> = None;
        for &(id, position) in targets {
            if id == owner_id {
                continue;
            }
            let d = from.distance_squared(position);
            if d <= range_sq && nearest.map_or(true, |(best, _, _)| d < best) {
                nearest = Some((d, id, position));
            }
        }

        drone.target = nearest.map(|(_, id, _)| id);
        if let Some((_, target, to)) = nearest {
            shots.push(HitscanEvent {
                from,
                to,
                damage: drone_damage(index, config),
                owner: owner_id,
                target,
            });
            drone.cooldown = config.cooldown_secs;
        }
    }
    shots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PlayerState;
    use crate::config::SimConfig;

    fn armed(level: u32) -> (Player, SimConfig) {
        let mut config = SimConfig::default();
        config.movement.spawn_countdown_secs = 0.0;
        let mut player = Player::spawn(1, Vec2::new(500.0, 500.0), &config);
        player.level = level;
        sync_drones(&mut player, &config.combat);
        (player, config)
    }

    #[test]
    fn test_drone_count_capped() {
        let config = CombatConfig::default();
        assert_eq!(drone_count(1, &config), 1);
        assert_eq!(drone_count(3, &config), 3);
        assert_eq!(drone_count(50, &config), config.max_drones);
    }

    #[test]
    fn test_damage_diminishes() {
        let config = CombatConfig::default();
        let d0 = drone_damage(0, &config);
        let d1 = drone_damage(1, &config);
        let d2 = drone_damage(2, &config);
        assert_eq!(d0, config.base_damage);
        assert_eq!(d1, config.base_damage * config.extra_damage_multiplier);
        assert_eq!(d2, config.base_damage * config.extra_damage_multiplier * config.damage_decay);
        assert!(d0 > d1 && d1 > d2);
    }

    #[test]
    fn test_drones_spread_evenly() {
        let (player, _) = armed(4);
        assert_eq!(player.drones.len(), 4);
        let gap = wrap_angle(player.drones[1].angle - player.drones[0].angle);
        assert!((gap - TAU / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_new_drones_start_at_full_hp() {
        let (mut player, config) = armed(2);
        player.drones[0].hp = 1.0;
        player.level = 3;
        sync_drones(&mut player, &config.combat);
        assert_eq!(player.drones.len(), 3);
        assert_eq!(player.drones[0].hp, 1.0);
        assert_eq!(player.drones[1].hp, config.combat.drone_hp);
        assert_eq!(player.drones[2].hp, config.combat.drone_hp);
    }

    #[test]
    fn test_fires_at_nearest_enemy_in_range() {
        let (mut player, config) = armed(1);
        let targets = [
            (1, player.position),
            (2, Vec2::new(600.0, 500.0)),
            (3, Vec2::new(560.0, 500.0)),
            (4, Vec2::new(2000.0, 500.0)),
        ];
        let shots = fire_drones(&mut player, &targets, config.dt(), &config.combat);
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].target, 3);
        assert_eq!(shots[0].owner, 1);
        assert_eq!(player.drones[0].target, Some(3));
        assert_eq!(player.drones[0].cooldown, config.combat.cooldown_secs);

        // Cooling down
        let shots = fire_drones(&mut player, &targets, config.dt(), &config.combat);
        assert!(shots.is_empty());
    }

    #[test]
    fn test_no_target_in_range() {
        let (mut player, config) = armed(2);
        let targets = [(9, Vec2::new(2500.0, 2500.0))];
        assert!(fire_drones(&mut player, &targets, config.dt(), &config.combat).is_empty());
        assert!(player.drones.iter().all(|d| d.target.is_none()));
    }

    #[test]
    fn test_inert_while_snipped() {
        let (mut player, config) = armed(3);
        player.state = PlayerState::Snipped(crate::snip::start_fuse(
            &[Vec2::ZERO, Vec2::new(10.0, 0.0)],
            0,
            Vec2::ZERO,
            player.position,
            None,
        ));
        let targets = [(2, Vec2::new(520.0, 500.0))];
        let before = player.drones.clone();
        assert!(fire_drones(&mut player, &targets, config.dt(), &config.combat).is_empty());
        assert_eq!(player.drones, before);
    }
}
