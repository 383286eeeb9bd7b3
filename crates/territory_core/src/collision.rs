//! Collision arbitration.
//!
//! Detection is a pure all-pairs scan over a snapshot of the players. It
//! returns what should happen; the simulation applies every result together
//! once the scan is done, so storage order never decides an outcome.

use std::collections::BTreeMap;

use crate::components::{KillType, Player, PlayerId, PlayerState};
use crate::config::TrailConfig;
use crate::events::KillEvent;
use crate::geometry::{closest_point_on_segment, point_in_polygon};
use crate::math::Vec2;

/// A trail touched by an avatar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailHit {
    /// Owner of the trail.
    pub victim: PlayerId,
    /// Avatar owner. `None` when the victim ran into its own trail.
    pub attacker: Option<PlayerId>,
    /// Index of the touched segment.
    pub segment_index: usize,
    /// Closest point on that segment.
    pub point: Vec2,
}

/// Everything found by one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// At most one trail hit per victim.
    pub trail_hits: Vec<TrailHit>,
    /// Body collision kills, in pair order.
    pub kills: Vec<KillEvent>,
}

/// Circle-circle overlap test for two avatars.
#[inline]
#[must_use]
pub fn bodies_touch(a: Vec2, b: Vec2, radius: f64) -> bool {
    let reach = radius * 2.0;
    a.distance_squared(b) < reach * reach
}

/// First segment of `trail` within `radius` of `position`, checking only the
/// first `trail.len() - 1 - ignore_last` segments.
///
/// Returns the segment index and the closest point on it. The nearest
/// segment wins; ties go to the lower index.
///
/// The first trail point is recorded inside the owner's territory, so the
/// first segment straddles the border. Contact points inside `land` are
/// not exposed trail and never count.
#[must_use]
pub fn trail_hit(
    position: Vec2,
    trail: &[Vec2],
    land: &[Vec2],
    radius: f64,
    ignore_last: usize,
) -> Option<(usize, Vec2)> {
    let segments = trail.len().saturating_sub(1).saturating_sub(ignore_last);
    let mut best: Option<(f64, usize, Vec2)> = None;
    for index in 0..segments {
        let (closest, _) = closest_point_on_segment(position, trail[index], trail[index + 1]);
        let distance = position.distance(closest);
        if distance > radius || point_in_polygon(closest, land) {
            continue;
        }
        if best.map_or(true, |(d, _, _)| distance < d) {
            best = Some((distance, index, closest));
        }
    }
    best.map(|(_, index, point)| (index, point))
}

/// Scan every pair of `players` (sorted by id) for trail hits and body
/// collisions.
///
/// `area_epsilon` is the tolerance below which two territories count as
/// equal in a body collision.
#[must_use]
pub fn detect(players: &[&Player], trail: &TrailConfig, area_epsilon: f64) -> CollisionReport {
    let mut report = CollisionReport::default();
    let active: Vec<&Player> = players
        .iter()
        .copied()
        .filter(|p| p.is_alive() && !p.is_spawning())
        .collect();

    let mut hits: BTreeMap<PlayerId, TrailHit> = BTreeMap::new();
    for victim in &active {
        if !matches!(victim.state, PlayerState::Trailing) || victim.trail.len() < 2 {
            continue;
        }
        if victim.in_own_territory() {
            continue;
        }
        for hitter in &active {
            if hitter.is_snipped() {
                continue;
            }
            let self_hit = hitter.id == victim.id;
            let ignore = if self_hit {
                trail.self_hit_ignore_segments
            } else {
                0
            };
            let Some((segment_index, point)) =
                trail_hit(hitter.position, &victim.trail, &victim.territory, trail.avatar_radius, ignore)
            else {
                continue;
            };
            let candidate = TrailHit {
                victim: victim.id,
                attacker: (!self_hit).then_some(hitter.id),
                segment_index,
                point,
            };
            match hits.get(&victim.id) {
                // Crediting another player beats a self-hit; otherwise lowest id
                Some(existing) if existing.attacker.is_some() || candidate.attacker.is_none() => {}
                _ => {
                    hits.insert(victim.id, candidate);
                }
            }
        }
    }
    report.trail_hits = hits.into_values().collect();

    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if !bodies_touch(a.position, b.position, trail.avatar_radius) {
                continue;
            }
            report.kills.extend(arbitrate_body(a, b, area_epsilon));
        }
    }
    report
}

/// Decide a body collision.
///
/// The one standing in its own territory wins; otherwise the larger
/// territory wins; equal areas kill both.
fn arbitrate_body(a: &Player, b: &Player, area_epsilon: f64) -> Vec<KillEvent> {
    let kill = |winner: &Player, loser: &Player| KillEvent {
        attacker: Some(winner.id),
        victim: loser.id,
        kill_type: KillType::Body,
    };
    match (a.in_own_territory(), b.in_own_territory()) {
        (true, false) => return vec![kill(a, b)],
        (false, true) => return vec![kill(b, a)],
        _ => {}
    }
    let (area_a, area_b) = (a.territory_area(), b.territory_area());
    if (area_a - area_b).abs() <= area_epsilon {
        vec![kill(b, a), kill(a, b)]
    } else if area_a > area_b {
        vec![kill(a, b)]
    } else {
        vec![kill(b, a)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn player(id: PlayerId, position: Vec2) -> Player {
        let mut config = SimConfig::default();
        config.movement.spawn_countdown_secs = 0.0;
        Player::spawn(id, position, &config)
    }

    fn trailing(id: PlayerId) -> Player {
        let mut p = player(id, Vec2::new(500.0, 500.0));
        p.state = PlayerState::Trailing;
        p.trail = (0..8).map(|i| Vec2::new(600.0 + f64::from(i) * 10.0, 500.0)).collect();
        p.position = Vec2::new(670.0, 520.0);
        p
    }

    #[test]
    fn test_trail_hit_ignores_recent_segments() {
        let trail: Vec<Vec2> = (0..6).map(|i| Vec2::new(f64::from(i) * 10.0, 0.0)).collect();
        assert_eq!(trail_hit(Vec2::new(45.0, 2.0), &trail, &[], 8.0, 0).map(|h| h.0), Some(4));
        assert!(trail_hit(Vec2::new(45.0, 2.0), &trail, &[], 8.0, 3).is_none());
        assert_eq!(trail_hit(Vec2::new(5.0, 2.0), &trail, &[], 8.0, 3).map(|h| h.0), Some(0));
    }

    #[test]
    fn test_trail_start_inside_owner_land_is_not_exposed() {
        let mut victim = trailing(1);
        // First segment runs from inside the territory out past its border
        victim.trail.insert(0, Vec2::new(540.0, 500.0));
        let inside = player(2, Vec2::new(548.0, 503.0));
        let report = detect(&[&victim, &inside], &TrailConfig::default(), 1.0);
        assert!(report.trail_hits.is_empty());

        let outside = player(2, Vec2::new(590.0, 503.0));
        let report = detect(&[&victim, &outside], &TrailConfig::default(), 1.0);
        assert_eq!(report.trail_hits.len(), 1);
        assert_eq!(report.trail_hits[0].segment_index, 0);
        assert!(report.trail_hits[0].point.distance(Vec2::new(590.0, 500.0)) < 1e-9);
    }

    #[test]
    fn test_other_player_snips() {
        let victim = trailing(1);
        let hitter = player(2, Vec2::new(635.0, 503.0));
        let report = detect(&[&victim, &hitter], &TrailConfig::default(), 1.0);
        assert_eq!(report.trail_hits.len(), 1);
        let hit = report.trail_hits[0];
        assert_eq!(hit.victim, 1);
        assert_eq!(hit.attacker, Some(2));
        assert_eq!(hit.segment_index, 3);
        assert_eq!(hit.point, Vec2::new(635.0, 500.0));
    }

    #[test]
    fn test_snipped_hitter_cannot_snip() {
        let victim = trailing(1);
        let mut hitter = trailing(2);
        hitter.position = Vec2::new(635.0, 503.0);
        hitter.state = PlayerState::Snipped(crate::snip::start_fuse(
            &hitter.trail.clone(),
            0,
            Vec2::new(600.0, 500.0),
            hitter.position,
            None,
        ));
        let report = detect(&[&victim, &hitter], &TrailConfig::default(), 1.0);
        assert!(report.trail_hits.iter().all(|h| h.victim != 1));
    }

    #[test]
    fn test_other_attacker_beats_self_hit() {
        let mut victim = trailing(1);
        // Victim's avatar sits on its own first segment
        victim.position = Vec2::new(605.0, 501.0);
        let hitter = player(3, Vec2::new(615.0, 501.0));
        let report = detect(&[&victim, &hitter], &TrailConfig::default(), 1.0);
        assert_eq!(report.trail_hits.len(), 1);
        assert_eq!(report.trail_hits[0].attacker, Some(3));
    }

    #[test]
    fn test_self_hit_has_no_attacker() {
        let mut victim = trailing(1);
        victim.position = Vec2::new(605.0, 501.0);
        let report = detect(&[&victim], &TrailConfig::default(), 1.0);
        assert_eq!(report.trail_hits.len(), 1);
        assert_eq!(report.trail_hits[0].attacker, None);
        assert_eq!(report.trail_hits[0].segment_index, 0);
    }

    #[test]
    fn test_body_collision_priority() {
        // a stands in its own territory, b does not
        let a = player(1, Vec2::new(500.0, 500.0));
        let mut b = player(2, Vec2::new(900.0, 900.0));
        b.position = Vec2::new(505.0, 500.0);
        let report = detect(&[&a, &b], &TrailConfig::default(), 1.0);
        assert_eq!(
            report.kills,
            vec![KillEvent {
                attacker: Some(1),
                victim: 2,
                kill_type: KillType::Body
            }]
        );
    }

    #[test]
    fn test_body_collision_larger_area_wins() {
        let mut a = player(1, Vec2::new(100.0, 100.0));
        let mut b = player(2, Vec2::new(300.0, 100.0));
        b.territory = crate::geometry::regular_polygon(Vec2::new(300.0, 100.0), 90.0, 12);
        a.position = Vec2::new(200.0, 300.0);
        b.position = Vec2::new(205.0, 300.0);
        let report = detect(&[&a, &b], &TrailConfig::default(), 1.0);
        assert_eq!(report.kills.len(), 1);
        assert_eq!(report.kills[0].victim, 1);
    }

    #[test]
    fn test_spawning_players_are_immune() {
        let a = player(1, Vec2::new(500.0, 500.0));
        let mut b = player(2, Vec2::new(505.0, 500.0));
        b.state = PlayerState::Spawning { remaining: 1.0 };
        let report = detect(&[&a, &b], &TrailConfig::default(), 1.0);
        assert!(report.kills.is_empty());
    }
}
