//! Snip fuse pursuit.
//!
//! A trail hit does not kill outright. It lights a fuse at the collision
//! point which races along the trail toward the victim:
//!
//! ```text
//! v(t) = min(v0 * exp(k * max(0, elapsed - grace)), cap * victim_speed)
//! v0   = victim_speed * fuse_speed_multiplier
//! ```
//!
//! The victim dies when `progress >= total_length`. Only that distance check
//! is authoritative. [`fuse_position`] and [`estimated_time_remaining`] are
//! derived values for display.

use crate::components::{Fuse, PlayerId};
use crate::config::SnipConfig;
use crate::geometry::polyline_length;
use crate::math::Vec2;

/// Light a fuse on `trail` at `collision_point` inside segment `segment_index`.
///
/// `total_length` runs from the collision point along the remaining trail to
/// the victim's current position.
#[must_use]
pub fn start_fuse(
    trail: &[Vec2],
    segment_index: usize,
    collision_point: Vec2,
    position: Vec2,
    attacker: Option<PlayerId>,
) -> Fuse {
    Fuse {
        attacker,
        collision_point,
        segment_index,
        elapsed: 0.0,
        progress: 0.0,
        total_length: trail_length_ahead(trail, segment_index, collision_point, position),
        speed: 0.0,
    }
}

/// Fuse speed after `elapsed` seconds for a victim moving at `victim_speed`.
#[must_use]
pub fn fuse_speed(elapsed: f64, victim_speed: f64, config: &SnipConfig) -> f64 {
    if elapsed <= config.grace_secs {
        return 0.0;
    }
    let v0 = victim_speed * config.fuse_speed_multiplier;
    let cap = victim_speed * config.speed_cap_multiple;
    (v0 * (config.acceleration * (elapsed - config.grace_secs)).exp()).min(cap)
}

/// Advance a fuse by one tick.
///
/// `moved` is how far the victim travelled this tick, extending the trail
/// ahead of the fuse. Returns `true` when the fuse has caught the victim.
pub fn advance(fuse: &mut Fuse, victim_speed: f64, moved: f64, dt: f64, config: &SnipConfig) -> bool {
    fuse.elapsed += dt;
    fuse.total_length += moved;
    fuse.speed = fuse_speed(fuse.elapsed, victim_speed, config);
    fuse.progress += fuse.speed * dt;
    fuse.progress >= fuse.total_length
}

/// World position of the fuse along the trail.
#[must_use]
pub fn fuse_position(fuse: &Fuse, trail: &[Vec2], position: Vec2) -> Vec2 {
    let path = path_ahead(trail, fuse.segment_index, fuse.collision_point, position);
    let mut left = fuse.progress;
    for w in path.windows(2) {
        let length = w[0].distance(w[1]);
        if left <= length {
            if length <= f64::EPSILON {
                return w[0];
            }
            return w[0].lerp(w[1], left / length);
        }
        left -= length;
    }
    position
}

/// Estimated seconds until the fuse catches a victim that stops moving.
///
/// Returns `f64::INFINITY` when the fuse can never advance.
#[must_use]
pub fn estimated_time_remaining(fuse: &Fuse, victim_speed: f64, config: &SnipConfig) -> f64 {
    let distance = fuse.remaining();
    if distance <= 0.0 {
        return 0.0;
    }
    let v0 = victim_speed * config.fuse_speed_multiplier;
    let cap = victim_speed * config.speed_cap_multiple;
    if v0 <= 0.0 || !v0.is_finite() {
        return f64::INFINITY;
    }
    let wait = (config.grace_secs - fuse.elapsed).max(0.0);
    let k = config.acceleration;
    if k <= 0.0 || v0 >= cap {
        return wait + distance / v0.min(cap);
    }

    // s counts seconds of acceleration
    let s_now = (fuse.elapsed - config.grace_secs).max(0.0);
    let s_cap = (cap / v0).ln() / k;
    if s_now >= s_cap {
        return wait + distance / cap;
    }
    let to_cap = v0 / k * ((k * s_cap).exp() - (k * s_now).exp());
    if distance <= to_cap {
        let s_end = ((k * s_now).exp() + distance * k / v0).ln() / k;
        wait + s_end - s_now
    } else {
        wait + (s_cap - s_now) + (distance - to_cap) / cap
    }
}

/// Remaining path from the collision point to the victim.
fn path_ahead(trail: &[Vec2], segment_index: usize, collision_point: Vec2, position: Vec2) -> Vec<Vec2> {
    let mut path = Vec::with_capacity(trail.len().saturating_sub(segment_index) + 1);
    path.push(collision_point);
    if let Some(rest) = trail.get(segment_index + 1..) {
        path.extend_from_slice(rest);
    }
    path.push(position);
    path
}

/// Length of the trail ahead of the collision point.
#[must_use]
pub fn trail_length_ahead(trail: &[Vec2], segment_index: usize, collision_point: Vec2, position: Vec2) -> f64 {
    polyline_length(&path_ahead(trail, segment_index, collision_point, position))
}
