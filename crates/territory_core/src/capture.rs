//! Trail capture by boundary splicing.
//!
//! A trail that left the territory and came back splits the territory ring
//! at two points: where the trail leaves (entry) and where it returns
//! (exit). Closing the trail with either arc of the ring between those
//! points gives two candidate polygons. The larger one is the new territory.

use tracing::{debug, warn};

use crate::geometry::{clean_ring, is_valid_ring, polygon_area, segment_intersection, Ring};
use crate::math::Vec2;

/// A successful capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Replacement territory.
    pub territory: Ring,
    /// New area minus old area.
    pub area_delta: f64,
    /// Mean of the trail points, for effects.
    pub location: Vec2,
}

/// Where the trail meets the territory boundary.
#[derive(Debug, Clone, Copy)]
struct Splice {
    /// Ring edge index (`ring[edge] -> ring[edge + 1]`).
    edge: usize,
    /// Point on that edge.
    point: Vec2,
    /// Parameter of `point` along the edge.
    along: f64,
}

/// Splice `trail` into `territory`.
///
/// The trail must start and end inside the territory, with every point in
/// between outside it. Returns `None` when inputs are too small or when both
/// candidates would shrink the territory by more than `area_epsilon`.
#[must_use]
pub fn capture(territory: &[Vec2], trail: &[Vec2], area_epsilon: f64) -> Option<Capture> {
    if territory.len() < 3 || trail.len() < 3 {
        return None;
    }
    let n = territory.len();
    let m = trail.len();

    let entry = crossing(territory, trail[0], trail[1], Pick::Last)
        .unwrap_or_else(|| nearest_vertex(territory, trail[0]));
    let exit = crossing(territory, trail[m - 2], trail[m - 1], Pick::First)
        .unwrap_or_else(|| nearest_vertex(territory, trail[m - 1]));

    let mut head: Ring = Vec::with_capacity(m + n);
    head.push(entry.point);
    head.extend_from_slice(&trail[1..m - 1]);
    head.push(exit.point);

    let (a, b) = (entry.edge, exit.edge);
    let forward_count = if a == b {
        if entry.along > exit.along { 0 } else { n }
    } else {
        (a + n - b) % n
    };
    let backward_count = if a == b {
        if entry.along < exit.along { 0 } else { n }
    } else {
        (b + n - a) % n
    };

    let mut forward = head.clone();
    forward.extend((0..forward_count).map(|k| territory[(b + 1 + k) % n]));
    let mut backward = head;
    backward.extend((0..backward_count).map(|k| territory[(b + n - k) % n]));

    let forward = clean_ring(&forward);
    let backward = clean_ring(&backward);
    let forward_area = polygon_area(&forward);
    let backward_area = polygon_area(&backward);
    let (winner, new_area) = if forward_area >= backward_area {
        (forward, forward_area)
    } else {
        (backward, backward_area)
    };

    let old_area = polygon_area(territory);
    if new_area < old_area - area_epsilon || !is_valid_ring(&winner, 0.0) {
        warn!(
            old_area,
            new_area,
            trail_points = m,
            "Capture rejected, territory left unchanged"
        );
        return None;
    }

    #[cfg(feature = "debug-validation")]
    debug_assert!(winner.iter().all(|p| p.is_finite()));

    let location = trail
        .iter()
        .fold(Vec2::ZERO, |acc, &p| acc + p)
        * (1.0 / m as f64);
    debug!(old_area, new_area, vertices = winner.len(), "Capture spliced");

    Some(Capture {
        territory: winner,
        area_delta: new_area - old_area,
        location,
    })
}

#[derive(Debug, Clone, Copy)]
enum Pick {
    First,
    Last,
}

/// Crossing of segment `from`-`to` with the ring boundary closest to `to`
/// (`Pick::Last`) or to `from` (`Pick::First`).
fn crossing(ring: &[Vec2], from: Vec2, to: Vec2, pick: Pick) -> Option<Splice> {
    let n = ring.len();
    let mut best: Option<(f64, Splice)> = None;
    for edge in 0..n {
        let Some(hit) = segment_intersection(from, to, ring[edge], ring[(edge + 1) % n]) else {
            continue;
        };
        let better = match (pick, best) {
            (_, None) => true,
            (Pick::Last, Some((t, _))) => hit.t > t,
            (Pick::First, Some((t, _))) => hit.t < t,
        };
        if better {
            best = Some((
                hit.t,
                Splice {
                    edge,
                    point: hit.point,
                    along: hit.u,
                },
            ));
        }
    }
    best.map(|(_, splice)| splice)
}

fn nearest_vertex(ring: &[Vec2], point: Vec2) -> Splice {
    warn!(x = point.x, y = point.y, "No boundary crossing found, using nearest vertex");
    let mut edge = 0;
    let mut best = f64::INFINITY;
    for (i, v) in ring.iter().enumerate() {
        let d = v.distance_squared(point);
        if d < best {
            best = d;
            edge = i;
        }
    }
    Splice {
        edge,
        point: ring[edge],
        along: 0.0,
    }
}
