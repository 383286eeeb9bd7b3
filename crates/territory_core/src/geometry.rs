//! Planar geometry kernel.
//!
//! Rings are stored open (the last vertex is not repeated) and may wind
//! either way. Every predicate here is winding-independent and invariant to
//! the starting vertex, so territory rings produced by captures and clipping
//! can be fed back in without normalization.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// A closed polygon ring (open storage, implicit closing edge).
pub type Ring = Vec<Vec2>;

/// Distance below which two vertices are considered the same point.
pub const VERTEX_MERGE_EPSILON: f64 = 1e-9;

/// Ray-casting point-in-polygon test. O(n).
///
/// Rings with fewer than three vertices contain nothing.
#[must_use]
pub fn point_in_polygon(point: Vec2, ring: &[Vec2]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > point.y) != (b.y > point.y) {
            let intersect_x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Closest point to `point` on segment `a`-`b` (clamped projection).
///
/// Returns the point and its parameter along the segment in `[0, 1]`.
#[must_use]
pub fn closest_point_on_segment(point: Vec2, a: Vec2, b: Vec2) -> (Vec2, f64) {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return (a, 0.0);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a.lerp(b, t), t)
}

/// Distance from `point` to segment `a`-`b`.
#[must_use]
pub fn segment_point_distance(point: Vec2, a: Vec2, b: Vec2) -> f64 {
    let (closest, _) = closest_point_on_segment(point, a, b);
    point.distance(closest)
}

/// Intersection of two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Intersection point.
    pub point: Vec2,
    /// Parameter along the first segment, in `[0, 1]`.
    pub t: f64,
    /// Parameter along the second segment, in `[0, 1]`.
    pub u: f64,
}

/// Parametric intersection of segments `p1`-`p2` and `q1`-`q2`.
///
/// Both parameters must land in `[0, 1]`. Parallel and collinear segments
/// report no intersection.
#[must_use]
pub fn segment_intersection(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Option<SegmentHit> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = r.cross(s);
    if denom.abs() < 1e-12 {
        return None;
    }
    let qp = q1 - p1;
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(SegmentHit {
            point: p1.lerp(p2, t),
            t,
            u,
        })
    } else {
        None
    }
}

/// Signed shoelace area (positive for counter-clockwise in a y-up frame).
#[must_use]
pub fn signed_area(ring: &[Vec2]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        twice += a.cross(b);
    }
    twice / 2.0
}

/// Polygon area using the shoelace formula.
/// Returns positive area regardless of winding order.
#[must_use]
pub fn polygon_area(ring: &[Vec2]) -> f64 {
    signed_area(ring).abs()
}

/// Total length of an open polyline.
#[must_use]
pub fn polyline_length(points: &[Vec2]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Regular polygon with `sides` vertices around `center`.
#[must_use]
pub fn regular_polygon(center: Vec2, radius: f64, sides: usize) -> Ring {
    let sides = sides.max(3);
    (0..sides)
        .map(|i| {
            let angle = TAU * i as f64 / sides as f64;
            center + Vec2::from_angle(angle) * radius
        })
        .collect()
}

/// Drop repeated consecutive vertices, including a repeated closing vertex.
#[must_use]
pub fn clean_ring(ring: &[Vec2]) -> Ring {
    let mut out: Ring = Vec::with_capacity(ring.len());
    for &p in ring {
        if out
            .last()
            .map_or(true, |last| last.distance(p) > VERTEX_MERGE_EPSILON)
        {
            out.push(p);
        }
    }
    while out.len() > 1 && out[0].distance(out[out.len() - 1]) <= VERTEX_MERGE_EPSILON {
        out.pop();
    }
    out
}

/// Whether a ring is usable as territory: at least three vertices and
/// non-trivial area.
#[must_use]
pub fn is_valid_ring(ring: &[Vec2], min_area: f64) -> bool {
    ring.len() >= 3 && ring.iter().all(|p| p.is_finite()) && polygon_area(ring) > min_area
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vec2,
    /// Maximum corner.
    pub max: Vec2,
}

impl Bounds {
    /// Bounding box of a point set, `None` when empty.
    #[must_use]
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in &points[1..] {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    /// Whether two boxes overlap (touching counts).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Whether the box contains a point (inclusive).
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Diagonal length, used to scale tolerances.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.min.distance(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Ring {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(size, 0.0),
            Vec2::new(size, size),
            Vec2::new(0.0, size),
        ]
    }

    #[test]
    fn test_point_in_square() {
        let ring = square(10.0);
        assert!(point_in_polygon(Vec2::new(5.0, 5.0), &ring));
        assert!(!point_in_polygon(Vec2::new(15.0, 5.0), &ring));
        assert!(!point_in_polygon(Vec2::new(-0.5, 5.0), &ring));
    }

    #[test]
    fn test_point_in_concave() {
        // U shape, opening at the top
        let ring = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(30.0, 0.0),
            Vec2::new(30.0, 30.0),
            Vec2::new(20.0, 30.0),
            Vec2::new(20.0, 10.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(10.0, 30.0),
            Vec2::new(0.0, 30.0),
        ];
        assert!(point_in_polygon(Vec2::new(5.0, 20.0), &ring));
        assert!(!point_in_polygon(Vec2::new(15.0, 20.0), &ring));
        assert!(point_in_polygon(Vec2::new(15.0, 5.0), &ring));
    }

    #[test]
    fn test_degenerate_ring_contains_nothing() {
        let ring = vec![Vec2::ZERO, Vec2::new(1.0, 1.0)];
        assert!(!point_in_polygon(Vec2::new(0.5, 0.5), &ring));
    }

    #[test]
    fn test_segment_point_distance_clamps() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert_eq!(segment_point_distance(Vec2::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(segment_point_distance(Vec2::new(-3.0, 4.0), a, b), 5.0);
        assert_eq!(segment_point_distance(Vec2::new(13.0, 4.0), a, b), 5.0);
        // Zero-length segment degrades to point distance
        assert_eq!(segment_point_distance(Vec2::new(3.0, 4.0), a, a), 5.0);
    }

    #[test]
    fn test_segment_intersection_cross() {
        let hit = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(10.0, 0.0),
        )
        .expect("segments cross");
        assert!((hit.point.x - 5.0).abs() < 1e-12);
        assert!((hit.point.y - 5.0).abs() < 1e-12);
        assert!((hit.t - 0.5).abs() < 1e-12);
        assert!((hit.u - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_segment_intersection_misses() {
        // Would cross if extended
        assert!(segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(10.0, 0.0),
        )
        .is_none());
        // Parallel
        assert!(segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(10.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn test_area_is_winding_independent() {
        let ring = square(4.0);
        let mut reversed = ring.clone();
        reversed.reverse();
        assert_eq!(polygon_area(&ring), 16.0);
        assert_eq!(polygon_area(&reversed), 16.0);
        assert!(signed_area(&ring) > 0.0);
        assert!(signed_area(&reversed) < 0.0);
    }

    #[test]
    fn test_regular_polygon_area_approaches_circle() {
        let ring = regular_polygon(Vec2::new(100.0, 100.0), 60.0, 12);
        assert_eq!(ring.len(), 12);
        // 12-gon area = 3 r^2
        assert!((polygon_area(&ring) - 3.0 * 3600.0).abs() < 1e-6);
    }

    #[test]
    fn test_clean_ring_drops_duplicates() {
        let ring = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 0.0),
        ];
        assert_eq!(clean_ring(&ring).len(), 3);
    }

    #[test]
    fn test_bounds_overlap() {
        let a = Bounds::from_points(&square(10.0)).unwrap();
        let shifted: Ring = square(10.0)
            .into_iter()
            .map(|p| p + Vec2::new(5.0, 5.0))
            .collect();
        let b = Bounds::from_points(&shifted).unwrap();
        let far: Ring = square(1.0)
            .into_iter()
            .map(|p| p + Vec2::new(50.0, 50.0))
            .collect();
        let c = Bounds::from_points(&far).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_polyline_length() {
        let line = vec![Vec2::new(0.0, 0.0), Vec2::new(3.0, 4.0), Vec2::new(3.0, 10.0)];
        assert_eq!(polyline_length(&line), 11.0);
    }
}
