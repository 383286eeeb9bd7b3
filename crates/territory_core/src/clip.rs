//! Polygon boolean operations.
//!
//! The overlap resolver only talks to the [`PolygonOps`] trait, so any
//! clipping backend can be plugged into a [`Simulation`](crate::simulation::Simulation).
//! [`GreinerHormann`] is the built-in backend.
//!
//! # Failure model
//!
//! Operations return `Err` instead of guessing. [`guarded`] turns a panic
//! inside a backend into an error. Callers treat any error as "leave the
//! territory as it was".

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::trace;

use crate::error::GeometryError;
use crate::geometry::{
    clean_ring, point_in_polygon, polygon_area, segment_intersection, signed_area, Bounds, Ring,
};
use crate::math::Vec2;

/// Planar boolean operations on simple rings.
pub trait PolygonOps: std::fmt::Debug + Send + Sync {
    /// Union of two rings. Disjoint inputs produce two rings.
    fn union(&self, a: &[Vec2], b: &[Vec2]) -> Result<Vec<Ring>, GeometryError>;

    /// `subject` minus `clip`. May produce several disjoint rings, or none
    /// when the subject is fully covered.
    fn difference(&self, subject: &[Vec2], clip: &[Vec2]) -> Result<Vec<Ring>, GeometryError>;

    /// Absolute area of a ring.
    fn area(&self, ring: &[Vec2]) -> f64 {
        polygon_area(ring)
    }
}

/// Run a boolean operation, converting a panic into [`GeometryError::Panicked`].
pub fn guarded<F>(op: F) -> Result<Vec<Ring>, GeometryError>
where
    F: FnOnce() -> Result<Vec<Ring>, GeometryError>,
{
    catch_unwind(AssertUnwindSafe(op)).unwrap_or(Err(GeometryError::Panicked))
}

/// Parameter tolerance for "touching at an endpoint".
const PARAM_EPSILON: f64 = 1e-9;

/// Relative size of the perturbation applied on the first retry.
const PERTURB_BASE: f64 = 1e-7;

/// Greiner-Hormann clipper with perturbation retries.
///
/// Touching vertices and collinear overlapping edges are the classic failure
/// cases of Greiner-Hormann. Instead of special-casing them, the clip ring is
/// nudged by a tiny scale-and-translate and the operation retried; each retry
/// grows the nudge by a factor of ten.
#[derive(Debug, Clone, Copy)]
pub struct GreinerHormann {
    /// Number of perturbed retries before giving up.
    pub max_retries: u32,
}

impl Default for GreinerHormann {
    fn default() -> Self {
        Self { max_retries: 6 }
    }
}

impl PolygonOps for GreinerHormann {
    fn union(&self, a: &[Vec2], b: &[Vec2]) -> Result<Vec<Ring>, GeometryError> {
        self.run(a, b, BooleanOp::Union)
    }

    fn difference(&self, subject: &[Vec2], clip: &[Vec2]) -> Result<Vec<Ring>, GeometryError> {
        self.run(subject, clip, BooleanOp::Difference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BooleanOp {
    Union,
    Difference,
}

/// Why a single clipping attempt stopped.
#[derive(Debug)]
enum Attempt {
    /// Retry with a perturbed clip ring.
    Degenerate,
    /// Give up.
    Failed(GeometryError),
}

impl From<GeometryError> for Attempt {
    fn from(error: GeometryError) -> Self {
        Attempt::Failed(error)
    }
}

impl GreinerHormann {
    fn run(&self, subject: &[Vec2], clip: &[Vec2], op: BooleanOp) -> Result<Vec<Ring>, GeometryError> {
        let subject = prepare(subject)?;
        let clip = prepare(clip)?;

        let mut all = subject.clone();
        all.extend_from_slice(&clip);
        let scale = Bounds::from_points(&all).map_or(1.0, |b| b.diagonal().max(1.0));

        for attempt in 0..=self.max_retries {
            let clip_ring = if attempt == 0 {
                clip.clone()
            } else {
                perturb(&clip, attempt, scale)
            };
            match clip_once(&subject, &clip_ring, op, scale) {
                Ok(rings) => return Ok(rings),
                Err(Attempt::Degenerate) => {
                    trace!(attempt, "degenerate clip input, perturbing");
                }
                Err(Attempt::Failed(error)) => return Err(error),
            }
        }
        Err(GeometryError::Degenerate(self.max_retries))
    }
}

fn prepare(ring: &[Vec2]) -> Result<Ring, GeometryError> {
    if ring.iter().any(|p| !p.is_finite()) {
        return Err(GeometryError::NonFinite);
    }
    let cleaned = clean_ring(ring);
    if cleaned.len() < 3 {
        return Err(GeometryError::TooFewPoints(cleaned.len()));
    }
    if polygon_area(&cleaned) <= 0.0 {
        return Err(GeometryError::Unrepresentable("zero-area input"));
    }
    Ok(cleaned)
}

/// Scale about the vertex centroid and translate along a rotating direction.
fn perturb(ring: &[Vec2], attempt: u32, scale: f64) -> Ring {
    let magnitude = PERTURB_BASE * 10f64.powi(attempt as i32 - 1);
    let n = ring.len() as f64;
    let centroid = ring.iter().fold(Vec2::ZERO, |acc, p| acc + *p) * (1.0 / n);
    // Golden angle keeps successive directions well spread.
    let direction = Vec2::from_angle(f64::from(attempt) * 2.399_963_229_728_653);
    let offset = direction * (magnitude * scale);
    ring.iter()
        .map(|p| centroid + (*p - centroid) * (1.0 + magnitude) + offset)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Subject,
    Clip,
}

impl Side {
    fn other(self) -> Self {
        match self {
            Side::Subject => Side::Clip,
            Side::Clip => Side::Subject,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    point: Vec2,
    next: usize,
    prev: usize,
    crossing: Option<usize>,
    entry: bool,
}

#[derive(Debug, Clone)]
struct Crossing {
    point: Vec2,
    subject_node: usize,
    clip_node: usize,
    visited: bool,
}

impl Crossing {
    fn node(&self, side: Side) -> usize {
        match side {
            Side::Subject => self.subject_node,
            Side::Clip => self.clip_node,
        }
    }
}

struct Graph {
    subject: Vec<Node>,
    clip: Vec<Node>,
    crossings: Vec<Crossing>,
}

impl Graph {
    fn nodes(&self, side: Side) -> &[Node] {
        match side {
            Side::Subject => &self.subject,
            Side::Clip => &self.clip,
        }
    }
}

/// Classify a pair of edges. `Ok(Some((t, u)))` is a proper crossing.
fn edge_crossing(
    p1: Vec2,
    p2: Vec2,
    q1: Vec2,
    q2: Vec2,
    scale: f64,
) -> Result<Option<(f64, f64)>, Attempt> {
    let r = p2 - p1;
    let s = q2 - q1;
    let len_r = r.length();
    let len_s = s.length();
    let denom = r.cross(s);

    if denom.abs() <= 1e-12 * len_r * len_s {
        // Parallel: degenerate only when collinear and overlapping.
        let offset = (q1 - p1).cross(r).abs() / len_r.max(f64::MIN_POSITIVE);
        if offset > 1e-9 * scale {
            return Ok(None);
        }
        let len_sq = r.dot(r).max(f64::MIN_POSITIVE);
        let t0 = (q1 - p1).dot(r) / len_sq;
        let t1 = (q2 - p1).dot(r) / len_sq;
        if t0.max(t1) >= -PARAM_EPSILON && t0.min(t1) <= 1.0 + PARAM_EPSILON {
            return Err(Attempt::Degenerate);
        }
        return Ok(None);
    }

    if let Some(hit) = segment_intersection(p1, p2, q1, q2) {
        let near_end = |v: f64| v <= PARAM_EPSILON || v >= 1.0 - PARAM_EPSILON;
        if near_end(hit.t) || near_end(hit.u) {
            return Err(Attempt::Degenerate);
        }
        return Ok(Some((hit.t, hit.u)));
    }

    // Near misses at endpoints still count as touching.
    let qp = q1 - p1;
    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    let within = |v: f64| v >= -PARAM_EPSILON && v <= 1.0 + PARAM_EPSILON;
    if within(t) && within(u) {
        return Err(Attempt::Degenerate);
    }
    Ok(None)
}

fn build_list(ring: &[Vec2], hits: &mut [Vec<(f64, usize)>], crossings: &mut [Crossing], side: Side) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(ring.len() + crossings.len());
    for (i, &point) in ring.iter().enumerate() {
        nodes.push(Node {
            point,
            next: 0,
            prev: 0,
            crossing: None,
            entry: false,
        });
        hits[i].sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(_, id) in &hits[i] {
            let index = nodes.len();
            nodes.push(Node {
                point: crossings[id].point,
                next: 0,
                prev: 0,
                crossing: Some(id),
                entry: false,
            });
            match side {
                Side::Subject => crossings[id].subject_node = index,
                Side::Clip => crossings[id].clip_node = index,
            }
        }
    }
    let len = nodes.len();
    for (i, node) in nodes.iter_mut().enumerate() {
        node.next = (i + 1) % len;
        node.prev = (i + len - 1) % len;
    }
    nodes
}

/// Alternate entry/exit flags along a list, starting from whether its first
/// vertex lies inside the other ring.
fn mark_entries(nodes: &mut [Node], starts_inside: bool, invert: bool) {
    let mut entering = !starts_inside;
    for node in nodes.iter_mut() {
        if node.crossing.is_some() {
            node.entry = entering != invert;
            entering = !entering;
        }
    }
}

fn clip_once(subject: &[Vec2], clip: &[Vec2], op: BooleanOp, scale: f64) -> Result<Vec<Ring>, Attempt> {
    let n = subject.len();
    let m = clip.len();

    let mut crossings: Vec<Crossing> = Vec::new();
    let mut subject_hits: Vec<Vec<(f64, usize)>> = vec![Vec::new(); n];
    let mut clip_hits: Vec<Vec<(f64, usize)>> = vec![Vec::new(); m];

    for i in 0..n {
        let p1 = subject[i];
        let p2 = subject[(i + 1) % n];
        for j in 0..m {
            let q1 = clip[j];
            let q2 = clip[(j + 1) % m];
            if let Some((t, u)) = edge_crossing(p1, p2, q1, q2, scale)? {
                let id = crossings.len();
                crossings.push(Crossing {
                    point: p1.lerp(p2, t),
                    subject_node: 0,
                    clip_node: 0,
                    visited: false,
                });
                subject_hits[i].push((t, id));
                clip_hits[j].push((u, id));
            }
        }
    }

    if crossings.is_empty() {
        return disjoint(subject, clip, op);
    }
    if crossings.len() % 2 == 1 {
        return Err(Attempt::Degenerate);
    }

    let mut subject_nodes = build_list(subject, &mut subject_hits, &mut crossings, Side::Subject);
    let mut clip_nodes = build_list(clip, &mut clip_hits, &mut crossings, Side::Clip);

    let (invert_subject, invert_clip) = match op {
        BooleanOp::Union => (true, true),
        BooleanOp::Difference => (true, false),
    };
    mark_entries(&mut subject_nodes, point_in_polygon(subject[0], clip), invert_subject);
    mark_entries(&mut clip_nodes, point_in_polygon(clip[0], subject), invert_clip);

    let mut graph = Graph {
        subject: subject_nodes,
        clip: clip_nodes,
        crossings,
    };
    let limit = 2 * (graph.subject.len() + graph.clip.len()) + 4;

    let mut rings = Vec::new();
    for start in 0..graph.crossings.len() {
        if graph.crossings[start].visited {
            continue;
        }
        let mut ring = Vec::new();
        let mut side = Side::Subject;
        let mut node = graph.crossings[start].subject_node;
        let mut steps = 0usize;

        loop {
            let (crossing, point, forward) = {
                let current = &graph.nodes(side)[node];
                (current.crossing, current.point, current.entry)
            };
            let Some(id) = crossing else {
                return Err(GeometryError::OpenTraversal.into());
            };
            graph.crossings[id].visited = true;
            ring.push(point);

            let arrived = loop {
                let current = &graph.nodes(side)[node];
                node = if forward { current.next } else { current.prev };
                steps += 1;
                if steps > limit {
                    return Err(GeometryError::OpenTraversal.into());
                }
                let next = &graph.nodes(side)[node];
                match next.crossing {
                    Some(id) => break id,
                    None => ring.push(next.point),
                }
            };

            side = side.other();
            node = graph.crossings[arrived].node(side);
            if arrived == start {
                break;
            }
            if graph.crossings[arrived].visited {
                return Err(GeometryError::OpenTraversal.into());
            }
        }

        let ring = clean_ring(&ring);
        if ring.len() >= 3 && polygon_area(&ring) > 0.0 {
            rings.push(ring);
        }
    }
    Ok(rings)
}

/// Rings whose boundaries never cross: containment decides the result.
fn disjoint(subject: &[Vec2], clip: &[Vec2], op: BooleanOp) -> Result<Vec<Ring>, Attempt> {
    let subject_inside = point_in_polygon(subject[0], clip);
    let clip_inside = point_in_polygon(clip[0], subject);
    match op {
        BooleanOp::Difference => {
            if subject_inside {
                Ok(Vec::new())
            } else if clip_inside {
                Ok(vec![keyhole(subject, clip)?])
            } else {
                Ok(vec![subject.to_vec()])
            }
        }
        BooleanOp::Union => {
            if subject_inside {
                Ok(vec![clip.to_vec()])
            } else if clip_inside {
                Ok(vec![subject.to_vec()])
            } else {
                Ok(vec![subject.to_vec(), clip.to_vec()])
            }
        }
    }
}

/// Cut a hole into `outer` through a zero-width bridge.
///
/// The hole is walked against the outer winding, so the shoelace area is
/// `outer - hole` and ray casting treats the doubled bridge edge as neutral.
fn keyhole(outer: &[Vec2], hole: &[Vec2]) -> Result<Ring, GeometryError> {
    let mut hole = hole.to_vec();
    if signed_area(outer).signum() == signed_area(&hole).signum() {
        hole.reverse();
    }

    let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(outer.len() * hole.len());
    for (i, a) in outer.iter().enumerate() {
        for (j, b) in hole.iter().enumerate() {
            pairs.push((a.distance_squared(*b), i, j));
        }
    }
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0));

    let (i, j) = pairs
        .iter()
        .find(|&&(_, i, j)| bridge_is_clear(outer, &hole, i, j))
        .map(|&(_, i, j)| (i, j))
        .ok_or(GeometryError::Unrepresentable("no clear bridge for hole"))?;

    let mut ring = Vec::with_capacity(outer.len() + hole.len() + 2);
    ring.extend_from_slice(&outer[..=i]);
    for k in 0..=hole.len() {
        ring.push(hole[(j + k) % hole.len()]);
    }
    ring.extend_from_slice(&outer[i..]);
    Ok(ring)
}

fn bridge_is_clear(outer: &[Vec2], hole: &[Vec2], i: usize, j: usize) -> bool {
    let a = outer[i];
    let b = hole[j];
    let blocked = |ring: &[Vec2], skip: usize| {
        let n = ring.len();
        (0..n).any(|k| {
            if k == skip || (k + 1) % n == skip {
                return false;
            }
            segment_intersection(a, b, ring[k], ring[(k + 1) % n]).is_some()
        })
    };
    !blocked(outer, i) && !blocked(hole, j)
}
