//! Territory overlap resolution.
//!
//! This is the only place where one player's action rewrites another
//! player's territory or decides that the other player is trapped. The
//! simulation calls [`resolve`] once per defender after every capture.

use tracing::{debug, warn};

use crate::clip::{guarded, PolygonOps};
use crate::components::Player;
use crate::geometry::{is_valid_ring, point_in_polygon, polygon_area, Bounds, Ring};
use crate::math::Vec2;

/// What happened to one defender.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Bounding boxes do not overlap, or nothing was removed.
    Untouched,
    /// The polygon operation failed. Territory left as it was.
    Failed,
    /// Territory replaced by the surviving piece.
    Trimmed {
        /// Area lost.
        area_lost: f64,
    },
    /// Defender eliminated: territory consumed or avatar stranded.
    Trapped {
        /// Whether the territory itself was consumed.
        consumed: bool,
    },
}

/// Subtract `capturer_ring` from the territory of `defender`.
///
/// Among the pieces left over, the one containing the defender's spawn point
/// is kept, otherwise the largest. That choice is a heuristic; layouts where
/// no piece holds the spawn point have not been checked for fairness. No
/// usable piece means the defender was
/// consumed. Independently, a defender whose avatar ends up inside the
/// capturer's territory and outside its own is stranded.
///
/// The defender's territory is updated in place. Elimination itself is left
/// to the caller so that kills can be applied together.
pub fn resolve(
    ops: &dyn PolygonOps,
    capturer_ring: &[Vec2],
    defender: &mut Player,
) -> Resolution {
    if capturer_ring.len() < 3 || defender.territory.len() < 3 {
        return Resolution::Untouched;
    }
    let (Some(capturer_box), Some(defender_box)) = (
        Bounds::from_points(capturer_ring),
        Bounds::from_points(&defender.territory),
    ) else {
        return Resolution::Untouched;
    };

    let mut resolution = Resolution::Untouched;
    if capturer_box.overlaps(&defender_box) {
        let before = polygon_area(&defender.territory);
        match guarded(|| ops.difference(&defender.territory, capturer_ring)) {
            Ok(pieces) => match select_piece(pieces, defender) {
                Some(piece) => {
                    let area_lost = before - polygon_area(&piece);
                    if area_lost > 0.0 {
                        defender.territory = piece;
                        resolution = Resolution::Trimmed { area_lost };
                    }
                }
                None => {
                    debug!(defender = defender.id, "Territory consumed");
                    return Resolution::Trapped { consumed: true };
                }
            },
            Err(error) => {
                warn!(defender = defender.id, %error, "Overlap difference failed, territory kept");
                resolution = Resolution::Failed;
            }
        }
    }

    if point_in_polygon(defender.position, capturer_ring) && !defender.in_own_territory() {
        debug!(defender = defender.id, "Avatar stranded in enemy territory");
        return Resolution::Trapped { consumed: false };
    }
    resolution
}

fn select_piece(pieces: Vec<Ring>, defender: &Player) -> Option<Ring> {
    let mut usable: Vec<Ring> = pieces
        .into_iter()
        .filter(|piece| is_valid_ring(piece, 0.0))
        .collect();
    if let Some(index) = usable
        .iter()
        .position(|piece| point_in_polygon(defender.spawn_point, piece))
    {
        return Some(usable.swap_remove(index));
    }
    let mut best: Option<(f64, usize)> = None;
    for (index, piece) in usable.iter().enumerate() {
        let area = polygon_area(piece);
        if best.map_or(true, |(best_area, _)| area > best_area) {
            best = Some((area, index));
        }
    }
    best.map(|(_, index)| usable.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::GreinerHormann;
    use crate::config::SimConfig;
    use crate::error::GeometryError;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Ring {
        vec![
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ]
    }

    fn defender(territory: Ring, position: Vec2) -> Player {
        let mut config = SimConfig::default();
        config.movement.spawn_countdown_secs = 0.0;
        let mut player = Player::spawn(2, position, &config);
        player.territory = territory;
        player
    }

    #[test]
    fn test_trim_overlapping_territory() {
        let ops = GreinerHormann::default();
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(20.0, 50.0));
        let capturer = rect(50.0, -10.0, 200.0, 110.0);
        let result = resolve(&ops, &capturer, &mut player);
        assert!(matches!(result, Resolution::Trimmed { area_lost } if (area_lost - 5000.0).abs() < 1e-6));
        assert!((player.territory_area() - 5000.0).abs() < 1e-6);
    }

    #[test]
    fn test_far_territory_untouched() {
        let ops = GreinerHormann::default();
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(50.0, 50.0));
        let before = player.territory.clone();
        let result = resolve(&ops, &rect(500.0, 500.0, 600.0, 600.0), &mut player);
        assert_eq!(result, Resolution::Untouched);
        assert_eq!(player.territory, before);
    }

    #[test]
    fn test_split_keeps_spawn_piece() {
        let ops = GreinerHormann::default();
        // A vertical band cuts the defender in two; spawn sits in the smaller half
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(10.0, 50.0));
        let band = rect(30.0, -10.0, 40.0, 110.0);
        resolve(&ops, &band, &mut player);
        assert!((player.territory_area() - 3000.0).abs() < 1e-6);
        assert!(player.in_own_territory());
    }

    #[test]
    fn test_split_without_spawn_keeps_largest() {
        let ops = GreinerHormann::default();
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(10.0, 50.0));
        player.spawn_point = Vec2::new(35.0, 50.0);
        let band = rect(30.0, -10.0, 40.0, 110.0);
        resolve(&ops, &band, &mut player);
        assert!((player.territory_area() - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn test_full_cover_is_consumed() {
        let ops = GreinerHormann::default();
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(50.0, 50.0));
        let result = resolve(&ops, &rect(-10.0, -10.0, 110.0, 110.0), &mut player);
        assert_eq!(result, Resolution::Trapped { consumed: true });
    }

    #[test]
    fn test_stranded_avatar() {
        let ops = GreinerHormann::default();
        // Avatar is out on a trail, inside the capturer's new land
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(300.0, 300.0));
        let result = resolve(&ops, &rect(250.0, 250.0, 350.0, 350.0), &mut player);
        assert_eq!(result, Resolution::Trapped { consumed: false });
    }

    #[derive(Debug)]
    struct FailingOps;

    impl PolygonOps for FailingOps {
        fn union(&self, _: &[Vec2], _: &[Vec2]) -> Result<Vec<Ring>, GeometryError> {
            Err(GeometryError::OpenTraversal)
        }

        fn difference(&self, _: &[Vec2], _: &[Vec2]) -> Result<Vec<Ring>, GeometryError> {
            Err(GeometryError::Degenerate(6))
        }
    }

    #[derive(Debug)]
    struct PanickingOps;

    impl PolygonOps for PanickingOps {
        fn union(&self, _: &[Vec2], _: &[Vec2]) -> Result<Vec<Ring>, GeometryError> {
            panic!("backend bug")
        }

        fn difference(&self, _: &[Vec2], _: &[Vec2]) -> Result<Vec<Ring>, GeometryError> {
            panic!("backend bug")
        }
    }

    #[test]
    fn test_panicking_backend_keeps_territory() {
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(20.0, 50.0));
        let before = player.territory.clone();
        let result = resolve(&PanickingOps, &rect(50.0, -10.0, 200.0, 110.0), &mut player);
        assert_eq!(result, Resolution::Failed);
        assert_eq!(player.territory, before);
        assert!(player.is_alive());
    }

    #[test]
    fn test_failure_keeps_territory() {
        let mut player = defender(rect(0.0, 0.0, 100.0, 100.0), Vec2::new(20.0, 50.0));
        let before = player.territory.clone();
        let result = resolve(&FailingOps, &rect(50.0, -10.0, 200.0, 110.0), &mut player);
        assert_eq!(result, Resolution::Failed);
        assert_eq!(player.territory, before);
    }
}
