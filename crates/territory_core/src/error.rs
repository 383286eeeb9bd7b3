//! Error types for the arena simulation.

use thiserror::Error;

use crate::components::PlayerId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for simulation API misuse and configuration problems.
///
/// Nothing raised while a tick runs surfaces as a `GameError`: geometry
/// problems degrade to "state unchanged" inside the tick instead.
#[derive(Debug, Error)]
pub enum GameError {
    /// Unknown player identifier.
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// Input sent to an eliminated player.
    #[error("Player {0} is dead")]
    PlayerDead(PlayerId),

    /// Heading input was NaN or infinite.
    #[error("Invalid heading for player {player}: {heading}")]
    InvalidHeading {
        /// Player the input was addressed to.
        player: PlayerId,
        /// Offending value.
        heading: f64,
    },

    /// Spawn position outside the map or not finite.
    #[error("Invalid spawn position ({x}, {y})")]
    InvalidSpawn {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Configuration text could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Configuration parsed but holds an unusable value.
    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfig {
        /// Dotted path of the field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// Failure of a polygon operation.
///
/// Callers inside the simulation treat every variant the same way: the
/// polygon being operated on is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Input ring has fewer than three distinct vertices.
    #[error("Polygon needs at least 3 vertices, got {0}")]
    TooFewPoints(usize),

    /// Input ring has a non-finite coordinate.
    #[error("Polygon contains a non-finite coordinate")]
    NonFinite,

    /// Touching or collinear edges persisted through every perturbation retry.
    #[error("Degenerate polygon configuration after {0} perturbation attempts")]
    Degenerate(u32),

    /// Boundary traversal did not close into a ring.
    #[error("Boundary traversal failed to close")]
    OpenTraversal,

    /// The result cannot be represented as simple rings.
    #[error("Result not representable: {0}")]
    Unrepresentable(&'static str),

    /// A `PolygonOps` implementation panicked.
    #[error("Polygon operation panicked")]
    Panicked,
}
