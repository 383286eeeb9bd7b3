//! # Territory Core
//!
//! Deterministic simulation core for a territory-capture arena game.
//!
//! Players leave their territory, draw a trail, and turn the loop into new
//! land when they return. Touching a trail lights a fuse that races the
//! owner home; orbiting drones add a small hitscan combat layer.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//!
//! This separation enables:
//! - Server-authoritative rooms with one canonical simulation each
//! - Headless batch runs
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`math`] - Vectors and angle helpers
//! - [`geometry`] - Point-in-polygon, segment tests, areas, bounds
//! - [`clip`] - Polygon boolean operations behind [`clip::PolygonOps`]
//! - [`config`] - RON tuning
//! - [`components`] - Player data
//! - [`player`] - Movement integrator and state transitions
//! - [`capture`] - Trail capture by boundary splicing
//! - [`overlap`] - Subtracting captures from other players
//! - [`collision`] - Trail hits and body collisions
//! - [`snip`] - Fuse pursuit
//! - [`combat`] - Drones
//! - [`progression`] - XP and levels
//! - [`events`] - Per-tick event batch
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod capture;
pub mod clip;
pub mod collision;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod math;
pub mod overlap;
pub mod player;
pub mod progression;
pub mod simulation;
pub mod snip;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clip::{GreinerHormann, PolygonOps};
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::error::{GameError, GeometryError, Result};
    pub use crate::events::{
        CaptureEvent, FuseProgress, HitscanEvent, KillEvent, LevelUpEvent, SnipEvent, TickEvents,
    };
    pub use crate::geometry::Ring;
    pub use crate::math::Vec2;
    pub use crate::simulation::Simulation;
}
