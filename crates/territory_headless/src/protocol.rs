//! JSON protocol for interactive headless sessions.
//!
//! The interactive runner communicates via JSON lines (one JSON object per
//! line):
//!
//! **Input (stdin):** Commands from an external controller
//! **Output (stdout):** Responses and tick events
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. The controller sends commands as JSON lines
//! 3. Runner answers each command, and emits events after ticks when asked
//! 4. On `quit` or end of input, outputs `{"type":"bye"}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"spawn","x":400,"y":400}
//! <- {"type":"spawned","player":1}
//! -> {"cmd":"heading","player":1,"heading":0.0}
//! <- {"type":"ack","cmd":"heading"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ack","cmd":"tick"}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":60,"players":[...],"hash":1234}
//! ```

use serde::{Deserialize, Serialize};
use territory_core::components::{Player, PlayerId};
use territory_core::events::TickEvents;
use territory_core::simulation::Simulation;

/// Protocol version reported in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the interactive runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Query current state without advancing time.
    Query,

    /// Spawn a new player at a position.
    Spawn {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Bring a dead player back.
    Respawn {
        /// Player to respawn.
        player: PlayerId,
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Remove a player record.
    Despawn {
        /// Player to remove.
        player: PlayerId,
    },

    /// Set a player's target heading, in radians.
    Heading {
        /// Player to steer.
        player: PlayerId,
        /// Target heading.
        heading: f64,
    },

    /// Report the current state hash (for determinism verification).
    Hash,

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the interactive runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, when the line parsed.
        cmd: Option<String>,
    },

    /// Current simulation state.
    State {
        /// Current tick.
        tick: u64,
        /// Every player record in ID order.
        players: Vec<PlayerView>,
        /// State hash.
        hash: u64,
    },

    /// A player was spawned.
    Spawned {
        /// New player ID.
        player: PlayerId,
    },

    /// Events produced by one tick.
    Events {
        /// Tick the events belong to.
        tick: u64,
        /// The event batch.
        events: TickEvents,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// State hash.
        hash: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Wire view of a single player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Player ID.
    pub id: PlayerId,
    /// Lifecycle state name.
    pub state: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Current heading.
    pub heading: f64,
    /// Owned area.
    pub area: f64,
    /// Trail length in points.
    pub trail_points: usize,
    /// Hit points.
    pub hp: f64,
    /// Level.
    pub level: u32,
    /// Kill count.
    pub kills: u32,
    /// Present while snipped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fuse: Option<FuseView>,
}

/// Wire view of an active fuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuseView {
    /// Player credited if the fuse catches up.
    pub attacker: Option<PlayerId>,
    /// Fuse X coordinate.
    pub x: f64,
    /// Fuse Y coordinate.
    pub y: f64,
    /// Fraction of the trail burned, 0 to 1.
    pub progress: f64,
    /// Estimated seconds to catch a stationary owner.
    pub time_remaining: f64,
}

impl PlayerView {
    /// Build the view of `player` within `sim`.
    #[must_use]
    pub fn from_player(player: &Player, sim: &Simulation) -> Self {
        let fuse = player.fuse().map(|fuse| {
            let at = sim.fuse_position(player.id).unwrap_or(player.position);
            FuseView {
                attacker: fuse.attacker,
                x: at.x,
                y: at.y,
                progress: fuse.progress,
                time_remaining: sim.fuse_time_remaining(player.id).unwrap_or(0.0),
            }
        });
        Self {
            id: player.id,
            state: player.state.name().to_string(),
            x: player.position.x,
            y: player.position.y,
            heading: player.heading,
            area: player.territory_area(),
            trail_points: player.trail.len(),
            hp: player.hp,
            level: player.level,
            kills: player.kills,
            fuse,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Snapshot of every player in `sim`.
    #[must_use]
    pub fn state(sim: &Simulation) -> Self {
        Self::State {
            tick: sim.get_tick(),
            players: sim
                .players()
                .sorted()
                .into_iter()
                .map(|p| PlayerView::from_player(p, sim))
                .collect(),
            hash: sim.state_hash(),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}","cmd":null}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Spawn { .. } => "spawn",
            Self::Respawn { .. } => "respawn",
            Self::Despawn { .. } => "despawn",
            Self::Heading { .. } => "heading",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use territory_core::config::SimConfig;
    use territory_core::math::Vec2;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 60 });
    }

    #[test]
    fn test_default_tick_count() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 1 });
    }

    #[test]
    fn test_parse_heading_command() {
        let cmd = Command::from_json(r#"{"cmd":"heading","player":3,"heading":1.5}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Heading {
                player: 3,
                heading: 1.5
            }
        );
        assert_eq!(cmd.name(), "heading");
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Command::from_json(r#"{"cmd":"teleport","player":1}"#).is_err());
    }

    #[test]
    fn test_serialize_state_response() {
        let mut sim = Simulation::new(SimConfig::default());
        sim.spawn_player(Vec2::new(400.0, 400.0)).unwrap();
        let json = Response::state(&sim).to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"state""#));
        assert!(json.contains(r#""state":"spawning""#));
        assert!(!json.contains("fuse"));
    }

    #[test]
    fn test_events_response_shape() {
        let resp = Response::Events {
            tick: 4,
            events: TickEvents::default(),
        };
        let line = resp.to_json_line();
        let parsed: Response = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed, resp);
    }
}
