//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and processes all game logic
//! deterministically. It owns every player record and is the only thing
//! that advances them.
//!
//! # Determinism
//!
//! - No system randomness and no IO
//! - Consistent iteration order (sorted player IDs)
//! - Eliminations and snips are collected first and applied together
//! - Same inputs always produce the same outputs and the same [`Simulation::state_hash`]
//!
//! # Example
//!
//! ```
//! use territory_core::config::SimConfig;
//! use territory_core::math::Vec2;
//! use territory_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(SimConfig::default());
//! let id = sim.spawn_player(Vec2::new(500.0, 500.0)).unwrap();
//! sim.set_target_heading(id, 0.5).unwrap();
//!
//! let events = sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! assert!(events.kills.is_empty());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::capture;
use crate::clip::{GreinerHormann, PolygonOps};
use crate::collision::{detect, TrailHit};
use crate::combat::fire_drones;
use crate::components::{KillType, Player, PlayerId, PlayerState};
use crate::config::SimConfig;
use crate::error::{GameError, Result};
use crate::events::{CaptureEvent, FuseProgress, HitscanEvent, KillEvent, SnipEvent, TickEvents};
use crate::math::{wrap_angle, Vec2};
use crate::overlap::{resolve, Resolution};
use crate::player::Transition;
use crate::progression::{award_xp, capture_xp};
use crate::snip;

/// Storage for all players in the simulation.
///
/// Uses a `HashMap` for O(1) lookup by ID, with deterministic iteration via
/// sorted keys when processing a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStorage {
    /// Map of player ID to player data.
    players: HashMap<PlayerId, Player>,
    /// Next player ID to assign.
    next_id: PlayerId,
}

impl Default for PlayerStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStorage {
    /// Create empty player storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new player and return its ID.
    pub fn insert(&mut self, mut player: Player) -> PlayerId {
        let id = self.next_id;
        self.next_id += 1;
        player.id = id;
        self.players.insert(id, player);
        id
    }

    /// Remove a player by ID.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Get a player by ID.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Get a mutable reference to a player by ID.
    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Check if a player exists.
    #[must_use]
    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// Number of player records, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Get sorted player IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Players in ID order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Player> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.players.get(&id))
            .collect()
    }

    /// Iterate over all players (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &Player)> {
        self.players.iter()
    }
}

fn default_ops() -> Arc<dyn PolygonOps> {
    Arc::new(GreinerHormann::default())
}

/// The arena simulation.
///
/// # Tick Order
///
/// 1. **Movement** - every player turns, moves and updates its state; fuses
///    advance and escapes are recorded
/// 2. **Capture** - returned trails are spliced into territory and overlaps
///    with other players are resolved; kills so far are applied
/// 3. **Collisions and combat** - trail hits, body collisions and drone fire
///    are detected across all players, then applied together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Current simulation tick.
    tick: u64,
    /// Tuning.
    config: SimConfig,
    /// All players, alive or dead.
    players: PlayerStorage,
    /// Boolean operation backend. Not part of the snapshot.
    #[serde(skip, default = "default_ops")]
    ops: Arc<dyn PolygonOps>,
}

impl Simulation {
    /// Create an empty simulation using the built-in clipper.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            tick: 0,
            config,
            players: PlayerStorage::new(),
            ops: default_ops(),
        }
    }

    /// Replace the polygon boolean backend.
    #[must_use]
    pub fn with_polygon_ops(mut self, ops: Arc<dyn PolygonOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Get a reference to the player storage.
    #[must_use]
    pub const fn players(&self) -> &PlayerStorage {
        &self.players
    }

    /// Get a player by ID.
    #[must_use]
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Number of players not dead.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|(_, p)| p.is_alive()).count()
    }

    /// Spawn a player centred on `position`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidSpawn`] if the position is not finite or
    /// lies outside the map.
    pub fn spawn_player(&mut self, position: Vec2) -> Result<PlayerId> {
        self.check_spawn(position)?;
        let id = self
            .players
            .insert(Player::spawn(0, position, &self.config));
        debug!(player = id, x = position.x, y = position.y, "Player spawned");
        Ok(id)
    }

    /// Bring a dead player back at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the player does not exist, is still alive, or the
    /// position is invalid.
    pub fn respawn_player(&mut self, id: PlayerId, position: Vec2) -> Result<()> {
        self.check_spawn(position)?;
        let player = self
            .players
            .get_mut(id)
            .ok_or(GameError::PlayerNotFound(id))?;
        if player.is_alive() {
            return Err(GameError::InvalidState(format!("Player {id} is still alive")));
        }
        player.reset_at(position, &self.config);
        debug!(player = id, "Player respawned");
        Ok(())
    }

    /// Remove a player record entirely.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PlayerNotFound`] if the ID is unknown.
    pub fn despawn_player(&mut self, id: PlayerId) -> Result<()> {
        self.players
            .remove(id)
            .map(|_| ())
            .ok_or(GameError::PlayerNotFound(id))
    }

    /// Set the heading a player steers toward, in radians.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or dead players and non-finite headings.
    pub fn set_target_heading(&mut self, id: PlayerId, heading: f64) -> Result<()> {
        let player = self
            .players
            .get_mut(id)
            .ok_or(GameError::PlayerNotFound(id))?;
        if !player.is_alive() {
            return Err(GameError::PlayerDead(id));
        }
        if !heading.is_finite() {
            return Err(GameError::InvalidHeading {
                player: id,
                heading,
            });
        }
        player.target_heading = wrap_angle(heading);
        Ok(())
    }

    /// Fuse position of a snipped player.
    #[must_use]
    pub fn fuse_position(&self, id: PlayerId) -> Option<Vec2> {
        let player = self.players.get(id)?;
        let fuse = player.fuse()?;
        Some(snip::fuse_position(fuse, &player.trail, player.position))
    }

    /// Estimated seconds until a snipped player is caught if it stops.
    #[must_use]
    pub fn fuse_time_remaining(&self, id: PlayerId) -> Option<f64> {
        let player = self.players.get(id)?;
        let fuse = player.fuse()?;
        Some(snip::estimated_time_remaining(
            fuse,
            player.current_speed(),
            &self.config.snip,
        ))
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        let dt = self.config.dt();
        let ids = self.players.sorted_ids();
        let mut pending: Vec<KillEvent> = Vec::new();

        // 1. Movement
        let returned = self.run_movement(&ids, dt, &mut events, &mut pending);

        // 2. Captures and overlap
        self.run_captures(&returned, &ids, &mut events, &mut pending);
        self.apply_kills(pending, &mut events);

        // 3. Collisions and combat, detected on one snapshot
        let report = detect(
            &self.players.sorted(),
            &self.config.trail,
            self.config.territory.area_epsilon,
        );
        let shots = self.run_drones(&ids, dt);
        let mut kills = report.kills;
        kills.extend(self.apply_damage(&shots));
        events.hitscans = shots;
        self.apply_kills(kills, &mut events);
        self.apply_snips(report.trail_hits, &mut events);
        self.record_fuses(&ids, &mut events);

        self.tick += 1;
        #[cfg(debug_assertions)]
        tracing::trace!(tick = self.tick, hash = self.state_hash(), "Tick complete");
        events
    }

    fn run_movement(
        &mut self,
        ids: &[PlayerId],
        dt: f64,
        events: &mut TickEvents,
        pending: &mut Vec<KillEvent>,
    ) -> Vec<PlayerId> {
        let mut returned = Vec::new();
        for &id in ids {
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            let step = player.step(&self.config, dt);
            if step.trail_changed {
                events.mark_trail(id);
            }
            match step.transition {
                Transition::Returned => returned.push(id),
                Transition::Escaped => {
                    debug!(player = id, "Escaped fuse");
                    events.snips.push(SnipEvent::Escaped { victim: id });
                }
                Transition::None | Transition::SpawnFinished | Transition::LeftTerritory => {}
            }

            let speed = player.current_speed();
            if let PlayerState::Snipped(fuse) = &mut player.state {
                if snip::advance(fuse, speed, step.distance, dt, &self.config.snip) {
                    pending.push(KillEvent {
                        attacker: fuse.attacker,
                        victim: id,
                        kill_type: KillType::Trail,
                    });
                }
            }
        }
        returned
    }

    fn run_captures(
        &mut self,
        returned: &[PlayerId],
        ids: &[PlayerId],
        events: &mut TickEvents,
        pending: &mut Vec<KillEvent>,
    ) {
        for &id in returned {
            let doomed = pending.iter().any(|kill| kill.victim == id);
            let Some(player) = self.players.get_mut(id) else {
                continue;
            };
            let trail = std::mem::take(&mut player.trail);
            events.mark_trail(id);
            if doomed {
                continue;
            }
            let Some(result) = capture(&player.territory, &trail, self.config.territory.area_epsilon)
            else {
                continue;
            };

            player.territory = result.territory;
            events.mark_territory(id);
            events.captures.push(CaptureEvent {
                player: id,
                area_delta: result.area_delta,
                location: result.location,
            });
            let xp = capture_xp(result.area_delta, &self.config.progression);
            events.level_ups.extend(award_xp(player, xp, &self.config));
            debug!(player = id, area_delta = result.area_delta, "Capture");

            self.resolve_overlaps(id, ids, events, pending);
        }
    }

    /// The only path through which a capture mutates other players.
    fn resolve_overlaps(
        &mut self,
        capturer: PlayerId,
        ids: &[PlayerId],
        events: &mut TickEvents,
        pending: &mut Vec<KillEvent>,
    ) {
        let Some(ring) = self.players.get(capturer).map(|p| p.territory.clone()) else {
            return;
        };
        for &other in ids {
            if other == capturer || pending.iter().any(|kill| kill.victim == other) {
                continue;
            }
            let Some(defender) = self.players.get_mut(other) else {
                continue;
            };
            if !defender.is_alive() {
                continue;
            }
            match resolve(self.ops.as_ref(), &ring, defender) {
                Resolution::Trimmed { .. } => events.mark_territory(other),
                Resolution::Trapped { .. } => pending.push(KillEvent {
                    attacker: Some(capturer),
                    victim: other,
                    kill_type: KillType::Trap,
                }),
                Resolution::Untouched | Resolution::Failed => {}
            }
        }
    }

    fn run_drones(&mut self, ids: &[PlayerId], dt: f64) -> Vec<HitscanEvent> {
        let targets: Vec<(PlayerId, Vec2)> = self
            .players
            .sorted()
            .into_iter()
            .filter(|p| p.is_alive() && !p.is_spawning())
            .map(|p| (p.id, p.position))
            .collect();
        let mut shots = Vec::new();
        for &id in ids {
            if let Some(owner) = self.players.get_mut(id) {
                shots.extend(fire_drones(owner, &targets, dt, &self.config.combat));
            }
        }
        shots
    }

    fn apply_damage(&mut self, shots: &[HitscanEvent]) -> Vec<KillEvent> {
        let mut kills = Vec::new();
        for shot in shots {
            let Some(target) = self.players.get_mut(shot.target) else {
                continue;
            };
            if !target.is_alive() || target.hp <= 0.0 {
                continue;
            }
            target.hp -= shot.damage;
            if target.hp <= 0.0 {
                kills.push(KillEvent {
                    attacker: Some(shot.owner),
                    victim: shot.target,
                    kill_type: KillType::Hp,
                });
            }
        }
        kills
    }

    /// Apply a batch of eliminations. The first kill of a victim wins.
    ///
    /// Attackers are credited before any victim of the batch is eliminated,
    /// so a mutual kill rewards both sides whatever their ids.
    fn apply_kills(&mut self, kills: Vec<KillEvent>, events: &mut TickEvents) {
        let mut batch: Vec<KillEvent> = Vec::with_capacity(kills.len());
        for kill in kills {
            let already = events.is_killed(kill.victim)
                || batch.iter().any(|k| k.victim == kill.victim);
            let alive = self.players.get(kill.victim).is_some_and(Player::is_alive);
            if alive && !already {
                batch.push(kill);
            }
        }

        let xp = self.config.progression.xp_per_kill;
        for kill in &batch {
            let Some(attacker_id) = kill.attacker.filter(|&a| a != kill.victim) else {
                continue;
            };
            if let Some(attacker) = self.players.get_mut(attacker_id) {
                if attacker.is_alive() {
                    attacker.kills += 1;
                    events.level_ups.extend(award_xp(attacker, xp, &self.config));
                }
            }
        }

        for kill in batch {
            if let Some(victim) = self.players.get_mut(kill.victim) {
                victim.eliminate();
            }
            events.mark_territory(kill.victim);
            events.mark_trail(kill.victim);
            debug!(
                victim = kill.victim,
                attacker = ?kill.attacker,
                kill_type = ?kill.kill_type,
                "Player eliminated"
            );
            events.kills.push(kill);
        }
    }

    fn apply_snips(&mut self, hits: Vec<TrailHit>, events: &mut TickEvents) {
        for hit in hits {
            if events.is_killed(hit.victim) {
                continue;
            }
            let Some(victim) = self.players.get_mut(hit.victim) else {
                continue;
            };
            if !matches!(victim.state, PlayerState::Trailing) {
                continue;
            }
            let fuse = snip::start_fuse(
                &victim.trail,
                hit.segment_index,
                hit.point,
                victim.position,
                hit.attacker,
            );
            victim.state = PlayerState::Snipped(fuse);
            victim.speed_multiplier = 1.0;
            debug!(victim = hit.victim, attacker = ?hit.attacker, "Snipped");
            events.snips.push(SnipEvent::Started {
                victim: hit.victim,
                attacker: hit.attacker,
                point: hit.point,
            });
        }
    }

    fn record_fuses(&self, ids: &[PlayerId], events: &mut TickEvents) {
        for &id in ids {
            let Some(player) = self.players.get(id) else {
                continue;
            };
            if let Some(fuse) = player.fuse() {
                events.fuses.push(FuseProgress {
                    victim: id,
                    progress: fuse.progress,
                    total_length: fuse.total_length,
                    position: snip::fuse_position(fuse, &player.trail, player.position),
                });
            }
        }
    }

    fn check_spawn(&self, position: Vec2) -> Result<()> {
        let world = &self.config.world;
        let inside = position.is_finite()
            && (0.0..=world.width).contains(&position.x)
            && (0.0..=world.height).contains(&position.y);
        if inside {
            Ok(())
        } else {
            Err(GameError::InvalidSpawn {
                x: position.x,
                y: position.y,
            })
        }
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Used for desync detection. Two simulations with identical state will
    /// produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        let ids = self.players.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            if let Some(player) = self.players.get(id) {
                id.hash(&mut hasher);
                hash_player(player, &mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the simulation state for network sync.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// The restored simulation uses the built-in clipper.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

fn hash_point(p: Vec2, hasher: &mut impl Hasher) {
    p.x.to_bits().hash(hasher);
    p.y.to_bits().hash(hasher);
}

fn hash_ring(ring: &[Vec2], hasher: &mut impl Hasher) {
    ring.len().hash(hasher);
    for &p in ring {
        hash_point(p, hasher);
    }
}

fn hash_player(player: &Player, hasher: &mut impl Hasher) {
    hash_point(player.position, hasher);
    hash_point(player.spawn_point, hasher);
    player.heading.to_bits().hash(hasher);
    player.target_heading.to_bits().hash(hasher);
    player.speed_multiplier.to_bits().hash(hasher);
    player.time_outside.to_bits().hash(hasher);
    hash_ring(&player.territory, hasher);
    hash_ring(&player.trail, hasher);
    player.hp.to_bits().hash(hasher);
    player.max_hp.to_bits().hash(hasher);
    player.level.hash(hasher);
    player.xp.to_bits().hash(hasher);
    player.kills.hash(hasher);

    player.state.name().hash(hasher);
    match &player.state {
        PlayerState::Spawning { remaining } => remaining.to_bits().hash(hasher),
        PlayerState::Snipped(fuse) => {
            fuse.attacker.hash(hasher);
            hash_point(fuse.collision_point, hasher);
            fuse.segment_index.hash(hasher);
            fuse.elapsed.to_bits().hash(hasher);
            fuse.progress.to_bits().hash(hasher);
            fuse.total_length.to_bits().hash(hasher);
        }
        PlayerState::Safe | PlayerState::Trailing | PlayerState::Dead => {}
    }

    for drone in &player.drones {
        drone.angle.to_bits().hash(hasher);
        drone.hp.to_bits().hash(hasher);
        drone.cooldown.to_bits().hash(hasher);
        drone.target.hash(hasher);
    }
}
