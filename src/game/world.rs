//! World module
//!
//! Manages the game world including:
//! - The entity arena (players, monsters, map objects) keyed by network id
//! - Observer registration driven by interest-area overlap events
//! - Despawn cleanup of every observer cross-reference
//! - Presence and equipment broadcasts to observers
//! - The tick loop feeding the proximity broad-phase
//!
//! Peers are resolved through the arena at send time. An id that no longer
//! resolves means the target despawned; the send is dropped silently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::config::ServerConfig;
use crate::error::GameError;
use crate::game::collision::{AreaShape, BodyShape, OverlapEvent, ProximityBroadPhase};
use crate::game::entity::{EntityKind, Identity, Location, NetworkId};
use crate::game::interest::DEFAULT_INTEREST_RADIUS;
use crate::game::item::Item;
use crate::game::player::Player;
use crate::net::session::Session;
use crate::protocol::packet::ServerPacket;
use crate::protocol::server::{DisplayEntityPacket, ObservedEquipmentPacket, RemoveEntityPacket};

/// Default tick rate in milliseconds
pub const TICK_RATE_MS: u64 = 100;

/// Maximum players per world
pub const MAX_PLAYERS: usize = 2048;

/// World settings
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// World name
    pub name: String,
    /// Tick rate in milliseconds
    pub tick_rate_ms: u64,
    /// Maximum players allowed
    pub max_players: usize,
    /// Interest radius given to new players
    pub interest_radius: f32,
    /// Equipment broadcast default for new players
    pub broadcast_equipment: bool,
    /// Where new players appear
    pub spawn: Location,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            name: "Worldsync".to_string(),
            tick_rate_ms: TICK_RATE_MS,
            max_players: MAX_PLAYERS,
            interest_radius: DEFAULT_INTEREST_RADIUS,
            broadcast_equipment: false,
            spawn: Location::new(0, 10, 10),
        }
    }
}

impl WorldSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            name: config.server_name.clone(),
            tick_rate_ms: config.tick_rate_ms,
            max_players: (config.max_players as usize).min(MAX_PLAYERS),
            interest_radius: config.interest_radius,
            broadcast_equipment: config.broadcast_equipment,
            spawn: Location::new(config.spawn.map, config.spawn.x, config.spawn.y),
        }
    }

    pub fn with_broadcast_equipment(mut self, enabled: bool) -> Self {
        self.broadcast_equipment = enabled;
        self
    }

    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players;
        self
    }
}

/// An entry in the arena
#[derive(Debug)]
pub struct Entity {
    identity: Identity,
    kind: EntityKind,
    name: String,
    location: Location,
}

impl Entity {
    pub fn id(&self) -> NetworkId {
        self.identity.network_id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    fn display_packet(&self) -> DisplayEntityPacket {
        DisplayEntityPacket {
            entity_id: self.id().get(),
            kind: self.kind.code(),
            x: self.location.x,
            y: self.location.y,
            name: self.name.clone(),
        }
    }
}

/// Game world state
pub struct World {
    pub settings: WorldSettings,
    entities: HashMap<NetworkId, Entity>,
    players: HashMap<NetworkId, Player>,
    broad_phase: ProximityBroadPhase,
    next_id: u32,
    tick: u64,
}

impl World {
    pub fn new(settings: WorldSettings) -> Self {
        info!(
            name = %settings.name,
            max_players = settings.max_players,
            interest_radius = settings.interest_radius,
            "Creating game world"
        );
        Self {
            settings,
            entities: HashMap::new(),
            players: HashMap::new(),
            broad_phase: ProximityBroadPhase::new(),
            next_id: 1,
            tick: 0,
        }
    }

    /// Current tick number
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn entity(&self, id: NetworkId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn player(&self, id: NetworkId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: NetworkId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: NetworkId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Peers currently observing `id`, in id order
    pub fn observers_of(&self, id: NetworkId) -> Option<Vec<NetworkId>> {
        self.entities
            .get(&id)
            .map(|entity| entity.identity.observers().collect())
    }

    fn allocate_id(&mut self) -> NetworkId {
        loop {
            let id = NetworkId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert_entity(&mut self, kind: EntityKind, name: String, location: Location) -> NetworkId {
        let id = self.allocate_id();
        self.entities.insert(
            id,
            Entity {
                identity: Identity::new(id),
                kind,
                name,
                location,
            },
        );
        id
    }

    /// Add a player driven by `session`.
    ///
    /// The player observes itself from now until despawn.
    pub fn spawn_player(
        &mut self,
        name: impl Into<String>,
        location: Location,
        session: Arc<Session>,
    ) -> Result<NetworkId, GameError> {
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::WorldFull);
        }

        let name = name.into();
        let id = self.insert_entity(EntityKind::Player, name.clone(), location);
        let mut player = Player::new(
            id,
            name,
            session,
            self.settings.interest_radius,
            self.settings.broadcast_equipment,
        );

        if let Some(entity) = self.entities.get_mut(&id) {
            entity.identity.add_observer(id);
        }
        player.peer_mut().join(id);
        self.players.insert(id, player);

        info!(
            network_id = %id,
            location = %location,
            players = self.players.len(),
            "Player spawned"
        );
        Ok(id)
    }

    pub fn spawn_monster(&mut self, name: impl Into<String>, location: Location) -> NetworkId {
        let id = self.insert_entity(EntityKind::Monster, name.into(), location);
        debug!(network_id = %id, location = %location, "Monster spawned");
        id
    }

    pub fn spawn_map_object(&mut self, name: impl Into<String>, location: Location) -> NetworkId {
        let id = self.insert_entity(EntityKind::MapObject, name.into(), location);
        debug!(network_id = %id, location = %location, "Map object spawned");
        id
    }

    /// Remove an entity and every observer reference to or from it.
    ///
    /// Remaining observers are told the entity is gone.
    pub fn despawn(&mut self, id: NetworkId) -> Result<(), GameError> {
        let mut entity = self
            .entities
            .remove(&id)
            .ok_or(GameError::EntityNotFound(id.get()))?;

        // Peers watching this entity
        let removal = RemoveEntityPacket { entity_id: id.get() };
        for observer in entity.identity.take_observers() {
            if observer == id {
                continue;
            }
            if let Some(player) = self.players.get_mut(&observer) {
                player.peer_mut().leave(id);
                player.peer().send(&removal);
            }
        }

        // Entities this player's peer was watching
        if let Some(mut player) = self.players.remove(&id) {
            for joined in player.peer_mut().take_joined() {
                if let Some(other) = self.entities.get_mut(&joined) {
                    other.identity.remove_observer(id);
                }
            }
        }

        self.broad_phase.forget(id);

        info!(
            network_id = %id,
            kind = %entity.kind,
            players = self.players.len(),
            "Entity despawned"
        );
        Ok(())
    }

    /// Apply one overlap event.
    ///
    /// Returns whether an observer set changed. Repeated enters, exits of
    /// unobserved entities, self events, incompatible layers and ids that
    /// no longer resolve are all no-ops.
    pub fn handle_overlap(&mut self, event: OverlapEvent) -> bool {
        let watcher = event.area_owner();
        let target = event.other();
        if watcher == target {
            return false;
        }

        let (Some(player), Some(entity)) =
            (self.players.get_mut(&watcher), self.entities.get_mut(&target))
        else {
            trace!(watcher = %watcher, target = %target, "Overlap with despawned entity dropped");
            return false;
        };

        if !player
            .interest_area()
            .collider()
            .interacts_with(&entity.kind.body())
        {
            return false;
        }

        match event {
            OverlapEvent::Enter { .. } => {
                if !entity.identity.add_observer(watcher) {
                    return false;
                }
                player.peer_mut().join(target);
                player.peer().send(&entity.display_packet());
                trace!(watcher = %watcher, target = %target, "Observer added");
                true
            }
            OverlapEvent::Exit { .. } => {
                if !entity.identity.remove_observer(watcher) {
                    return false;
                }
                player.peer_mut().leave(target);
                player.peer().send(&RemoveEntityPacket {
                    entity_id: target.get(),
                });
                trace!(watcher = %watcher, target = %target, "Observer removed");
                true
            }
        }
    }

    /// Move an entity. Observers follow on the next tick.
    pub fn move_entity(&mut self, id: NetworkId, location: Location) -> Result<(), GameError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GameError::EntityNotFound(id.get()))?;
        entity.location = location;
        Ok(())
    }

    /// Run the broad-phase and apply its events, returning how many changed
    /// an observer set
    pub fn tick(&mut self) -> usize {
        self.tick += 1;

        let areas: Vec<AreaShape> = self
            .players
            .values()
            .filter_map(|player| {
                self.entities
                    .get(&player.id())
                    .map(|entity| player.interest_area().shape(entity.location))
            })
            .collect();
        let bodies: Vec<BodyShape> = self
            .entities
            .values()
            .map(|entity| BodyShape {
                id: entity.id(),
                location: entity.location,
                collider: entity.kind.body(),
            })
            .collect();

        let events = self.broad_phase.update(&areas, &bodies);
        let changed = events
            .into_iter()
            .filter(|&event| self.handle_overlap(event))
            .count();

        if self.tick % 1000 == 0 {
            debug!(
                tick = self.tick,
                entities = self.entities.len(),
                players = self.players.len(),
                "Game tick milestone"
            );
        }
        changed
    }

    /// Send a packet to every peer observing `id`.
    ///
    /// Returns the number of peers it was queued for.
    pub fn broadcast_to_observers<P: ServerPacket>(
        &self,
        id: NetworkId,
        packet: &P,
        include_self: bool,
    ) -> usize {
        let Some(entity) = self.entities.get(&id) else {
            return 0;
        };

        entity
            .identity
            .observers()
            .filter(|&observer| include_self || observer != id)
            .filter_map(|observer| self.players.get(&observer))
            .filter(|player| player.peer().send(packet))
            .count()
    }

    fn player_or_error(&mut self, id: NetworkId) -> Result<&mut Player, GameError> {
        if !self.players.contains_key(&id) {
            return Err(if self.entities.contains_key(&id) {
                GameError::NotAPlayer(id.get())
            } else {
                GameError::EntityNotFound(id.get())
            });
        }
        self.players
            .get_mut(&id)
            .ok_or(GameError::EntityNotFound(id.get()))
    }

    /// Equip an item. Observers hear about it when the player broadcasts equipment.
    pub fn equip(&mut self, id: NetworkId, slot: usize, item: Item) -> Result<(), GameError> {
        let observed = ObservedEquipmentPacket {
            entity_id: id.get(),
            slot: u8::try_from(slot).unwrap_or(u8::MAX),
            sprite: item.sprite,
            color: item.color,
        };

        let player = self.player_or_error(id)?;
        player.equipment_mut().insert(slot, item)?;
        let broadcast = player.broadcasts_equipment();

        if broadcast {
            self.broadcast_to_observers(id, &observed, false);
        }
        Ok(())
    }

    /// Unequip a slot, returning the item
    pub fn unequip(&mut self, id: NetworkId, slot: usize) -> Result<Item, GameError> {
        let player = self.player_or_error(id)?;
        let item = player.equipment_mut().remove_at(slot)?;
        let broadcast = player.broadcasts_equipment();

        if broadcast {
            let observed = ObservedEquipmentPacket {
                entity_id: id.get(),
                slot: u8::try_from(slot).unwrap_or(u8::MAX),
                sprite: 0,
                color: 0,
            };
            self.broadcast_to_observers(id, &observed, false);
        }
        Ok(item)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("settings", &self.settings)
            .field("tick", &self.tick)
            .field("entities", &self.entities.len())
            .field("players", &self.players.len())
            .field("overlaps", &self.broad_phase.overlap_count())
            .finish()
    }
}

/// Tick the world until shutdown
pub async fn run_world_loop(
    world: Arc<Mutex<World>>,
    tick_rate: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(tick_rate_ms = tick_rate.as_millis() as u64, "Starting world loop");

    let mut tick_interval = interval(tick_rate);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let changed = world.lock().tick();
                if changed > 0 {
                    trace!(changed = changed, "Observer sets updated");
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    let world = world.lock();
    info!(
        total_ticks = world.tick_count(),
        entities = world.entity_count(),
        "World loop stopped"
    );
}
