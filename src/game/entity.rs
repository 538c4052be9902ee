//! Networked entity identity
//!
//! Every entity the world tracks (players, monsters, map objects) carries a
//! [`NetworkId`] and an observer set: the peers currently entitled to hear
//! about its state changes. Peers are referenced by id only; the world
//! resolves them at send time.

use std::collections::BTreeSet;
use std::fmt;

use crate::game::collision::{Collider, CollisionLayers};

/// Stable id of an active entity
///
/// A player's peer shares its entity's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(pub u32);

impl NetworkId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Monster,
    MapObject,
}

impl EntityKind {
    /// Kind byte sent in display packets
    pub fn code(&self) -> u8 {
        match self {
            EntityKind::Player => 0,
            EntityKind::Monster => 1,
            EntityKind::MapObject => 2,
        }
    }

    /// Layer the entity's body occupies
    pub fn layer(&self) -> CollisionLayers {
        match self {
            EntityKind::Player => CollisionLayers::AISLING,
            EntityKind::Monster => CollisionLayers::MONSTER,
            EntityKind::MapObject => CollisionLayers::MAP_OBJECT,
        }
    }

    /// Layers the entity's body can be overlapped by
    pub fn mask(&self) -> CollisionLayers {
        match self {
            EntityKind::Player => CollisionLayers::AREA | CollisionLayers::AISLING_AREA,
            EntityKind::Monster | EntityKind::MapObject => CollisionLayers::AREA,
        }
    }

    /// Body collider for this kind
    pub fn body(&self) -> Collider {
        Collider::new(self.layer(), self.mask())
    }

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Monster => "monster",
            EntityKind::MapObject => "map_object",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tile position on a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub map: u16,
    pub x: u16,
    pub y: u16,
}

impl Location {
    pub fn new(map: u16, x: u16, y: u16) -> Self {
        Self { map, x, y }
    }

    /// Euclidean distance in tiles, `None` across maps
    pub fn distance(&self, other: &Location) -> Option<f32> {
        if self.map != other.map {
            return None;
        }
        let dx = f32::from(self.x) - f32::from(other.x);
        let dy = f32::from(self.y) - f32::from(other.y);
        Some((dx * dx + dy * dy).sqrt())
    }

    /// Check if `other` lies within `radius` tiles on the same map
    pub fn within(&self, other: &Location, radius: f32) -> bool {
        self.distance(other).is_some_and(|d| d <= radius)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, map {})", self.x, self.y, self.map)
    }
}

/// Network identity and observer set of one entity
#[derive(Debug, Clone)]
pub struct Identity {
    network_id: NetworkId,
    observers: BTreeSet<NetworkId>,
}

impl Identity {
    pub fn new(network_id: NetworkId) -> Self {
        Self {
            network_id,
            observers: BTreeSet::new(),
        }
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    /// Register a peer. Returns false if it was already observing.
    pub fn add_observer(&mut self, peer: NetworkId) -> bool {
        self.observers.insert(peer)
    }

    /// Deregister a peer. Returns false if it was not observing.
    pub fn remove_observer(&mut self, peer: NetworkId) -> bool {
        self.observers.remove(&peer)
    }

    pub fn is_observed_by(&self, peer: NetworkId) -> bool {
        self.observers.contains(&peer)
    }

    /// Observers in id order
    pub fn observers(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.observers.iter().copied()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Empty the observer set, returning what it held
    pub fn take_observers(&mut self) -> BTreeSet<NetworkId> {
        std::mem::take(&mut self.observers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_distance() {
        let a = Location::new(1, 10, 10);
        let b = Location::new(1, 13, 14);
        assert_eq!(a.distance(&b), Some(5.0));
        assert!(a.within(&b, 5.0));
        assert!(!a.within(&b, 4.9));
    }

    #[test]
    fn test_location_other_map() {
        let a = Location::new(1, 10, 10);
        let b = Location::new(2, 10, 10);
        assert_eq!(a.distance(&b), None);
        assert!(!a.within(&b, 100.0));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(EntityKind::Player.code(), 0);
        assert_eq!(EntityKind::Monster.code(), 1);
        assert_eq!(EntityKind::MapObject.code(), 2);
        assert_eq!(EntityKind::MapObject.to_string(), "map_object");
    }

    #[test]
    fn test_player_body_layers() {
        let body = EntityKind::Player.body();
        assert_eq!(body.layer, CollisionLayers::AISLING);
        assert!(body.mask.contains(CollisionLayers::AREA));
        assert!(body.mask.contains(CollisionLayers::AISLING_AREA));
    }

    #[test]
    fn test_observer_registration_is_idempotent() {
        let mut identity = Identity::new(NetworkId(1));
        assert!(identity.add_observer(NetworkId(2)));
        assert!(!identity.add_observer(NetworkId(2)));
        assert_eq!(identity.observer_count(), 1);

        assert!(identity.remove_observer(NetworkId(2)));
        assert!(!identity.remove_observer(NetworkId(2)));
        assert_eq!(identity.observer_count(), 0);
    }

    #[test]
    fn test_take_observers() {
        let mut identity = Identity::new(NetworkId(1));
        identity.add_observer(NetworkId(3));
        identity.add_observer(NetworkId(2));

        let taken: Vec<_> = identity.take_observers().into_iter().collect();
        assert_eq!(taken, vec![NetworkId(2), NetworkId(3)]);
        assert_eq!(identity.observer_count(), 0);
    }
}
