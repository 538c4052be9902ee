//! Player entities
//!
//! A player owns its peer, its interest area and its four panes. Pane
//! callbacks are bound when the player is built, so every pane mutation
//! reaches the owner's client before the mutating call returns.

use std::fmt;
use std::sync::Arc;

use crate::game::collection::ObservableList;
use crate::game::entity::NetworkId;
use crate::game::interest::InterestArea;
use crate::game::item::{Item, Skill, Spell};
use crate::game::panes;
use crate::game::peer::{Peer, PeerHandle};
use crate::net::session::Session;

pub struct Player {
    id: NetworkId,
    name: String,
    peer: Peer,
    interest_area: InterestArea,
    pub inventory: ObservableList<Item>,
    pub spells: ObservableList<Spell>,
    pub skills: ObservableList<Skill>,
    equipment: ObservableList<Item>,
    /// Whether observers are told about equipment changes
    broadcast_equipment: bool,
}

impl Player {
    pub fn new(
        id: NetworkId,
        name: impl Into<String>,
        session: Arc<Session>,
        interest_radius: f32,
        broadcast_equipment: bool,
    ) -> Self {
        let handle = PeerHandle::new(id, session);
        Self {
            id,
            name: name.into(),
            inventory: panes::inventory(&handle),
            spells: panes::spell_pane(&handle),
            skills: panes::skill_pane(&handle),
            equipment: panes::equipment(&handle),
            peer: Peer::new(handle),
            interest_area: InterestArea::new(id, interest_radius),
            broadcast_equipment,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn peer_mut(&mut self) -> &mut Peer {
        &mut self.peer
    }

    pub fn interest_area(&self) -> &InterestArea {
        &self.interest_area
    }

    /// Equipped items. Changes that observers should see go through the world.
    pub fn equipment(&self) -> &ObservableList<Item> {
        &self.equipment
    }

    /// Equipment for owner-only changes
    pub fn equipment_mut(&mut self) -> &mut ObservableList<Item> {
        &mut self.equipment
    }

    pub fn broadcasts_equipment(&self) -> bool {
        self.broadcast_equipment
    }

    pub fn set_broadcast_equipment(&mut self, enabled: bool) {
        self.broadcast_equipment = enabled;
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("session_id", &self.peer.handle().session().id)
            .field("inventory", &self.inventory.len())
            .field("spells", &self.spells.len())
            .field("skills", &self.skills.len())
            .field("equipment", &self.equipment.len())
            .field("broadcast_equipment", &self.broadcast_equipment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::panes::{EQUIPMENT_SLOTS, INVENTORY_SIZE, SKILL_PANE_SIZE, SPELL_PANE_SIZE};
    use tokio::sync::mpsc;

    fn player() -> (Player, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Arc::new(Session::with_channel(
            1,
            "127.0.0.1:4000".parse().unwrap(),
            false,
            tx,
        ));
        (Player::new(NetworkId(5), "Alice", session, 5.0, false), rx)
    }

    #[test]
    fn test_player_panes() {
        let (player, _rx) = player();
        assert_eq!(player.id(), NetworkId(5));
        assert_eq!(player.name(), "Alice");
        assert_eq!(player.peer().id(), NetworkId(5));
        assert_eq!(player.interest_area().owner(), NetworkId(5));
        assert_eq!(player.inventory.capacity(), INVENTORY_SIZE);
        assert_eq!(player.spells.capacity(), SPELL_PANE_SIZE);
        assert_eq!(player.skills.capacity(), SKILL_PANE_SIZE);
        assert_eq!(player.equipment().capacity(), EQUIPMENT_SLOTS);
    }

    #[test]
    fn test_pane_mutations_reach_owner() {
        let (mut player, mut rx) = player();
        player.inventory.push(Item::new("Apple", 3)).unwrap();
        player.skills.push(Skill::new("assail", 1)).unwrap();
        player.equipment_mut().insert(1, Item::new("Dirk", 4)).unwrap();

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_broadcast_flag() {
        let (mut player, _rx) = player();
        assert!(!player.broadcasts_equipment());
        player.set_broadcast_equipment(true);
        assert!(player.broadcasts_equipment());
    }
}
