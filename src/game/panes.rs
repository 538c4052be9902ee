//! Pane synchronization
//!
//! Binds each pane collection to its owner's peer. Added slots become the
//! pane's add packet, removed slots become its remove packet carrying only
//! the slot index. Only the owner is told; observer broadcast is handled
//! by the world.

use crate::game::collection::{CollectionEvent, ObservableList};
use crate::game::item::{Item, Skill, Spell};
use crate::game::peer::PeerHandle;
use crate::protocol::server::{
    AddItemToPanePacket, AddSkillToPanePacket, AddSpellToPanePacket, EquipmentPacket,
    RemoveItemFromPanePacket, RemoveSkillFromPanePacket, RemoveSpellFromPanePacket,
    UnequipPacket,
};

pub const INVENTORY_SIZE: usize = 60;
pub const SPELL_PANE_SIZE: usize = 90;
pub const SKILL_PANE_SIZE: usize = 90;
pub const EQUIPMENT_SLOTS: usize = 18;

// Pane capacities stay below 256, so every index fits the slot byte
fn slot(index: usize) -> u8 {
    u8::try_from(index).unwrap_or(u8::MAX)
}

pub fn item_added(index: usize, item: &Item) -> AddItemToPanePacket {
    AddItemToPanePacket {
        slot: slot(index),
        sprite: item.sprite,
        color: item.color,
        name: item.name.clone(),
        quantity: item.quantity,
        stackable: item.stackable,
        max_durability: item.max_durability,
        durability: item.durability,
    }
}

pub fn spell_added(index: usize, spell: &Spell) -> AddSpellToPanePacket {
    AddSpellToPanePacket {
        slot: slot(index),
        icon: spell.icon,
        spell_type: spell.spell_type,
        name: spell.name.clone(),
        prompt: spell.prompt.clone(),
        cast_lines: spell.cast_lines,
    }
}

pub fn skill_added(index: usize, skill: &Skill) -> AddSkillToPanePacket {
    AddSkillToPanePacket {
        slot: slot(index),
        icon: skill.icon,
        name: skill.name.clone(),
    }
}

pub fn equipped(index: usize, item: &Item) -> EquipmentPacket {
    EquipmentPacket {
        slot: slot(index),
        sprite: item.sprite,
        color: item.color,
        name: item.name.clone(),
        max_durability: item.max_durability,
        durability: item.durability,
    }
}

/// Inventory pane bound to `peer`
pub fn inventory(peer: &PeerHandle) -> ObservableList<Item> {
    let mut pane = ObservableList::with_capacity(INVENTORY_SIZE);
    let peer = peer.clone();
    pane.subscribe(move |event| match *event {
        CollectionEvent::Added { index, item } => {
            peer.send(&item_added(index, item));
        }
        CollectionEvent::Removed { index, .. } => {
            peer.send(&RemoveItemFromPanePacket { slot: slot(index) });
        }
    });
    pane
}

/// Spell pane bound to `peer`
pub fn spell_pane(peer: &PeerHandle) -> ObservableList<Spell> {
    let mut pane = ObservableList::with_capacity(SPELL_PANE_SIZE);
    let peer = peer.clone();
    pane.subscribe(move |event| match *event {
        CollectionEvent::Added { index, item } => {
            peer.send(&spell_added(index, item));
        }
        CollectionEvent::Removed { index, .. } => {
            peer.send(&RemoveSpellFromPanePacket { slot: slot(index) });
        }
    });
    pane
}

/// Skill pane bound to `peer`
pub fn skill_pane(peer: &PeerHandle) -> ObservableList<Skill> {
    let mut pane = ObservableList::with_capacity(SKILL_PANE_SIZE);
    let peer = peer.clone();
    pane.subscribe(move |event| match *event {
        CollectionEvent::Added { index, item } => {
            peer.send(&skill_added(index, item));
        }
        CollectionEvent::Removed { index, .. } => {
            peer.send(&RemoveSkillFromPanePacket { slot: slot(index) });
        }
    });
    pane
}

/// Equipment bound to `peer`
pub fn equipment(peer: &PeerHandle) -> ObservableList<Item> {
    let mut pane = ObservableList::with_capacity(EQUIPMENT_SLOTS);
    let peer = peer.clone();
    pane.subscribe(move |event| match *event {
        CollectionEvent::Added { index, item } => {
            peer.send(&equipped(index, item));
        }
        CollectionEvent::Removed { index, .. } => {
            peer.send(&UnequipPacket { slot: slot(index) });
        }
    });
    pane
}
