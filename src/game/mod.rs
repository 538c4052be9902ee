//! Game module
//!
//! This module contains the world-side synchronization core:
//! - Entity arena with stable network ids
//! - Interest areas and the observer registry they drive
//! - Observable panes (inventory, spells, skills, equipment) and the
//!   bridge that turns their changes into packets
//! - The world listener and tick loop

pub mod collection;
pub mod collision;
pub mod entity;
pub mod interest;
pub mod item;
pub mod listener;
pub mod panes;
pub mod peer;
pub mod player;
pub mod world;

pub use entity::{EntityKind, Location, NetworkId};
pub use listener::WorldListener;
pub use player::Player;
pub use world::{World, WorldSettings};
