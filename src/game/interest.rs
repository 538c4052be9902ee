//! Player interest areas
//!
//! An interest area has no position of its own. It is parented to its
//! owner and takes the owner's location whenever a shape is built.

use crate::game::collision::{AreaShape, Collider};
use crate::game::entity::{Location, NetworkId};

/// Default interest radius in tiles
pub const DEFAULT_INTEREST_RADIUS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestArea {
    owner: NetworkId,
    radius: f32,
    collider: Collider,
}

impl InterestArea {
    pub fn new(owner: NetworkId, radius: f32) -> Self {
        Self {
            owner,
            radius,
            collider: Collider::interest_area(),
        }
    }

    pub fn owner(&self) -> NetworkId {
        self.owner
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn collider(&self) -> Collider {
        self.collider
    }

    /// Shape for a broad-phase pass with the owner at `location`
    pub fn shape(&self, location: Location) -> AreaShape {
        AreaShape {
            owner: self.owner,
            location,
            radius: self.radius,
            collider: self.collider,
        }
    }

    /// Check whether an entity body with `other` collider at `at` would overlap
    pub fn covers(&self, center: &Location, at: &Location, other: &Collider) -> bool {
        self.collider.interacts_with(other) && center.within(at, self.radius)
    }
}
