//! Collision layers and proximity broad-phase
//!
//! Interest is driven by overlap events. Anything that can report
//! enter/exit pairs can feed the world; [`ProximityBroadPhase`] is the
//! in-process source that diffs circle overlaps once per tick.

use std::collections::{BTreeSet, HashMap};

use bitflags::bitflags;
use tracing::trace;

use crate::game::entity::{Location, NetworkId};

bitflags! {
    /// Collision layer bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CollisionLayers: u32 {
        /// Interest areas
        const AREA = 1 << 0;
        /// Player bodies
        const AISLING = 1 << 1;
        /// Player-only trigger areas
        const AISLING_AREA = 1 << 2;
        const MONSTER = 1 << 3;
        const MAP_OBJECT = 1 << 4;
    }
}

/// Layer and mask pair attached to a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collider {
    /// Layers this shape occupies
    pub layer: CollisionLayers,
    /// Layers this shape can overlap
    pub mask: CollisionLayers,
}

impl Collider {
    pub const fn new(layer: CollisionLayers, mask: CollisionLayers) -> Self {
        Self { layer, mask }
    }

    /// Collider of a player's interest area
    pub fn interest_area() -> Self {
        Self::new(
            CollisionLayers::AREA,
            CollisionLayers::AISLING | CollisionLayers::MONSTER | CollisionLayers::MAP_OBJECT,
        )
    }

    /// Two shapes interact only when each mask intersects the other's layer
    pub fn interacts_with(&self, other: &Collider) -> bool {
        self.mask.intersects(other.layer) && other.mask.intersects(self.layer)
    }
}

/// Overlap change reported by a broad-phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OverlapEvent {
    /// `other` entered `area_owner`'s interest area
    Enter {
        area_owner: NetworkId,
        other: NetworkId,
    },
    /// `other` left `area_owner`'s interest area
    Exit {
        area_owner: NetworkId,
        other: NetworkId,
    },
}

impl OverlapEvent {
    pub fn area_owner(&self) -> NetworkId {
        match *self {
            OverlapEvent::Enter { area_owner, .. } | OverlapEvent::Exit { area_owner, .. } => {
                area_owner
            }
        }
    }

    pub fn other(&self) -> NetworkId {
        match *self {
            OverlapEvent::Enter { other, .. } | OverlapEvent::Exit { other, .. } => other,
        }
    }
}

/// Circular sensor shape centred on its owner
#[derive(Debug, Clone, Copy)]
pub struct AreaShape {
    pub owner: NetworkId,
    pub location: Location,
    pub radius: f32,
    pub collider: Collider,
}

/// Point body of an entity
#[derive(Debug, Clone, Copy)]
pub struct BodyShape {
    pub id: NetworkId,
    pub location: Location,
    pub collider: Collider,
}

/// Grid cell key: map, then cell column and row
type Cell = (u16, u32, u32);

fn cell_of(location: &Location, size: u32) -> Cell {
    (
        location.map,
        u32::from(location.x) / size,
        u32::from(location.y) / size,
    )
}

/// Tracks area/body overlaps between ticks
#[derive(Debug, Default)]
pub struct ProximityBroadPhase {
    /// (area owner, body) pairs overlapping as of the last update
    overlaps: BTreeSet<(NetworkId, NetworkId)>,
}

impl ProximityBroadPhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute overlaps and report what changed.
    ///
    /// Exits come first, then enters, each in (owner, other) order. An
    /// owner never overlaps its own body.
    ///
    /// Bodies are bucketed per map into square cells at least as wide as
    /// the largest radius, so each area only tests the 3x3 block of cells
    /// around its own.
    pub fn update(&mut self, areas: &[AreaShape], bodies: &[BodyShape]) -> Vec<OverlapEvent> {
        let mut current = BTreeSet::new();

        let cell_size = areas
            .iter()
            .map(|area| area.radius.ceil() as u32)
            .max()
            .unwrap_or(1)
            .max(1);

        let mut grid: HashMap<Cell, Vec<&BodyShape>> = HashMap::new();
        for body in bodies {
            grid.entry(cell_of(&body.location, cell_size))
                .or_default()
                .push(body);
        }

        for area in areas {
            let (map, cx, cy) = cell_of(&area.location, cell_size);
            for x in cx.saturating_sub(1)..=cx.saturating_add(1) {
                for y in cy.saturating_sub(1)..=cy.saturating_add(1) {
                    let Some(nearby) = grid.get(&(map, x, y)) else {
                        continue;
                    };
                    for body in nearby {
                        if body.id == area.owner {
                            continue;
                        }
                        if !area.collider.interacts_with(&body.collider) {
                            continue;
                        }
                        if area.location.within(&body.location, area.radius) {
                            current.insert((area.owner, body.id));
                        }
                    }
                }
            }
        }

        let mut events = Vec::new();
        for &(area_owner, other) in self.overlaps.difference(&current) {
            trace!(area_owner = %area_owner, other = %other, "Overlap ended");
            events.push(OverlapEvent::Exit { area_owner, other });
        }
        for &(area_owner, other) in current.difference(&self.overlaps) {
            trace!(area_owner = %area_owner, other = %other, "Overlap began");
            events.push(OverlapEvent::Enter { area_owner, other });
        }

        self.overlaps = current;
        events
    }

    /// Drop every pair involving `id` without reporting exits
    pub fn forget(&mut self, id: NetworkId) {
        self.overlaps
            .retain(|&(owner, other)| owner != id && other != id);
    }

    pub fn is_overlapping(&self, area_owner: NetworkId, other: NetworkId) -> bool {
        self.overlaps.contains(&(area_owner, other))
    }

    pub fn overlap_count(&self) -> usize {
        self.overlaps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::EntityKind;

    fn area(owner: u32, x: u16, y: u16) -> AreaShape {
        AreaShape {
            owner: NetworkId(owner),
            location: Location::new(0, x, y),
            radius: 5.0,
            collider: Collider::interest_area(),
        }
    }

    fn body(id: u32, kind: EntityKind, x: u16, y: u16) -> BodyShape {
        BodyShape {
            id: NetworkId(id),
            location: Location::new(0, x, y),
            collider: kind.body(),
        }
    }

    #[test]
    fn test_layer_compatibility() {
        let interest = Collider::interest_area();
        assert!(interest.interacts_with(&EntityKind::Player.body()));
        assert!(interest.interacts_with(&EntityKind::Monster.body()));
        assert!(interest.interacts_with(&EntityKind::MapObject.body()));

        // Two interest areas never see each other
        assert!(!interest.interacts_with(&Collider::interest_area()));

        // Bodies don't overlap bodies
        assert!(!EntityKind::Player.body().interacts_with(&EntityKind::Monster.body()));
    }

    #[test]
    fn test_one_sided_mask_does_not_interact() {
        let a = Collider::new(CollisionLayers::AREA, CollisionLayers::MONSTER);
        let b = Collider::new(CollisionLayers::MONSTER, CollisionLayers::AISLING);
        assert!(!a.interacts_with(&b));
        assert!(!b.interacts_with(&a));
    }

    #[test]
    fn test_enter_and_exit() {
        let mut phase = ProximityBroadPhase::new();
        let areas = [area(1, 10, 10)];

        let events = phase.update(&areas, &[body(2, EntityKind::Monster, 12, 10)]);
        assert_eq!(
            events,
            vec![OverlapEvent::Enter {
                area_owner: NetworkId(1),
                other: NetworkId(2)
            }]
        );

        // No change, no events
        assert!(phase
            .update(&areas, &[body(2, EntityKind::Monster, 13, 10)])
            .is_empty());

        let events = phase.update(&areas, &[body(2, EntityKind::Monster, 30, 10)]);
        assert_eq!(
            events,
            vec![OverlapEvent::Exit {
                area_owner: NetworkId(1),
                other: NetworkId(2)
            }]
        );
        assert_eq!(phase.overlap_count(), 0);
    }

    #[test]
    fn test_owner_skips_own_body() {
        let mut phase = ProximityBroadPhase::new();
        let events = phase.update(&[area(1, 10, 10)], &[body(1, EntityKind::Player, 10, 10)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_exits_precede_enters() {
        let mut phase = ProximityBroadPhase::new();
        let areas = [area(1, 10, 10)];
        phase.update(&areas, &[body(3, EntityKind::Monster, 10, 11)]);

        let events = phase.update(
            &areas,
            &[
                body(2, EntityKind::Monster, 10, 12),
                body(3, EntityKind::Monster, 40, 40),
            ],
        );
        assert_eq!(
            events,
            vec![
                OverlapEvent::Exit {
                    area_owner: NetworkId(1),
                    other: NetworkId(3)
                },
                OverlapEvent::Enter {
                    area_owner: NetworkId(1),
                    other: NetworkId(2)
                },
            ]
        );
    }

    #[test]
    fn test_forget_is_silent() {
        let mut phase = ProximityBroadPhase::new();
        let areas = [area(1, 10, 10)];
        phase.update(&areas, &[body(2, EntityKind::Player, 10, 11)]);
        assert!(phase.is_overlapping(NetworkId(1), NetworkId(2)));

        phase.forget(NetworkId(2));
        assert!(!phase.is_overlapping(NetworkId(1), NetworkId(2)));
        assert!(phase.update(&areas, &[]).is_empty());
    }

    #[test]
    fn test_pairs_across_cell_edges() {
        // Radius 5 gives 5-wide cells: the area sits in cell 1, the
        // bodies in cells 2 and 0 at exactly the radius
        let mut phase = ProximityBroadPhase::new();
        let events = phase.update(
            &[area(1, 9, 9)],
            &[
                body(2, EntityKind::Monster, 14, 9),
                body(3, EntityKind::Monster, 4, 9),
                body(4, EntityKind::Monster, 15, 9),
            ],
        );
        assert_eq!(
            events,
            vec![
                OverlapEvent::Enter {
                    area_owner: NetworkId(1),
                    other: NetworkId(2)
                },
                OverlapEvent::Enter {
                    area_owner: NetworkId(1),
                    other: NetworkId(3)
                },
            ]
        );
    }

    #[test]
    fn test_grid_matches_exhaustive_pairing() {
        let areas: Vec<AreaShape> = (0..6u16)
            .map(|i| AreaShape {
                radius: 3.0 + f32::from(i),
                ..area(u32::from(i) + 1, i * 7, 20 - i * 3)
            })
            .collect();
        let bodies: Vec<BodyShape> = (0..40u16)
            .map(|i| body(u32::from(i) + 1, EntityKind::Monster, (i * 13) % 50, (i * 7) % 30))
            .collect();

        let mut expected = Vec::new();
        for a in &areas {
            for b in &bodies {
                if a.owner != b.id && a.location.within(&b.location, a.radius) {
                    expected.push(OverlapEvent::Enter {
                        area_owner: a.owner,
                        other: b.id,
                    });
                }
            }
        }
        expected.sort();
        assert!(!expected.is_empty());

        let mut phase = ProximityBroadPhase::new();
        assert_eq!(phase.update(&areas, &bodies), expected);
    }

    #[test]
    fn test_different_maps_never_overlap() {
        let mut phase = ProximityBroadPhase::new();
        let other_map = BodyShape {
            id: NetworkId(2),
            location: Location::new(7, 10, 10),
            collider: EntityKind::Monster.body(),
        };
        assert!(phase.update(&[area(1, 10, 10)], &[other_map]).is_empty());
    }
}
