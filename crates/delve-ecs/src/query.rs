//! Tag-set queries over the [`World`].
//!
//! A [`Query`] is a small, reusable filter: a set of tags every match must
//! hold, a set of tags no match may hold, and an optional tier. Running it
//! walks the store fresh, so results always reflect the current state.
//!
//! ```
//! use delve_ecs::prelude::*;
//!
//! let mut world = World::new();
//! let e = world.spawn_with(Tier(0), [Position::default().into()]);
//! world.spawn_with(Tier(0), [Position::default().into(), PendingRemoval.into()]);
//!
//! let live = Query::new()
//!     .with(ComponentTag::Position)
//!     .without(ComponentTag::PendingRemoval)
//!     .run(&world);
//! assert_eq!(live, vec![e]);
//! ```

use crate::component::ComponentTag;
use crate::entity::EntityId;
use crate::identity::Tier;
use crate::world::World;

/// A reusable tag filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    required: Vec<ComponentTag>,
    excluded: Vec<ComponentTag>,
    tier: Option<Tier>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `tag`. Duplicate requirements are ignored.
    pub fn with(mut self, tag: ComponentTag) -> Self {
        if !self.required.contains(&tag) {
            self.required.push(tag);
        }
        self
    }

    /// Reject entities holding `tag`.
    pub fn without(mut self, tag: ComponentTag) -> Self {
        if !self.excluded.contains(&tag) {
            self.excluded.push(tag);
        }
        self
    }

    /// Restrict to one tier.
    pub fn in_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Restrict to the world's active tier at the time the query runs.
    pub fn run_in_active_tier(&self, world: &World) -> Vec<EntityId> {
        self.clone().in_tier(world.active_tier()).run(world)
    }

    /// Matching ids, sorted, without duplicates.
    pub fn run(&self, world: &World) -> Vec<EntityId> {
        let mut ids = world.entities_with(&self.required, self.tier);
        if !self.excluded.is_empty() {
            ids.retain(|id| {
                world
                    .get_entity(*id)
                    .is_some_and(|e| !self.excluded.iter().any(|t| e.has(*t)))
            });
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
