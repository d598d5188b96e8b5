//! Delve ECS -- entity-component store partitioned by dungeon tier.
//!
//! Entities are ids plus a tag-keyed map of components drawn from a closed
//! schema ([`component::Component`]). Each entity belongs to exactly one
//! [`Tier`](identity::Tier); the store keeps a per-tier index so tier-scoped
//! queries never look at other floors. Ids are never reused.
//!
//! # Quick Start
//!
//! ```
//! use delve_ecs::prelude::*;
//!
//! let mut world = World::new();
//! let e = world.spawn_with(
//!     Tier(0),
//!     [Position { x: 0.0, y: 0.0 }.into(), Hitbox::new(10.0, 10.0).into()],
//! );
//!
//! assert_eq!(world.get::<Position>(e), Some(&Position { x: 0.0, y: 0.0 }));
//! assert_eq!(
//!     world.entities_with(&[ComponentTag::Position, ComponentTag::Hitbox], Some(Tier(0))),
//!     vec![e],
//! );
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod entity;
pub mod identity;
pub mod query;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (despawned or never created).
    #[error("entity {entity:?} does not exist")]
    StaleEntity { entity: entity::EntityId },

    /// `create_entity` was asked for an id that is already alive.
    #[error("entity {entity:?} already exists")]
    DuplicateEntity { entity: entity::EntityId },

    /// `create_entity` was asked for an id that belonged to a removed entity.
    #[error("entity id {entity:?} was retired and cannot be reused")]
    RetiredEntity { entity: entity::EntityId },

    /// A command that needs a target entity was queued without one.
    #[error("command has no target entity")]
    MissingTarget,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{ApplyReport, Command, CommandBuffer, CommandKind};
    pub use crate::component::{
        Attack, Collision, Component, ComponentData, ComponentTag, Contact, ContactKind, Health,
        Hitbox, Kind, MovementIntent, PendingRemoval, Position, TransitionLock, Visuals,
    };
    pub use crate::entity::EntityId;
    pub use crate::identity::{
        EntityKind, Faction, FountainState, LootState, MonsterState, NpcState, PlayerState,
        PortalState, ProjectileState, StairDirection, StairState, Tier, TriggerMode,
        TriggerState,
    };
    pub use crate::query::Query;
    pub use crate::world::{Entity, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
