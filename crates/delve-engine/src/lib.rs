//! Delve Engine -- collision core and tick loop for a tile-grid dungeon game.
//!
//! This crate builds on [`delve_ecs`] to provide the per-tick simulation:
//! a bucketed spatial grid over the active tier, a swept-AABB collision
//! solver that fills each mover's contact list, responders that turn contacts
//! into gameplay (melee, stairs, portals, projectile hits), and a fixed-step
//! [`TickLoop`](tick::TickLoop) that runs it all in a deterministic order.
//!
//! # Quick Start
//!
//! ```
//! use delve_engine::prelude::*;
//!
//! let mut world = World::new();
//! let player = world.spawn_with(
//!     Tier(0),
//!     [
//!         Position { x: 0.0, y: 0.0 }.into(),
//!         Hitbox::new(10.0, 10.0).into(),
//!         Kind(EntityKind::Player(PlayerState::default())).into(),
//!         MovementIntent { target_x: 20.0, target_y: 0.0 }.into(),
//!     ],
//! );
//! world.spawn_with(
//!     Tier(0),
//!     [
//!         Position { x: 15.0, y: 0.0 }.into(),
//!         Hitbox::new(10.0, 10.0).into(),
//!         Kind(EntityKind::Wall).into(),
//!     ],
//! );
//!
//! let mut tick_loop = TickLoop::new(world, TickConfig::default());
//! tick_loop.tick();
//!
//! // The wall stopped the player flush against it.
//! assert_eq!(tick_loop.world().get::<Position>(player).unwrap().x, 5.0);
//! ```

#![deny(unsafe_code)]

pub mod collision;
pub mod config;
pub mod events;
pub mod movement;
pub mod response;
pub mod spatial;
pub mod sweep;
pub mod tick;
pub mod timers;
pub mod transition;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use delve_ecs;

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install a `tracing_subscriber::fmt` subscriber filtered by `RUST_LOG`,
/// falling back to `default_filter` when the variable is unset or invalid.
///
/// Returns `false` if a global subscriber was already installed, which is
/// not an error: tests and embedding hosts commonly set their own.
pub fn init_tracing(default_filter: &str) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use delve_ecs::prelude::*;

    pub use crate::collision::{detect_collisions, SolveStats, COLLISION_SYSTEM_NAME};
    pub use crate::config::{ConfigError, GameConfig};
    pub use crate::events::{EventBus, EventKind, GameEvent, HandlerId};
    pub use crate::response::{ResponseContext, ResponseError};
    pub use crate::spatial::{CellKey, SpatialGrid};
    pub use crate::sweep::{swept_aabb, Aabb, SweepHit};
    pub use crate::tick::{DeferredFn, SystemFn, TickConfig, TickDiagnostics, TickLoop};
    pub use crate::transition::{PendingTransition, TransitionState, TransitionVia};
}
