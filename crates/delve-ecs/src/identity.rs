//! What an entity *is* and where it lives.
//!
//! - [`Tier`]: the dungeon floor an entity belongs to. Tier-scoped queries and
//!   the spatial partition only ever see entities of one tier.
//! - [`EntityKind`]: a closed set of gameplay roles. Each variant carries only
//!   the state that role legally owns, so collision responders can `match` on
//!   the kind instead of probing for loose tags.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// A logical level partition (dungeon floor). Higher numbers are deeper.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Tier(pub u32);

impl Tier {
    /// The surface floor.
    pub const SURFACE: Tier = Tier(0);

    /// The floor directly below this one.
    pub fn below(self) -> Tier {
        Tier(self.0.saturating_add(1))
    }

    /// The floor directly above this one (saturates at the surface).
    pub fn above(self) -> Tier {
        Tier(self.0.saturating_sub(1))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Small enums shared by several kinds
// ---------------------------------------------------------------------------

/// Which side an actor or projectile fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Monster,
}

impl Faction {
    /// Whether an actor of faction `other` is a valid target for `self`.
    pub fn is_hostile_to(self, other: Faction) -> bool {
        self != other
    }
}

/// Direction a staircase leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StairDirection {
    Up,
    Down,
}

/// How a trigger zone reacts to contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Fires once, then stays disarmed until its re-arm window elapses.
    OneShot,
    /// Fires on every contact.
    Presence,
}

// ---------------------------------------------------------------------------
// Per-kind state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerState {
    /// While in ranged stance the player never melees on contact.
    pub ranged_stance: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonsterState {
    pub aggroed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    /// The entity that fired this projectile. May no longer exist.
    pub source: EntityId,
    pub faction: Faction,
    pub piercing: bool,
    /// Remaining number of targets this projectile may still hit.
    pub range_left: u32,
    /// Weapon that produced the projectile. Required for player projectiles.
    pub weapon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StairState {
    pub direction: StairDirection,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalState {
    pub active: bool,
    pub destination: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    pub mode: TriggerMode,
    /// Opaque action name handed to whoever listens for the trigger.
    pub action: String,
    pub armed: bool,
    /// Seconds until a disarmed one-shot trigger re-arms.
    pub rearm_in: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootState {
    pub item: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FountainState {
    pub charges: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcState {
    pub name: String,
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The gameplay role of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Player(PlayerState),
    Monster(MonsterState),
    Projectile(ProjectileState),
    Wall,
    Stair(StairState),
    Portal(PortalState),
    Trigger(TriggerState),
    Loot(LootState),
    Fountain(FountainState),
    Npc(NpcState),
}

impl EntityKind {
    /// Short, stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Player(_) => "player",
            EntityKind::Monster(_) => "monster",
            EntityKind::Projectile(_) => "projectile",
            EntityKind::Wall => "wall",
            EntityKind::Stair(_) => "stair",
            EntityKind::Portal(_) => "portal",
            EntityKind::Trigger(_) => "trigger",
            EntityKind::Loot(_) => "loot",
            EntityKind::Fountain(_) => "fountain",
            EntityKind::Npc(_) => "npc",
        }
    }

    /// The faction of an actor, if this kind fights at all.
    pub fn faction(&self) -> Option<Faction> {
        match self {
            EntityKind::Player(_) => Some(Faction::Player),
            EntityKind::Monster(_) => Some(Faction::Monster),
            EntityKind::Projectile(p) => Some(p.faction),
            _ => None,
        }
    }

    /// Whether this kind stops movement.
    pub fn is_solid(&self) -> bool {
        matches!(self, EntityKind::Wall | EntityKind::Npc(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
