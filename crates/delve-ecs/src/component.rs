//! Component schema and tags.
//!
//! The component set is closed: every record an entity can hold is a variant
//! of [`Component`], and every variant has exactly one [`ComponentTag`]. An
//! entity stores its components in a map keyed by tag, so "at most one
//! component per tag" holds structurally.
//!
//! Typed access goes through [`ComponentData`], implemented for each record:
//!
//! ```
//! use delve_ecs::component::{Component, ComponentData, Position};
//!
//! let c: Component = Position { x: 1.0, y: 2.0 }.into();
//! assert_eq!(Position::from_component(&c), Some(&Position { x: 1.0, y: 2.0 }));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::EntityId;
use crate::identity::EntityKind;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Top-left corner of an entity, in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned collision box, relative to [`Position`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hitbox {
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Hitbox {
    /// A hitbox flush with the entity's position.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Builder-style offset.
    pub fn with_offset(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }
}

/// Render extent. The renderer itself lives elsewhere; the spatial partition
/// uses the extent for entities that have no hitbox.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Visuals {
    pub width: f64,
    pub height: f64,
    pub sprite: String,
}

/// Where an entity wants to be at the end of this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MovementIntent {
    pub target_x: f64,
    pub target_y: f64,
}

/// Whether a contact was already overlapping or was found by the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    /// Overlapping at the start of the motion (entry time zero).
    Current,
    /// Reached part-way through this tick's motion.
    Dynamic,
}

/// One detected touch between a mover and a target during this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub mover: EntityId,
    pub target: EntityId,
    pub kind: ContactKind,
    /// Push-back direction for the mover.
    pub normal_x: f64,
    pub normal_y: f64,
    /// Distance travelled along the motion before contact, in pixels.
    pub distance: f64,
    /// Fraction of the motion at which contact starts, in `[0, 1]`.
    pub entry_time: f64,
}

/// Contacts found for the owning mover during the current tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Collision {
    pub contacts: Vec<Contact>,
}

/// The entity's gameplay role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kind(pub EntityKind);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }
}

/// Melee capability: cooldown window and adjacency reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    /// Seconds between attacks.
    pub cooldown: f64,
    /// Seconds until the next attack is allowed.
    pub remaining: f64,
    /// Extra pixels around the hitbox that still count as adjacent.
    pub reach: f64,
}

impl Attack {
    pub fn ready(&self) -> bool {
        self.remaining <= 0.0
    }
}

/// Temporary lock on tier transitions (stairs, portals).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionLock {
    /// Seconds until the lock clears itself.
    pub remaining: f64,
}

/// Marks an entity for despawn at the end of the tick. Every system must skip
/// entities carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingRemoval;

// ---------------------------------------------------------------------------
// Component / ComponentTag
// ---------------------------------------------------------------------------

/// Type tag of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentTag {
    Position,
    Hitbox,
    Visuals,
    MovementIntent,
    Collision,
    Kind,
    Health,
    Attack,
    TransitionLock,
    PendingRemoval,
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Any component value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    Position(Position),
    Hitbox(Hitbox),
    Visuals(Visuals),
    MovementIntent(MovementIntent),
    Collision(Collision),
    Kind(Kind),
    Health(Health),
    Attack(Attack),
    TransitionLock(TransitionLock),
    PendingRemoval(PendingRemoval),
}

/// Typed view of one [`Component`] variant.
pub trait ComponentData: Into<Component> + Sized + 'static {
    /// The tag under which this record is stored.
    const TAG: ComponentTag;

    fn from_component(component: &Component) -> Option<&Self>;

    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;

    /// Move the record out of a component of the matching variant.
    fn into_record(component: Component) -> Option<Self>;
}

macro_rules! component_variants {
    ($($name:ident),* $(,)?) => {
        impl Component {
            /// The tag of this component value.
            pub fn tag(&self) -> ComponentTag {
                match self {
                    $(Component::$name(_) => ComponentTag::$name,)*
                }
            }
        }

        $(
            impl From<$name> for Component {
                fn from(value: $name) -> Self {
                    Component::$name(value)
                }
            }

            impl ComponentData for $name {
                const TAG: ComponentTag = ComponentTag::$name;

                fn from_component(component: &Component) -> Option<&Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        _ => None,
                    }
                }

                fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        _ => None,
                    }
                }

                fn into_record(component: Component) -> Option<Self> {
                    match component {
                        Component::$name(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

component_variants!(
    Position,
    Hitbox,
    Visuals,
    MovementIntent,
    Collision,
    Kind,
    Health,
    Attack,
    TransitionLock,
    PendingRemoval,
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
