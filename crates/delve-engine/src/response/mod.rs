//! Collision response dispatch.
//!
//! Three responders run after the solver, always in the same order:
//!
//! 1. [`player`]: melee, triggers, stairs, portals, loot, fountains, blocking.
//! 2. [`monster`]: aggro spread, projectile hit synthesis, blocking.
//! 3. [`projectile`]: damage requests and pierce budget.
//!
//! Each responder *takes* the contact list out of the mover's [`Collision`]
//! component before acting on it, so no contact is handled twice. Contacts
//! are handled in the order the mover reaches them. Entities
//! flagged with [`PendingRemoval`] are skipped both as movers and as targets.
//!
//! Shared channels (event bus, tuning, transition state) reach the responders
//! through [`ResponseContext`]; nothing here touches global state.

pub mod monster;
pub mod player;
pub mod projectile;

use delve_ecs::component::{
    Collision, ComponentTag, Contact, Kind, MovementIntent, PendingRemoval, Position,
};
use delve_ecs::entity::EntityId;
use delve_ecs::world::World;
use tracing::{debug, error};

use crate::config::GameConfig;
use crate::events::{EventBus, GameEvent};
use crate::transition::TransitionState;

// ---------------------------------------------------------------------------
// Errors and context
// ---------------------------------------------------------------------------

/// A responder found state that upstream code must never produce.
///
/// The offending entity's processing stops; the rest of the tick continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseError {
    #[error("invariant violated by {entity:?}: {reason}")]
    InvariantViolation { entity: EntityId, reason: String },
}

/// Channels shared by every responder.
pub struct ResponseContext<'a> {
    pub bus: &'a mut EventBus,
    pub config: &'a GameConfig,
    pub transitions: &'a mut TransitionState,
}

/// Run all three responders in order. Errors are logged and returned.
pub fn respond_all(world: &mut World, ctx: &mut ResponseContext<'_>) -> Vec<ResponseError> {
    let mut errors = Vec::new();
    errors.extend(player::respond(world, ctx));
    errors.extend(monster::respond(world, ctx));
    errors.extend(projectile::respond(world, ctx));
    for e in &errors {
        error!(error = %e, "collision response aborted");
    }
    errors
}

// ---------------------------------------------------------------------------
// Helpers shared by the responders
// ---------------------------------------------------------------------------

/// Entities of the active tier whose kind matches `pred` and that hold a
/// collision list, in id order. Entities pending removal are left out.
pub(crate) fn responders(world: &World, pred: impl Fn(&Kind) -> bool) -> Vec<EntityId> {
    world
        .entities_with(
            &[ComponentTag::Kind, ComponentTag::Collision],
            Some(world.active_tier()),
        )
        .into_iter()
        .filter(|id| !world.has(*id, ComponentTag::PendingRemoval))
        .filter(|id| world.get::<Kind>(*id).is_some_and(&pred))
        .collect()
}

/// Move the contact list out of `id`'s collision component, earliest contact
/// first. Equal entry times are ordered by target id.
pub(crate) fn take_contacts(world: &mut World, id: EntityId) -> Vec<Contact> {
    let mut contacts = world
        .get_mut::<Collision>(id)
        .map(|c| std::mem::take(&mut c.contacts))
        .unwrap_or_default();
    contacts.sort_by(|a, b| {
        a.entry_time
            .total_cmp(&b.entry_time)
            .then_with(|| a.target.cmp(&b.target))
    });
    contacts
}

/// Whether `id` exists and is not waiting for cleanup.
pub(crate) fn is_live(world: &World, id: EntityId) -> bool {
    world.is_alive(id) && !world.has(id, ComponentTag::PendingRemoval)
}

/// Flag `id` for end-of-tick despawn and announce it. Flagging twice is a
/// no-op.
pub(crate) fn flag_for_removal(world: &mut World, bus: &mut EventBus, id: EntityId) {
    if world.has(id, ComponentTag::PendingRemoval) {
        return;
    }
    if world.insert_component(id, PendingRemoval).is_ok() {
        bus.emit(GameEvent::RemovalRequested { entity: id });
    }
}

/// Earliest blocking contact seen for one mover.
///
/// A contact blocks when the motion points into the target, i.e. against the
/// contact normal. A mover already overlapping a solid and moving out of it
/// is not held in place.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct MotionClamp {
    earliest: Option<f64>,
}

impl MotionClamp {
    pub(crate) fn block(&mut self, world: &World, contact: &Contact) {
        let Some((dx, dy)) = motion(world, contact.mover) else {
            return;
        };
        if dx * contact.normal_x + dy * contact.normal_y >= 0.0 {
            return;
        }
        self.stop_at(contact.entry_time);
    }

    /// End the motion at `entry_time` regardless of direction.
    pub(crate) fn stop_at(&mut self, entry_time: f64) {
        self.earliest = Some(match self.earliest {
            Some(t) => t.min(entry_time),
            None => entry_time,
        });
    }

    /// Whether a contact at `entry_time` lies past the point where the
    /// motion already ended.
    pub(crate) fn beyond(&self, entry_time: f64) -> bool {
        self.earliest.is_some_and(|t| entry_time > t)
    }

    /// Truncate the mover's intent to the earliest blocking contact point.
    pub(crate) fn apply(self, world: &mut World, mover: EntityId) {
        let Some(t) = self.earliest else {
            return;
        };
        let Some(position) = world.get::<Position>(mover).copied() else {
            return;
        };
        if let Some(intent) = world.get_mut::<MovementIntent>(mover) {
            intent.target_x = position.x + (intent.target_x - position.x) * t;
            intent.target_y = position.y + (intent.target_y - position.y) * t;
            debug!(entity = ?mover, entry = t, "movement blocked");
        }
    }
}

/// Intended motion of `id` this tick.
pub(crate) fn motion(world: &World, id: EntityId) -> Option<(f64, f64)> {
    let position = world.get::<Position>(id)?;
    let intent = world.get::<MovementIntent>(id)?;
    Some((intent.target_x - position.x, intent.target_y - position.y))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use delve_ecs::component::ContactKind;
    use delve_ecs::identity::Tier;

    fn contact(mover: EntityId, normal_x: f64, entry_time: f64) -> Contact {
        Contact {
            mover,
            target: EntityId::new(99),
            kind: ContactKind::Dynamic,
            normal_x,
            normal_y: 0.0,
            distance: 0.0,
            entry_time,
        }
    }

    fn walker(world: &mut World) -> EntityId {
        world.spawn_with(
            Tier(0),
            [
                Position { x: 0.0, y: 0.0 }.into(),
                MovementIntent { target_x: 40.0, target_y: 0.0 }.into(),
            ],
        )
    }

    #[test]
    fn clamp_truncates_to_earliest_block() {
        let mut world = World::new();
        let e = walker(&mut world);
        let mut clamp = MotionClamp::default();
        clamp.block(&world, &contact(e, -1.0, 0.5));
        clamp.block(&world, &contact(e, -1.0, 0.25));
        clamp.apply(&mut world, e);
        let intent = world.get::<MovementIntent>(e).unwrap();
        assert_eq!((intent.target_x, intent.target_y), (10.0, 0.0));
    }

    #[test]
    fn clamp_ignores_contacts_moving_away() {
        let mut world = World::new();
        let e = walker(&mut world);
        let mut clamp = MotionClamp::default();
        clamp.block(&world, &contact(e, 1.0, 0.0));
        clamp.apply(&mut world, e);
        assert_eq!(world.get::<MovementIntent>(e).unwrap().target_x, 40.0);
    }

    #[test]
    fn contacts_are_taken_in_time_order() {
        let mut world = World::new();
        let e = walker(&mut world);
        let late = Contact { target: EntityId::new(1), ..contact(e, -1.0, 0.75) };
        let early = Contact { target: EntityId::new(7), ..contact(e, -1.0, 0.25) };
        let tied = Contact { target: EntityId::new(3), ..contact(e, -1.0, 0.25) };
        world
            .insert_component(e, Collision { contacts: vec![late, early, tied] })
            .unwrap();

        let order: Vec<_> = take_contacts(&mut world, e).iter().map(|c| c.target).collect();
        assert_eq!(order, vec![EntityId::new(3), EntityId::new(7), EntityId::new(1)]);
        assert!(world.get::<Collision>(e).unwrap().contacts.is_empty());
    }

    #[test]
    fn stopped_motion_reports_later_contacts_as_beyond() {
        let mut world = World::new();
        let e = walker(&mut world);
        let mut clamp = MotionClamp::default();
        assert!(!clamp.beyond(1.0));
        clamp.block(&world, &contact(e, -1.0, 0.5));
        assert!(!clamp.beyond(0.5));
        assert!(clamp.beyond(0.6));
    }

    #[test]
    fn flagging_twice_emits_once() {
        let mut world = World::new();
        let mut bus = EventBus::new();
        let e = world.spawn(Tier(0));
        flag_for_removal(&mut world, &mut bus, e);
        flag_for_removal(&mut world, &mut bus, e);
        assert_eq!(bus.pending().len(), 1);
        assert!(!is_live(&world, e));
    }
}
