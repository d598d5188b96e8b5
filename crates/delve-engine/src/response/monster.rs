//! Monster responder: aggro spread, projectile hit synthesis, blocking.
//!
//! When a monster walks into a projectile, the sweep that found the contact
//! ran in the monster's frame. The projectile responder only reads the
//! projectile's own list, so the hit is re-recorded there as a `Current`
//! contact from the projectile's point of view.

use delve_ecs::component::{Collision, ComponentTag, Contact, ContactKind};
use delve_ecs::entity::EntityId;
use delve_ecs::identity::EntityKind;
use delve_ecs::world::World;
use tracing::{debug, trace};

use super::{is_live, responders, take_contacts, MotionClamp, ResponseContext, ResponseError};
use crate::events::{EventBus, GameEvent};

/// Handle the contacts of every monster in the active tier.
pub fn respond(world: &mut World, ctx: &mut ResponseContext<'_>) -> Vec<ResponseError> {
    for monster in responders(world, |k| matches!(k.0, EntityKind::Monster(_))) {
        let contacts = take_contacts(world, monster);
        let mut clamp = MotionClamp::default();
        for contact in &contacts {
            if clamp.beyond(contact.entry_time) {
                break;
            }
            if !is_live(world, contact.target) {
                debug!(monster = ?monster, target = ?contact.target, "contact target gone, skipping");
                continue;
            }
            let Some(kind) = world.kind(contact.target).cloned() else {
                continue;
            };
            match kind {
                EntityKind::Monster(_) => spread_aggro(world, ctx.bus, monster, contact.target),
                EntityKind::Projectile(state) => {
                    if state.source != monster {
                        record_projectile_hit(world, monster, contact);
                    }
                }
                EntityKind::Player(_) | EntityKind::Wall | EntityKind::Npc(_) => {
                    clamp.block(world, contact)
                }
                _ => {}
            }
        }
        clamp.apply(world, monster);
    }
    Vec::new()
}

fn aggroed(world: &World, id: EntityId) -> bool {
    matches!(world.kind(id), Some(EntityKind::Monster(state)) if state.aggroed)
}

fn set_aggroed(world: &mut World, id: EntityId) {
    if let Some(EntityKind::Monster(state)) = world.kind_mut(id) {
        state.aggroed = true;
    }
}

/// An aggroed monster wakes the monster it touches, whichever one moved.
fn spread_aggro(world: &mut World, bus: &mut EventBus, a: EntityId, b: EntityId) {
    let (from, to) = match (aggroed(world, a), aggroed(world, b)) {
        (true, false) => (a, b),
        (false, true) => (b, a),
        _ => return,
    };
    set_aggroed(world, to);
    bus.emit(GameEvent::AggroSpread { from, to });
}

/// Append a contact to the projectile's own list, unless it already records
/// this monster or has been flagged.
fn record_projectile_hit(world: &mut World, monster: EntityId, contact: &Contact) {
    let projectile = contact.target;
    if world.has(projectile, ComponentTag::PendingRemoval) {
        return;
    }
    let Some(collision) = world.get_or_insert_default::<Collision>(projectile) else {
        return;
    };
    if collision.contacts.iter().any(|c| c.target == monster) {
        return;
    }
    trace!(projectile = ?projectile, monster = ?monster, "synthesised projectile contact");
    collision.contacts.push(Contact {
        mover: projectile,
        target: monster,
        kind: ContactKind::Current,
        normal_x: -contact.normal_x,
        normal_y: -contact.normal_y,
        distance: 0.0,
        entry_time: 0.0,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
