//! Projectile responder: spends a projectile's pierce budget on the contacts
//! it collected this tick.
//!
//! - A solid target (wall, NPC) stops the projectile.
//! - A live hostile target gets a damage request and a hit effect. A
//!   non-piercing projectile stops there; a piercing one spends one unit of
//!   budget and carries on.
//! - Projectiles never interact with each other. Two projectiles from the same
//!   source are explicitly ignored.
//!
//! A spent projectile is flagged for removal and despawned at the end of the
//! tick.

use std::collections::BTreeSet;

use delve_ecs::component::{Contact, Health, Position};
use delve_ecs::entity::EntityId;
use delve_ecs::identity::{EntityKind, Faction, ProjectileState};
use delve_ecs::world::World;
use tracing::trace;

use super::{flag_for_removal, is_live, motion, responders, take_contacts, ResponseContext, ResponseError};
use crate::events::GameEvent;

/// Handle the contacts of every projectile in the active tier.
///
/// A projectile whose state violates an invariant is skipped and reported;
/// the remaining projectiles are still processed.
pub fn respond(world: &mut World, ctx: &mut ResponseContext<'_>) -> Vec<ResponseError> {
    let mut errors = Vec::new();
    for projectile in responders(world, |k| matches!(k.0, EntityKind::Projectile(_))) {
        if let Err(e) = resolve(world, ctx, projectile) {
            errors.push(e);
        }
    }
    errors
}

fn resolve(
    world: &mut World,
    ctx: &mut ResponseContext<'_>,
    projectile: EntityId,
) -> Result<(), ResponseError> {
    let contacts = take_contacts(world, projectile);
    if contacts.is_empty() {
        return Ok(());
    }
    let Some(EntityKind::Projectile(mut state)) = world.kind(projectile).cloned() else {
        return Ok(());
    };

    let mut struck = BTreeSet::new();
    let mut spent = false;
    for contact in &contacts {
        if state.range_left == 0 {
            break;
        }
        let target = contact.target;
        if !is_live(world, target) || struck.contains(&target) {
            continue;
        }
        let Some(kind) = world.kind(target).cloned() else {
            continue;
        };

        if kind.is_solid() {
            trace!(projectile = ?projectile, target = ?target, "projectile stopped by {}", kind.label());
            state.range_left = 0;
            spent = true;
            continue;
        }
        if let EntityKind::Projectile(other) = &kind {
            if other.source == state.source {
                trace!(projectile = ?projectile, other = ?target, "same-source projectile ignored");
            }
            continue;
        }
        if !is_valid_victim(world, &state, &kind, target) {
            continue;
        }

        check_weapon(projectile, &state)?;
        struck.insert(target);
        let (x, y) = impact_point(world, contact);
        ctx.bus.emit(GameEvent::DamageRequested {
            source: state.source,
            projectile,
            target,
            weapon: state.weapon.clone(),
        });
        ctx.bus.emit(GameEvent::HitEffect {
            projectile,
            target,
            x,
            y,
        });

        if state.piercing {
            state.range_left -= 1;
        } else {
            state.range_left = 0;
        }
        spent |= state.range_left == 0;
    }

    if let Some(EntityKind::Projectile(stored)) = world.kind_mut(projectile) {
        *stored = state;
    }
    if spent {
        flag_for_removal(world, ctx.bus, projectile);
    }
    Ok(())
}

/// A hostile, damageable target with health left.
fn is_valid_victim(world: &World, state: &ProjectileState, kind: &EntityKind, target: EntityId) -> bool {
    let Some(faction) = kind.faction() else {
        return false;
    };
    state.faction.is_hostile_to(faction)
        && world.get::<Health>(target).is_some_and(|h| !h.is_dead())
}

/// Player projectiles are always fired from a weapon. One without means the
/// spawning code is broken.
fn check_weapon(projectile: EntityId, state: &ProjectileState) -> Result<(), ResponseError> {
    if state.faction == Faction::Player && state.weapon.is_none() {
        return Err(ResponseError::InvariantViolation {
            entity: projectile,
            reason: "player projectile has no weapon".to_owned(),
        });
    }
    Ok(())
}

/// Where the projectile was when it reached the target.
fn impact_point(world: &World, contact: &Contact) -> (f64, f64) {
    let position = world
        .get::<Position>(contact.mover)
        .copied()
        .unwrap_or_default();
    let (dx, dy) = motion(world, contact.mover).unwrap_or((0.0, 0.0));
    (
        position.x + dx * contact.entry_time,
        position.y + dy * contact.entry_time,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
