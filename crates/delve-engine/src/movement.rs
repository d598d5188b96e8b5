//! End-of-tick passes: apply surviving movement intents, then despawn
//! everything flagged for removal.

use delve_ecs::component::{ComponentTag, MovementIntent, Position};
use delve_ecs::entity::EntityId;
use delve_ecs::query::Query;
use delve_ecs::world::World;
use tracing::debug;

/// Move every entity of the active tier to its intent target and drop the
/// intent. Returns the number of entities moved.
///
/// Intents last one tick: upstream systems issue a fresh one each tick the
/// entity should keep moving.
pub fn apply_intents(world: &mut World) -> usize {
    let movers = Query::new()
        .with(ComponentTag::Position)
        .with(ComponentTag::MovementIntent)
        .without(ComponentTag::PendingRemoval)
        .run_in_active_tier(world);

    let mut moved = 0;
    for id in movers {
        let Some(intent) = world.remove::<MovementIntent>(id) else {
            continue;
        };
        if let Some(position) = world.get_mut::<Position>(id) {
            position.x = intent.target_x;
            position.y = intent.target_y;
            moved += 1;
        }
    }
    moved
}

/// Despawn every entity carrying `PendingRemoval`, in any tier.
pub fn despawn_flagged(world: &mut World) -> Vec<EntityId> {
    let flagged = world.entities_with(&[ComponentTag::PendingRemoval], None);
    let mut removed = Vec::with_capacity(flagged.len());
    for id in flagged {
        match world.despawn(id) {
            Ok(_) => removed.push(id),
            Err(e) => debug!(entity = ?id, error = %e, "cleanup skipped entity"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_ecs::component::PendingRemoval;
    use delve_ecs::identity::Tier;

    #[test]
    fn intents_are_applied_once() {
        let mut world = World::new();
        let e = world.spawn_with(
            Tier(0),
            [
                Position { x: 0.0, y: 0.0 }.into(),
                MovementIntent { target_x: 3.0, target_y: 4.0 }.into(),
            ],
        );
        assert_eq!(apply_intents(&mut world), 1);
        assert_eq!(world.get::<Position>(e), Some(&Position { x: 3.0, y: 4.0 }));
        assert!(!world.has(e, ComponentTag::MovementIntent));
        assert_eq!(apply_intents(&mut world), 0);
    }

    #[test]
    fn other_tiers_and_flagged_entities_do_not_move() {
        let mut world = World::new();
        let intent = MovementIntent { target_x: 9.0, target_y: 9.0 };
        let below = world.spawn_with(Tier(1), [Position::default().into(), intent.into()]);
        let doomed = world.spawn_with(
            Tier(0),
            [Position::default().into(), intent.into(), PendingRemoval.into()],
        );
        assert_eq!(apply_intents(&mut world), 0);
        assert_eq!(world.get::<Position>(below), Some(&Position::default()));
        assert_eq!(world.get::<Position>(doomed), Some(&Position::default()));
    }

    #[test]
    fn flagged_entities_are_despawned_in_every_tier() {
        let mut world = World::new();
        let a = world.spawn_with(Tier(0), [PendingRemoval.into()]);
        let b = world.spawn_with(Tier(2), [PendingRemoval.into()]);
        let keep = world.spawn(Tier(0));
        assert_eq!(despawn_flagged(&mut world), vec![a, b]);
        assert!(world.is_alive(keep));
        assert_eq!(world.entity_count(), 1);
    }
}
