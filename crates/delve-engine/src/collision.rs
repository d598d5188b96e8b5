//! Continuous collision detection for the active tier.
//!
//! [`detect_collisions`] runs once per tick after the spatial grid has been
//! rebuilt. It first empties every [`Collision`] list in the world, then, for
//! each mover (an entity with `Position`, `Hitbox` and `MovementIntent` that is
//! not pending removal), sweeps the mover's hitbox along its intended motion
//! against every candidate the grid returns for the path bounds.
//!
//! Every position used here is the position at the *start* of the tick:
//! movement is applied later, after the responders have had a chance to
//! truncate or drop intents.

use delve_ecs::component::{
    Collision, ComponentTag, Contact, ContactKind, Hitbox, MovementIntent, Position,
};
use delve_ecs::entity::EntityId;
use delve_ecs::query::Query;
use delve_ecs::world::World;
use tracing::{debug, trace};

use crate::spatial::SpatialGrid;
use crate::sweep::{broad_phase_accepts, path_bounds, swept_aabb, Aabb};

/// System name used in diagnostics.
pub const COLLISION_SYSTEM_NAME: &str = "collision";

/// Counters from one detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub movers: usize,
    /// Candidates returned by the grid, self excluded.
    pub candidates: usize,
    /// Candidates rejected by the path-bounds test.
    pub broad_rejected: usize,
    pub contacts: usize,
}

/// Movers of the world's active tier, in id order.
pub fn movers(world: &World) -> Vec<EntityId> {
    Query::new()
        .with(ComponentTag::Position)
        .with(ComponentTag::Hitbox)
        .with(ComponentTag::MovementIntent)
        .without(ComponentTag::PendingRemoval)
        .run_in_active_tier(world)
}

/// The footprint of `id`, or `None` when it lacks a position or hitbox.
pub fn footprint_of(world: &World, id: EntityId) -> Option<Aabb> {
    let position = world.get::<Position>(id)?;
    let hitbox = world.get::<Hitbox>(id)?;
    Some(Aabb::footprint(position, hitbox))
}

/// Empty every collision list in the world.
pub fn clear_contacts(world: &mut World) {
    for id in world.entities_with(&[ComponentTag::Collision], None) {
        if let Some(collision) = world.get_mut::<Collision>(id) {
            collision.contacts.clear();
        }
    }
}

/// Sweep one mover against the grid's candidates. Does not touch the world.
pub fn sweep_mover(
    world: &World,
    grid: &SpatialGrid,
    mover: EntityId,
    stats: &mut SolveStats,
) -> Vec<Contact> {
    let (Some(position), Some(hitbox), Some(intent)) = (
        world.get::<Position>(mover),
        world.get::<Hitbox>(mover),
        world.get::<MovementIntent>(mover),
    ) else {
        debug!(entity = ?mover, "mover lost its footprint or intent, skipping");
        return Vec::new();
    };

    let mover_box = Aabb::footprint(position, hitbox);
    let dx = intent.target_x - position.x;
    let dy = intent.target_y - position.y;
    let range = dx.hypot(dy);
    let path = path_bounds(&mover_box, dx, dy);

    let mut contacts = Vec::new();
    for target in grid.query(&path) {
        if target == mover {
            continue;
        }
        stats.candidates += 1;
        if world.has(target, ComponentTag::PendingRemoval) {
            continue;
        }
        let Some(target_box) = footprint_of(world, target) else {
            debug!(mover = ?mover, target = ?target, "candidate has no hitbox, skipping pair");
            continue;
        };
        if !broad_phase_accepts(&path, &target_box) {
            stats.broad_rejected += 1;
            continue;
        }
        let Some(hit) = swept_aabb(&mover_box, dx, dy, &target_box) else {
            continue;
        };
        let kind = if hit.entry_time == 0.0 {
            ContactKind::Current
        } else {
            ContactKind::Dynamic
        };
        trace!(mover = ?mover, target = ?target, entry = hit.entry_time, ?kind, "contact");
        contacts.push(Contact {
            mover,
            target,
            kind,
            normal_x: hit.normal_x,
            normal_y: hit.normal_y,
            distance: hit.entry_time * range,
            entry_time: hit.entry_time,
        });
    }
    contacts
}

/// Clear all collision lists, then record this tick's contacts for every
/// mover of the active tier.
///
/// `grid` must have been rebuilt for the active tier this tick.
pub fn detect_collisions(world: &mut World, grid: &SpatialGrid) -> SolveStats {
    clear_contacts(world);

    let mut stats = SolveStats::default();
    let movers = movers(world);
    stats.movers = movers.len();

    for mover in movers {
        let contacts = sweep_mover(world, grid, mover, &mut stats);
        if contacts.is_empty() {
            continue;
        }
        stats.contacts += contacts.len();
        if let Some(collision) = world.get_or_insert_default::<Collision>(mover) {
            collision.contacts.extend(contacts);
        }
    }

    debug!(
        movers = stats.movers,
        candidates = stats.candidates,
        broad_rejected = stats.broad_rejected,
        contacts = stats.contacts,
        "collision pass complete"
    );
    stats
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use delve_ecs::component::PendingRemoval;
    use delve_ecs::identity::Tier;

    fn body(world: &mut World, x: f64, y: f64) -> EntityId {
        world.spawn_with(
            Tier(0),
            [Position { x, y }.into(), Hitbox::new(10.0, 10.0).into()],
        )
    }

    fn aim(world: &mut World, id: EntityId, tx: f64, ty: f64) {
        world
            .insert_component(id, MovementIntent { target_x: tx, target_y: ty })
            .unwrap();
    }

    fn solve(world: &mut World) -> SolveStats {
        let mut grid = SpatialGrid::new(16.0, 4);
        grid.rebuild(world, world.active_tier());
        detect_collisions(world, &grid)
    }

    #[test]
    fn self_is_never_a_contact() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        aim(&mut world, mover, 5.0, 0.0);
        let stats = solve(&mut world);
        assert_eq!(stats.candidates, 0);
        assert!(world.get::<Collision>(mover).is_none());
    }

    #[test]
    fn stale_contacts_are_cleared_even_without_new_ones() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        let wall = body(&mut world, 15.0, 0.0);
        aim(&mut world, mover, 20.0, 0.0);
        solve(&mut world);
        assert_eq!(world.get::<Collision>(mover).unwrap().contacts.len(), 1);

        world.remove_component(mover, ComponentTag::MovementIntent).unwrap();
        solve(&mut world);
        assert!(world.get::<Collision>(mover).unwrap().contacts.is_empty());
        let _ = wall;
    }

    #[test]
    fn targets_pending_removal_are_ignored() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        let ghost = body(&mut world, 15.0, 0.0);
        world.insert_component(ghost, PendingRemoval).unwrap();
        aim(&mut world, mover, 20.0, 0.0);
        assert_eq!(solve(&mut world).contacts, 0);
    }

    #[test]
    fn movers_pending_removal_do_not_sweep() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        body(&mut world, 15.0, 0.0);
        aim(&mut world, mover, 20.0, 0.0);
        world.insert_component(mover, PendingRemoval).unwrap();
        assert_eq!(solve(&mut world).movers, 0);
    }

    #[test]
    fn other_tiers_are_invisible() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        let below = body(&mut world, 15.0, 0.0);
        world.set_tier(below, Tier(1)).unwrap();
        aim(&mut world, mover, 20.0, 0.0);
        assert_eq!(solve(&mut world).contacts, 0);
    }

    #[test]
    fn mover_records_every_target_on_its_path() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        let near = body(&mut world, 30.0, 0.0);
        let far = body(&mut world, 90.0, 0.0);
        aim(&mut world, mover, 200.0, 0.0);
        solve(&mut world);

        let contacts = &world.get::<Collision>(mover).unwrap().contacts;
        let targets: Vec<EntityId> = contacts.iter().map(|c| c.target).collect();
        assert_eq!(targets, vec![near, far]);
        assert!(contacts.iter().all(|c| c.kind == ContactKind::Dynamic));
        assert_eq!(contacts[0].distance, 20.0);
        assert_eq!(contacts[1].distance, 80.0);
    }

    #[test]
    fn visual_only_candidates_are_skipped() {
        let mut world = World::new();
        let mover = body(&mut world, 0.0, 0.0);
        world.spawn_with(
            Tier(0),
            [
                Position { x: 12.0, y: 0.0 }.into(),
                delve_ecs::component::Visuals {
                    width: 8.0,
                    height: 8.0,
                    sprite: "rug".into(),
                }
                .into(),
            ],
        );
        aim(&mut world, mover, 20.0, 0.0);
        let stats = solve(&mut world);
        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.contacts, 0);
    }
}
