//! Player responder: turns the player's contacts into melee attacks, trigger
//! activations, stair and portal transitions, pickups and blocked movement.

use delve_ecs::component::{Attack, ComponentTag, Contact, MovementIntent, TransitionLock};
use delve_ecs::entity::EntityId;
use delve_ecs::identity::{EntityKind, PortalState, StairDirection, StairState, TriggerMode};
use delve_ecs::world::World;
use tracing::{debug, info};

use super::{is_live, motion, responders, take_contacts, MotionClamp, ResponseContext, ResponseError};
use crate::collision::footprint_of;
use crate::config::GameConfig;
use crate::events::GameEvent;
use crate::sweep::within_reach;
use crate::transition::{PendingTransition, TransitionVia};

/// Handle the contacts of every player in the active tier.
pub fn respond(world: &mut World, ctx: &mut ResponseContext<'_>) -> Vec<ResponseError> {
    for player in responders(world, |k| matches!(k.0, EntityKind::Player(_))) {
        let contacts = take_contacts(world, player);
        let mut clamp = MotionClamp::default();
        for contact in &contacts {
            // Nothing past a wall or a used stair is reached this tick.
            if clamp.beyond(contact.entry_time) {
                break;
            }
            handle_contact(world, ctx, player, contact, &mut clamp);
        }
        clamp.apply(world, player);
    }
    Vec::new()
}

fn handle_contact(
    world: &mut World,
    ctx: &mut ResponseContext<'_>,
    player: EntityId,
    contact: &Contact,
    clamp: &mut MotionClamp,
) {
    let target = contact.target;
    if !is_live(world, target) {
        debug!(player = ?player, target = ?target, "contact target gone, skipping");
        return;
    }
    let Some(kind) = world.kind(target).cloned() else {
        debug!(target = ?target, "contact target has no kind, skipping");
        return;
    };
    match kind {
        EntityKind::Monster(_) => {
            clamp.block(world, contact);
            try_melee(world, ctx, player, target);
        }
        EntityKind::Trigger(_) => fire_trigger(world, ctx, player, target),
        EntityKind::Stair(state) => {
            if use_stair(world, ctx, player, target, &state) {
                clamp.stop_at(contact.entry_time);
            }
        }
        EntityKind::Portal(state) => enter_portal(world, ctx, player, target, &state),
        EntityKind::Loot(state) => {
            if adjacent(world, ctx.config, player, target) {
                ctx.bus.emit(GameEvent::LootPickedUp {
                    player,
                    loot: target,
                    item: state.item,
                });
                super::flag_for_removal(world, ctx.bus, target);
            }
        }
        EntityKind::Fountain(_) => drink(world, ctx, player, target),
        EntityKind::Wall | EntityKind::Npc(_) => clamp.block(world, contact),
        EntityKind::Player(_) | EntityKind::Projectile(_) => {}
    }
}

/// Adjacency test on the current footprints, with the configured reach.
fn adjacent(world: &World, config: &GameConfig, a: EntityId, b: EntityId) -> bool {
    match (footprint_of(world, a), footprint_of(world, b)) {
        (Some(a_box), Some(b_box)) => within_reach(&a_box, &b_box, config.melee_reach),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Melee
// ---------------------------------------------------------------------------

fn try_melee(world: &mut World, ctx: &mut ResponseContext<'_>, player: EntityId, monster: EntityId) {
    if let Some(EntityKind::Player(state)) = world.kind(player) {
        if state.ranged_stance {
            return;
        }
    }
    let mut attack = world.get::<Attack>(player).copied().unwrap_or(Attack {
        cooldown: ctx.config.attack_cooldown,
        remaining: 0.0,
        reach: ctx.config.melee_reach,
    });
    if !attack.ready() {
        return;
    }
    let in_reach = match (footprint_of(world, player), footprint_of(world, monster)) {
        (Some(p), Some(m)) => within_reach(&p, &m, attack.reach),
        _ => false,
    };
    if !in_reach {
        return;
    }

    attack.remaining = attack.cooldown;
    if world.insert_component(player, attack).is_err() {
        return;
    }
    // The attack ends the player's turn.
    world.remove::<MovementIntent>(player);
    ctx.bus.emit(GameEvent::MeleeAttack {
        attacker: player,
        target: monster,
    });
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

fn fire_trigger(world: &mut World, ctx: &mut ResponseContext<'_>, player: EntityId, trigger: EntityId) {
    let rearm = ctx.config.trigger_rearm;
    let fired = match world.kind_mut(trigger) {
        Some(EntityKind::Trigger(state)) => match state.mode {
            TriggerMode::Presence => Some(state.action.clone()),
            TriggerMode::OneShot if state.armed => {
                state.armed = false;
                state.rearm_in = rearm;
                Some(state.action.clone())
            }
            TriggerMode::OneShot => None,
        },
        _ => None,
    };
    if let Some(action) = fired {
        ctx.bus.emit(GameEvent::TriggerFired {
            trigger,
            activator: player,
            action,
        });
    }
}

// ---------------------------------------------------------------------------
// Stairs and portals
// ---------------------------------------------------------------------------

fn transition_blocked(world: &World, ctx: &ResponseContext<'_>, player: EntityId) -> bool {
    world.has(player, ComponentTag::TransitionLock) || ctx.transitions.is_pending()
}

/// Returns true when a transition was requested; the player's move then ends
/// on the stair.
fn use_stair(
    world: &mut World,
    ctx: &mut ResponseContext<'_>,
    player: EntityId,
    stair: EntityId,
    state: &StairState,
) -> bool {
    if transition_blocked(world, ctx, player) {
        return false;
    }
    let Some(current) = world.tier_of(player) else {
        return false;
    };
    let to = match state.direction {
        StairDirection::Down => current.below(),
        StairDirection::Up => current.above(),
    };
    let usable = (state.active
        || (state.direction == StairDirection::Down && ctx.transitions.highest_tier() > current))
        && to != current;

    let lock = TransitionLock {
        remaining: ctx.config.stair_lock,
    };
    if world.insert_component(player, lock).is_err() {
        return false;
    }

    if !usable {
        debug!(player = ?player, stair = ?stair, "stair locked");
        ctx.bus.emit(GameEvent::StairLocked { player, stair });
        return false;
    }

    let requested = ctx.transitions.request(PendingTransition {
        player,
        from: current,
        to,
        via: TransitionVia::Stair(stair),
    });
    if requested {
        info!(player = ?player, from = %current, to = %to, "tier transition requested");
        ctx.bus.emit(GameEvent::TierTransitionRequested {
            player,
            stair,
            from: current,
            to,
        });
    }
    requested
}

fn enter_portal(
    world: &mut World,
    ctx: &mut ResponseContext<'_>,
    player: EntityId,
    portal: EntityId,
    state: &PortalState,
) {
    if !state.active || transition_blocked(world, ctx, player) {
        return;
    }
    let (Some(player_box), Some(portal_box)) = (footprint_of(world, player), footprint_of(world, portal))
    else {
        return;
    };
    // The player must stand on the portal now or at the end of this move.
    let (dx, dy) = motion(world, player).unwrap_or((0.0, 0.0));
    if !player_box.overlaps(&portal_box) && !player_box.translated(dx, dy).overlaps(&portal_box) {
        return;
    }
    let Some(current) = world.tier_of(player) else {
        return;
    };

    let requested = ctx.transitions.request(PendingTransition {
        player,
        from: current,
        to: state.destination,
        via: TransitionVia::Portal(portal),
    });
    if !requested {
        return;
    }
    let lock = TransitionLock {
        remaining: ctx.config.portal_lock,
    };
    if world.insert_component(player, lock).is_err() {
        return;
    }
    info!(player = ?player, destination = %state.destination, "portal transition requested");
    ctx.bus.emit(GameEvent::PortalTransitionRequested {
        player,
        portal,
        destination: state.destination,
    });
}

// ---------------------------------------------------------------------------
// Fountains
// ---------------------------------------------------------------------------

fn drink(world: &mut World, ctx: &mut ResponseContext<'_>, player: EntityId, fountain: EntityId) {
    if !adjacent(world, ctx.config, player, fountain) {
        return;
    }
    let charges_left = match world.kind_mut(fountain) {
        Some(EntityKind::Fountain(state)) if state.charges > 0 => {
            state.charges -= 1;
            state.charges
        }
        _ => return,
    };
    ctx.bus.emit(GameEvent::FountainUsed {
        player,
        fountain,
        charges_left,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::detect_collisions;
    use crate::events::{EventBus, EventKind};
    use crate::spatial::SpatialGrid;
    use crate::transition::TransitionState;
    use delve_ecs::component::{Hitbox, Kind, PendingRemoval, Position};
    use delve_ecs::identity::{
        FountainState, LootState, MonsterState, NpcState, PlayerState, Tier, TriggerState,
    };

    struct Harness {
        world: World,
        bus: EventBus,
        config: GameConfig,
        transitions: TransitionState,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                world: World::new(),
                bus: EventBus::new(),
                config: GameConfig::default(),
                transitions: TransitionState::new(),
            }
        }

        fn spawn(&mut self, kind: EntityKind, x: f64, y: f64) -> EntityId {
            self.world.spawn_with(
                Tier(0),
                [
                    Position { x, y }.into(),
                    Hitbox::new(10.0, 10.0).into(),
                    Kind(kind).into(),
                ],
            )
        }

        fn player(&mut self, x: f64) -> EntityId {
            self.spawn(EntityKind::Player(PlayerState::default()), x, 0.0)
        }

        fn walk(&mut self, id: EntityId, tx: f64) {
            self.world
                .insert_component(id, MovementIntent { target_x: tx, target_y: 0.0 })
                .unwrap();
        }

        fn step(&mut self) {
            let mut grid = SpatialGrid::new(16.0, 4);
            grid.rebuild(&self.world, Tier(0));
            detect_collisions(&mut self.world, &grid);
            let mut ctx = ResponseContext {
                bus: &mut self.bus,
                config: &self.config,
                transitions: &mut self.transitions,
            };
            respond(&mut self.world, &mut ctx);
        }

        fn kinds(&mut self) -> Vec<EventKind> {
            self.bus.drain().iter().map(GameEvent::kind).collect()
        }
    }

    #[test]
    fn adjacent_monster_is_attacked_and_turn_ends() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        let m = h.spawn(EntityKind::Monster(MonsterState::default()), 12.0, 0.0);
        h.walk(p, 5.0);
        h.step();

        assert_eq!(
            h.bus.drain(),
            vec![GameEvent::MeleeAttack { attacker: p, target: m }]
        );
        assert!(!h.world.has(p, ComponentTag::MovementIntent));
        let attack = h.world.get::<Attack>(p).unwrap();
        assert_eq!(attack.remaining, h.config.attack_cooldown);
    }

    #[test]
    fn cooldown_prevents_second_attack() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(EntityKind::Monster(MonsterState::default()), 12.0, 0.0);
        h.walk(p, 5.0);
        h.step();
        h.bus.drain();
        h.walk(p, 5.0);
        h.step();
        assert!(h.bus.pending().is_empty());
    }

    #[test]
    fn ranged_stance_never_melees() {
        let mut h = Harness::new();
        let p = h.spawn(
            EntityKind::Player(PlayerState { ranged_stance: true }),
            0.0,
            0.0,
        );
        h.spawn(EntityKind::Monster(MonsterState::default()), 12.0, 0.0);
        h.walk(p, 5.0);
        h.step();
        assert!(h.bus.pending().is_empty());
    }

    #[test]
    fn distant_monster_on_path_blocks_but_is_not_attacked() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(EntityKind::Monster(MonsterState::default()), 40.0, 0.0);
        h.walk(p, 60.0);
        h.step();
        assert!(h.bus.pending().is_empty());
        assert_eq!(h.world.get::<MovementIntent>(p).unwrap().target_x, 30.0);
    }

    #[test]
    fn one_shot_trigger_fires_once_then_disarms() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        let t = h.spawn(
            EntityKind::Trigger(TriggerState {
                mode: TriggerMode::OneShot,
                action: "spikes".into(),
                armed: true,
                rearm_in: 0.0,
            }),
            5.0,
            0.0,
        );
        h.walk(p, 1.0);
        h.step();
        h.walk(p, 1.0);
        h.step();
        assert_eq!(h.kinds(), vec![EventKind::TriggerFired]);
        match h.world.kind(t) {
            Some(EntityKind::Trigger(state)) => {
                assert!(!state.armed);
                assert_eq!(state.rearm_in, h.config.trigger_rearm);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn presence_trigger_fires_on_every_contact() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(
            EntityKind::Trigger(TriggerState {
                mode: TriggerMode::Presence,
                action: "hum".into(),
                armed: true,
                rearm_in: 0.0,
            }),
            5.0,
            0.0,
        );
        for _ in 0..3 {
            h.walk(p, 1.0);
            h.step();
        }
        assert_eq!(h.kinds(), vec![EventKind::TriggerFired; 3]);
    }

    #[test]
    fn inactive_stair_locks_and_reports_failure() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        let s = h.spawn(
            EntityKind::Stair(StairState {
                direction: StairDirection::Down,
                active: false,
            }),
            15.0,
            0.0,
        );
        h.walk(p, 10.0);
        h.step();
        assert_eq!(
            h.bus.drain(),
            vec![GameEvent::StairLocked { player: p, stair: s }]
        );
        assert!(h.world.has(p, ComponentTag::TransitionLock));
        assert!(!h.transitions.is_pending());

        // Locked: touching again does nothing.
        h.walk(p, 10.0);
        h.step();
        assert!(h.bus.pending().is_empty());
    }

    #[test]
    fn down_stair_opens_once_deeper_floor_was_reached() {
        let mut h = Harness::new();
        h.transitions.reach(Tier(2));
        let p = h.player(0.0);
        let s = h.spawn(
            EntityKind::Stair(StairState {
                direction: StairDirection::Down,
                active: false,
            }),
            15.0,
            0.0,
        );
        h.walk(p, 10.0);
        h.step();
        assert_eq!(
            h.bus.drain(),
            vec![GameEvent::TierTransitionRequested {
                player: p,
                stair: s,
                from: Tier(0),
                to: Tier(1),
            }]
        );
        assert!(h.transitions.is_pending());
    }

    #[test]
    fn active_stair_requests_transition_exactly_once() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(
            EntityKind::Stair(StairState {
                direction: StairDirection::Down,
                active: true,
            }),
            5.0,
            0.0,
        );
        h.walk(p, 1.0);
        h.step();
        h.world.remove_component(p, ComponentTag::TransitionLock).unwrap();
        h.walk(p, 1.0);
        h.step();
        assert_eq!(h.kinds(), vec![EventKind::TierTransitionRequested]);
    }

    #[test]
    fn up_stair_at_surface_is_locked() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(
            EntityKind::Stair(StairState {
                direction: StairDirection::Up,
                active: true,
            }),
            5.0,
            0.0,
        );
        h.walk(p, 1.0);
        h.step();
        assert_eq!(h.kinds(), vec![EventKind::StairLocked]);
    }

    #[test]
    fn portal_requires_overlap_at_end_of_move() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(
            EntityKind::Portal(PortalState {
                active: true,
                destination: Tier(4),
            }),
            10.0,
            0.0,
        );
        // Ends flush against the portal: touching, not overlapping.
        h.walk(p, 0.0);
        h.step();
        assert!(h.bus.pending().is_empty());

        h.walk(p, 4.0);
        h.step();
        assert_eq!(h.kinds(), vec![EventKind::PortalTransitionRequested]);
        assert_eq!(h.transitions.pending().map(|t| t.to), Some(Tier(4)));
        assert!(h.world.has(p, ComponentTag::TransitionLock));
    }

    #[test]
    fn inactive_portal_does_nothing() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(
            EntityKind::Portal(PortalState {
                active: false,
                destination: Tier(4),
            }),
            5.0,
            0.0,
        );
        h.walk(p, 5.0);
        h.step();
        assert!(h.bus.pending().is_empty());
        assert!(!h.transitions.is_pending());
    }

    #[test]
    fn adjacent_loot_is_picked_up_and_flagged() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        let l = h.spawn(EntityKind::Loot(LootState { item: "key".into() }), 12.0, 0.0);
        h.walk(p, 5.0);
        h.step();
        assert_eq!(
            h.kinds(),
            vec![EventKind::LootPickedUp, EventKind::RemovalRequested]
        );
        assert!(h.world.has(l, ComponentTag::PendingRemoval));
    }

    #[test]
    fn fountain_consumes_charges_until_dry() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        let f = h.spawn(EntityKind::Fountain(FountainState { charges: 1 }), 12.0, 0.0);
        h.walk(p, 5.0);
        h.step();
        h.walk(p, 5.0);
        h.step();
        assert_eq!(
            h.bus.drain(),
            vec![GameEvent::FountainUsed {
                player: p,
                fountain: f,
                charges_left: 0
            }]
        );
    }

    #[test]
    fn walls_and_npcs_block_movement() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(EntityKind::Npc(NpcState { name: "smith".into() }), 30.0, 0.0);
        h.spawn(EntityKind::Wall, 20.0, 0.0);
        h.walk(p, 50.0);
        h.step();
        assert_eq!(h.world.get::<MovementIntent>(p).unwrap().target_x, 10.0);
    }

    fn trap(h: &mut Harness, x: f64) -> EntityId {
        h.spawn(
            EntityKind::Trigger(TriggerState {
                mode: TriggerMode::OneShot,
                action: "trap".into(),
                armed: true,
                rearm_in: 0.0,
            }),
            x,
            0.0,
        )
    }

    #[test]
    fn nothing_behind_a_wall_is_reached() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        // Spawned before the wall so it sorts first by id.
        trap(&mut h, 60.0);
        h.spawn(EntityKind::Loot(LootState { item: "gem".into() }), 90.0, 0.0);
        h.spawn(EntityKind::Wall, 20.0, 0.0);
        h.walk(p, 100.0);
        h.step();

        assert!(h.bus.pending().is_empty());
        assert_eq!(h.world.get::<MovementIntent>(p).unwrap().target_x, 10.0);
    }

    #[test]
    fn contacts_before_the_wall_still_count() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(EntityKind::Wall, 60.0, 0.0);
        trap(&mut h, 20.0);
        h.walk(p, 100.0);
        h.step();

        assert_eq!(h.kinds(), vec![EventKind::TriggerFired]);
        assert_eq!(h.world.get::<MovementIntent>(p).unwrap().target_x, 50.0);
    }

    #[test]
    fn used_stair_ends_the_move() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        trap(&mut h, 80.0);
        h.spawn(
            EntityKind::Stair(StairState {
                direction: StairDirection::Down,
                active: true,
            }),
            40.0,
            0.0,
        );
        h.walk(p, 100.0);
        h.step();

        assert_eq!(h.kinds(), vec![EventKind::TierTransitionRequested]);
        assert_eq!(h.world.get::<MovementIntent>(p).unwrap().target_x, 30.0);
    }

    #[test]
    fn locked_stair_does_not_stop_the_player() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        h.spawn(
            EntityKind::Stair(StairState {
                direction: StairDirection::Down,
                active: false,
            }),
            40.0,
            0.0,
        );
        h.walk(p, 100.0);
        h.step();

        assert_eq!(h.kinds(), vec![EventKind::StairLocked]);
        assert_eq!(h.world.get::<MovementIntent>(p).unwrap().target_x, 100.0);
    }

    #[test]
    fn flagged_targets_are_ignored() {
        let mut h = Harness::new();
        let p = h.player(0.0);
        let l = h.spawn(EntityKind::Loot(LootState { item: "gem".into() }), 12.0, 0.0);
        h.world.insert_component(l, PendingRemoval).unwrap();
        h.walk(p, 5.0);
        h.step();
        assert!(h.bus.pending().is_empty());
    }
}
