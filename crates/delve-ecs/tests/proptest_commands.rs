//! Property tests for command buffer application.
//!
//! Random command sequences against a small floor: indices, reports and
//! results must stay consistent and deterministic.

use delve_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum CmdOp {
    Intent(usize, i32, i32),
    ClearIntent(usize),
    Damage(usize, i32),
    MoveTier(usize, u32),
    Despawn(usize),
    SpawnWall(u32),
}

fn cmd_op_strategy() -> impl Strategy<Value = CmdOp> {
    prop_oneof![
        (0..20usize, -500..500i32, -500..500i32).prop_map(|(i, x, y)| CmdOp::Intent(i, x, y)),
        (0..20usize).prop_map(CmdOp::ClearIntent),
        (0..20usize, 0..10i32).prop_map(|(i, hp)| CmdOp::Damage(i, hp)),
        (0..20usize, 0..4u32).prop_map(|(i, t)| CmdOp::MoveTier(i, t)),
        (0..20usize).prop_map(CmdOp::Despawn),
        (0..4u32).prop_map(CmdOp::SpawnWall),
    ]
}

fn build_commands(ops: &[CmdOp], entities: &[EntityId]) -> CommandBuffer {
    let mut buf = CommandBuffer::new();
    for op in ops {
        let pick = |i: usize| entities[i % entities.len()];
        match op {
            CmdOp::Intent(i, x, y) => buf.insert(
                pick(*i),
                MovementIntent {
                    target_x: f64::from(*x),
                    target_y: f64::from(*y),
                },
                "ai",
            ),
            CmdOp::ClearIntent(i) => buf.remove(pick(*i), ComponentTag::MovementIntent, "ai"),
            CmdOp::Damage(i, hp) => buf.insert(pick(*i), Health { current: *hp, max: 10 }, "combat"),
            CmdOp::MoveTier(i, t) => buf.set_tier(pick(*i), Tier(*t), "stairs"),
            CmdOp::Despawn(i) => buf.despawn(pick(*i), "cleanup"),
            CmdOp::SpawnWall(t) => buf.spawn(
                Tier(*t),
                vec![
                    Position::default().into(),
                    Hitbox::new(16.0, 16.0).into(),
                    Kind(EntityKind::Wall).into(),
                ],
                "level",
            ),
        }
    }
    buf
}

fn setup_world_and_entities() -> (World, Vec<EntityId>) {
    let mut world = World::new();
    let entities = (0..5)
        .map(|i| {
            world.spawn_with(
                Tier(0),
                [
                    Position { x: f64::from(i) * 20.0, y: 0.0 }.into(),
                    Health::full(10).into(),
                ],
            )
        })
        .collect();
    (world, entities)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn command_sequences_preserve_consistency(ops in prop::collection::vec(cmd_op_strategy(), 1..30)) {
        let (mut world, entities) = setup_world_and_entities();
        let mut buf = build_commands(&ops, &entities);
        let applied = buf.apply(&mut world);

        prop_assert!(buf.is_empty());
        for (i, cmd) in applied.iter().enumerate() {
            prop_assert_eq!(cmd.command_index, i as u32);
        }
        for cmd in &applied {
            if let (CommandKind::Spawn { tier, .. }, true) = (&cmd.kind, cmd.applied_successfully) {
                let spawned = cmd.spawned_entity;
                prop_assert!(spawned.is_some());
                prop_assert_eq!(spawned.and_then(|e| world.tier_of(e)), Some(*tier));
            }
        }

        let report = buf.last_apply_report();
        prop_assert_eq!(report.success_count, applied.iter().filter(|c| c.applied_successfully).count());
        prop_assert_eq!(report.failed_count, applied.iter().filter(|c| !c.applied_successfully).count());

        // Tier index agrees with the entity records after any mix of moves.
        let indexed: usize = (0..4).map(|t| world.tier_members(Tier(t)).len()).sum();
        prop_assert_eq!(indexed, world.entity_count());
    }

    #[test]
    fn command_buffer_deterministic(ops in prop::collection::vec(cmd_op_strategy(), 1..20)) {
        fn run_once(ops: &[CmdOp]) -> (Vec<bool>, [u8; 32]) {
            let (mut world, entities) = setup_world_and_entities();
            let mut buf = build_commands(ops, &entities);
            let results = buf
                .apply(&mut world)
                .iter()
                .map(|c| c.applied_successfully)
                .collect();
            (results, world.state_hash())
        }

        prop_assert_eq!(run_once(&ops), run_once(&ops));
    }

    /// Commands aimed at an entity despawned earlier in the same buffer fail
    /// without touching the world.
    #[test]
    fn despawn_then_modify_is_graceful(x in -500..500i32, hp in 0..10i32) {
        let (mut world, entities) = setup_world_and_entities();
        let target = entities[0];

        let mut buf = CommandBuffer::new();
        buf.despawn(target, "cleanup");
        buf.insert(target, MovementIntent { target_x: f64::from(x), target_y: 0.0 }, "ai");
        buf.insert(target, Health { current: hp, max: 10 }, "combat");
        buf.set_tier(target, Tier(2), "stairs");

        let applied = buf.apply(&mut world);
        prop_assert!(applied[0].applied_successfully);
        prop_assert!(applied[1..].iter().all(|c| !c.applied_successfully));
        prop_assert!(!world.is_alive(target));
        prop_assert_eq!(world.entity_count(), 4);
        prop_assert_eq!(buf.last_apply_report().failed_count, 3);
    }
}
