//! Same seed, same systems, same world hash on every tick.

use delve_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

fn spawn(world: &mut World, kind: EntityKind, x: f64, y: f64) -> EntityId {
    world.spawn_with(
        Tier(0),
        [
            Position { x, y }.into(),
            Hitbox::new(10.0, 10.0).into(),
            Kind(kind).into(),
        ],
    )
}

fn build_floor(seed: u64) -> World {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut world = World::new();
    let player = spawn(&mut world, EntityKind::Player(PlayerState::default()), 0.0, 0.0);
    world.insert_component(player, Health::full(20)).unwrap();

    for _ in 0..12 {
        let x = rng.gen_range(-200..200) as f64;
        let y = rng.gen_range(-200..200) as f64;
        let monster = spawn(
            &mut world,
            EntityKind::Monster(MonsterState { aggroed: rng.gen_bool(0.3) }),
            x,
            y,
        );
        world.insert_component(monster, Health::full(3)).unwrap();
    }
    for _ in 0..20 {
        let x = rng.gen_range(-250..250) as f64;
        let y = rng.gen_range(-250..250) as f64;
        spawn(&mut world, EntityKind::Wall, x, y);
    }
    for _ in 0..6 {
        let x = rng.gen_range(-100..100) as f64;
        let y = rng.gen_range(-100..100) as f64;
        let arrow = spawn(
            &mut world,
            EntityKind::Projectile(ProjectileState {
                source: player,
                faction: Faction::Player,
                piercing: rng.gen_bool(0.5),
                range_left: rng.gen_range(1..4),
                weapon: Some("bow".into()),
            }),
            x,
            y,
        );
        world
            .insert_component(
                arrow,
                MovementIntent {
                    target_x: x + rng.gen_range(-300..300) as f64,
                    target_y: y,
                },
            )
            .unwrap();
    }
    world
}

/// Monsters step toward the player; the player walks a slow diagonal.
fn chase(world: &World, cmds: &mut CommandBuffer) {
    let everyone = Query::new()
        .with(ComponentTag::Kind)
        .with(ComponentTag::Position)
        .without(ComponentTag::MovementIntent)
        .run_in_active_tier(world);
    let player_pos = everyone
        .iter()
        .find(|id| matches!(world.kind(**id), Some(EntityKind::Player(_))))
        .and_then(|id| world.get::<Position>(*id).copied());

    for id in everyone {
        let Some(pos) = world.get::<Position>(id).copied() else {
            continue;
        };
        let step = match (world.kind(id), player_pos) {
            (Some(EntityKind::Player(_)), _) => (1.0, 0.5),
            (Some(EntityKind::Monster(_)), Some(p)) => {
                ((p.x - pos.x).clamp(-1.5, 1.5), (p.y - pos.y).clamp(-1.5, 1.5))
            }
            _ => continue,
        };
        cmds.insert(
            id,
            MovementIntent {
                target_x: pos.x + step.0,
                target_y: pos.y + step.1,
            },
            "chase",
        );
    }
}

struct Trace {
    world: Vec<[u8; 32]>,
    grid: Vec<[u8; 32]>,
    events: Vec<GameEvent>,
    despawned: usize,
}

fn run(seed: u64, ticks: u64) -> Trace {
    let mut tick_loop = TickLoop::new(build_floor(seed), TickConfig::default());
    tick_loop.add_system("chase", chase);
    let mut trace = Trace {
        world: Vec::new(),
        grid: Vec::new(),
        events: Vec::new(),
        despawned: 0,
    };
    for _ in 0..ticks {
        tick_loop.tick();
        trace.world.push(tick_loop.world().state_hash());
        trace.grid.push(tick_loop.grid().digest());
        trace.events.extend(tick_loop.drain_events());
        trace.despawned += tick_loop.last_diagnostics().despawned.len();
    }
    trace
}

#[test]
fn identical_seeds_produce_identical_runs() {
    let a = run(7, 200);
    let b = run(7, 200);
    assert_eq!(a.world, b.world);
    assert_eq!(a.grid, b.grid);
    assert_eq!(a.events, b.events);
    assert_eq!(a.despawned, b.despawned);
}

#[test]
fn different_seeds_diverge() {
    let a = run(1, 5);
    let b = run(2, 5);
    assert_ne!(a.world.last(), b.world.last());
}
