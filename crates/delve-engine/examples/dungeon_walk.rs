//! Headless dungeon walk -- a scripted player walks right along a corridor,
//! picks up loot, fights a monster and takes the stairs down.
//!
//! Run with:
//!   cargo run --example dungeon_walk -p delve-engine [-- path/to/config.json]
//!
//! Set `RUST_LOG=debug` to see the engine's own logging.

use anyhow::Context;
use delve_engine::prelude::*;

const MAX_TICKS: u64 = 600;

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

fn spawn(world: &mut World, kind: EntityKind, x: f64) -> EntityId {
    world.spawn_with(
        Tier(0),
        [
            Position { x, y: 0.0 }.into(),
            Hitbox::new(10.0, 10.0).into(),
            Kind(kind).into(),
        ],
    )
}

fn build_corridor(world: &mut World) -> EntityId {
    let player = spawn(world, EntityKind::Player(PlayerState::default()), 0.0);
    world.insert_component(player, Health::full(10)).ok();

    spawn(world, EntityKind::Loot(LootState { item: "torch".into() }), 30.0);
    let monster = spawn(world, EntityKind::Monster(MonsterState::default()), 60.0);
    world.insert_component(monster, Health::full(3)).ok();
    spawn(
        world,
        EntityKind::Stair(StairState {
            direction: StairDirection::Down,
            active: true,
        }),
        100.0,
    );
    spawn(world, EntityKind::Wall, 140.0);
    player
}

/// Scripted input: every player without an intent takes two pixels to the right.
fn walk_right(world: &World, cmds: &mut CommandBuffer) {
    for id in Query::new()
        .with(ComponentTag::Position)
        .with(ComponentTag::Kind)
        .without(ComponentTag::MovementIntent)
        .run_in_active_tier(world)
    {
        if !matches!(world.kind(id), Some(EntityKind::Player(_))) {
            continue;
        }
        if let Some(pos) = world.get::<Position>(id) {
            cmds.insert(
                id,
                MovementIntent {
                    target_x: pos.x + 2.0,
                    target_y: pos.y,
                },
                "walk_right",
            );
        }
    }
}

/// Melee hits land for one point of damage. Dead monsters are flagged and
/// despawned at the end of the next tick.
fn apply_melee(world: &mut World, target: EntityId) {
    let Some(health) = world.get_mut::<Health>(target) else {
        return;
    };
    health.current -= 1;
    if health.is_dead() {
        world.insert_component(target, PendingRemoval).ok();
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    delve_engine::init_tracing("warn");

    let game = match std::env::args().nth(1) {
        Some(path) => GameConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => GameConfig::default(),
    };

    let mut world = World::new();
    let player = build_corridor(&mut world);
    let mut tick_loop = TickLoop::new(
        world,
        TickConfig {
            fixed_dt: 1.0 / 60.0,
            game,
        },
    );
    tick_loop.add_system("walk_right", walk_right);

    while tick_loop.tick_count() < MAX_TICKS {
        tick_loop.tick();
        let tick = tick_loop.tick_count();
        for event in tick_loop.drain_events() {
            println!("[tick {tick:>3}] {event:?}");
            match event {
                GameEvent::MeleeAttack { target, .. } => {
                    apply_melee(tick_loop.world_mut(), target)
                }
                GameEvent::TierTransitionRequested { to, .. } => {
                    tick_loop
                        .resolve_transition(to)
                        .context("resolving stair transition")?;
                }
                _ => {}
            }
        }
        if tick_loop.world().active_tier() != Tier(0) {
            break;
        }
    }

    let world = tick_loop.world();
    println!(
        "finished after {} ticks ({:.2}s): player on {}, {} entities left",
        tick_loop.tick_count(),
        tick_loop.sim_time(),
        world.tier_of(player).unwrap_or_default(),
        world.entity_count(),
    );
    println!("state hash: {}", hex(&world.state_hash()));
    Ok(())
}

fn hex(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
