//! Fixed-timestep tick loop driving the dungeon simulation.
//!
//! The [`TickLoop`] owns the [`World`], the shared [`CommandBuffer`], the
//! [`EventBus`], the spatial grid and the transition state. Each tick:
//!
//! 1. Timers advance (cooldowns, transition locks, trigger re-arm).
//! 2. Deferred callbacks that are due run.
//! 3. Registered systems run in declaration order against a shared `&World`;
//!    the command buffer is then applied (FIFO).
//! 4. The spatial grid is rebuilt for the active tier.
//! 5. The collision solver clears and refills every Collision list.
//! 6. Responders run: player, monster, projectile.
//! 7. Surviving movement intents are applied.
//! 8. Entities flagged for removal are despawned.
//!
//! Nothing in the pipeline reads wall-clock time or unseeded randomness, so the
//! same initial world, systems and deferred callbacks produce the same world
//! hash on every run.
//!
//! # Example
//!
//! ```
//! use delve_engine::tick::{TickConfig, TickLoop};
//! use delve_ecs::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(World::new(), TickConfig::default());
//! tick_loop.add_system("input", |_world, _cmds| {
//!     // queue movement intents here
//! });
//!
//! tick_loop.run_ticks(10);
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use delve_ecs::command::{Command, CommandBuffer};
use delve_ecs::identity::Tier;
use delve_ecs::world::World;
use delve_ecs::EcsError;
use tracing::{debug, info, warn};

use crate::collision::{detect_collisions, SolveStats, COLLISION_SYSTEM_NAME};
use crate::config::GameConfig;
use crate::events::{EventBus, GameEvent};
use crate::movement::{apply_intents, despawn_flagged};
use crate::response::{respond_all, ResponseContext, ResponseError};
use crate::spatial::SpatialGrid;
use crate::timers::{advance_timers, TimerReport};
use crate::transition::{PendingTransition, TransitionState};

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Gameplay tuning shared by the partition, solver and responders.
    pub game: GameConfig,
}

impl Default for TickConfig {
    /// 60 Hz with default gameplay tuning.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            game: GameConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// What happened during the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per phase and per system, in order of execution.
    pub system_times: Vec<(String, Duration)>,
    pub total_time: Duration,
    pub command_apply_time: Duration,
    pub timers: TimerReport,
    /// Deferred callbacks that ran at the start of the tick.
    pub deferred_run: usize,
    pub solve: SolveStats,
    /// Responder failures. The tick carried on past each of them.
    pub invariant_violations: Vec<ResponseError>,
    pub moved: usize,
    pub despawned: Vec<delve_ecs::entity::EntityId>,
}

// ---------------------------------------------------------------------------
// Systems and deferred work
// ---------------------------------------------------------------------------

/// An upstream system (input, AI, spawner).
///
/// Systems receive a shared reference to the [`World`] and queue every change
/// in the [`CommandBuffer`].
pub type SystemFn = fn(&World, &mut CommandBuffer);

/// A one-shot callback run at the start of a later tick.
pub type DeferredFn = Box<dyn FnOnce(&mut World, &mut EventBus)>;

#[derive(Debug)]
struct RegisteredSystem {
    name: String,
    func: SystemFn,
}

struct Deferred {
    /// Tick number (1-based) at whose start the callback runs.
    due: u64,
    seq: u64,
    callback: DeferredFn,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The deterministic fixed-timestep tick loop.
pub struct TickLoop {
    world: World,
    command_buffer: CommandBuffer,
    systems: Vec<RegisteredSystem>,
    bus: EventBus,
    grid: SpatialGrid,
    transitions: TransitionState,
    deferred: Vec<Deferred>,
    next_deferred_seq: u64,
    tick_counter: u64,
    config: TickConfig,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop around `world`.
    ///
    /// # Panics
    ///
    /// Panics if `fixed_dt` is not positive and finite, or if the gameplay
    /// config fails validation.
    pub fn new(world: World, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        if let Err(e) = config.game.validate() {
            panic!("invalid game config: {e}");
        }
        let grid = SpatialGrid::new(config.game.tile_size, config.game.bucket_span);
        let mut transitions = TransitionState::new();
        transitions.reach(world.active_tier());
        Self {
            world,
            command_buffer: CommandBuffer::new(),
            systems: Vec::new(),
            bus: EventBus::new(),
            grid,
            transitions,
            deferred: Vec::new(),
            next_deferred_seq: 0,
            tick_counter: 0,
            config,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system to be run each tick, after every system registered
    /// so far.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        self.add_system_after(name, &[], func);
    }

    /// Register a system that must run after each system named in `after`.
    ///
    /// Systems run in registration order, so this only checks that the
    /// dependencies already exist.
    ///
    /// # Panics
    ///
    /// - If any system in `after` is not already registered.
    /// - If a system with this name already exists.
    pub fn add_system_after(&mut self, name: &str, after: &[&str], func: SystemFn) {
        for dep in after {
            assert!(
                self.systems.iter().any(|s| s.name == *dep),
                "system '{name}' declares dependency on '{dep}', but '{dep}' is not registered"
            );
        }
        assert!(
            !self.systems.iter().any(|s| s.name == name) && name != COLLISION_SYSTEM_NAME,
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
        });
    }

    /// Schedule `callback` to run at the start of the tick `ticks` ticks from
    /// now. `defer(1, ..)` runs at the start of the next call to
    /// [`tick`](Self::tick). Callbacks due on the same tick run in the order
    /// they were deferred.
    ///
    /// # Panics
    ///
    /// Panics if `ticks` is zero.
    pub fn defer(&mut self, ticks: u64, callback: impl FnOnce(&mut World, &mut EventBus) + 'static) {
        assert!(ticks >= 1, "deferred callbacks must wait at least one tick");
        let seq = self.next_deferred_seq;
        self.next_deferred_seq += 1;
        self.deferred.push(Deferred {
            due: self.tick_counter + ticks,
            seq,
            callback: Box::new(callback),
        });
    }

    /// Number of callbacks still waiting.
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Execute one simulation tick. Returns the commands processed from the
    /// system phase; check `applied_successfully` on each.
    pub fn tick(&mut self) -> Vec<Command> {
        let tick_start = Instant::now();
        let this_tick = self.tick_counter + 1;
        let mut system_times = Vec::with_capacity(self.systems.len() + 4);

        let timers = advance_timers(&mut self.world, self.config.fixed_dt);
        let deferred_run = self.run_deferred(this_tick);

        for system in &self.systems {
            let sys_start = Instant::now();
            (system.func)(&self.world, &mut self.command_buffer);
            system_times.push((system.name.clone(), sys_start.elapsed()));
        }
        let apply_start = Instant::now();
        let applied = self.command_buffer.apply(&mut self.world);
        let command_apply_time = apply_start.elapsed();

        let solve_start = Instant::now();
        self.grid.rebuild(&self.world, self.world.active_tier());
        let solve = detect_collisions(&mut self.world, &self.grid);
        system_times.push((COLLISION_SYSTEM_NAME.to_owned(), solve_start.elapsed()));

        let respond_start = Instant::now();
        let invariant_violations = {
            let mut ctx = ResponseContext {
                bus: &mut self.bus,
                config: &self.config.game,
                transitions: &mut self.transitions,
            };
            respond_all(&mut self.world, &mut ctx)
        };
        system_times.push(("response".to_owned(), respond_start.elapsed()));

        let moved = apply_intents(&mut self.world);
        let despawned = despawn_flagged(&mut self.world);

        self.tick_counter = this_tick;
        debug!(
            tick = this_tick,
            contacts = solve.contacts,
            despawned = despawned.len(),
            "tick complete"
        );

        self.last_diagnostics = TickDiagnostics {
            system_times,
            total_time: tick_start.elapsed(),
            command_apply_time,
            timers,
            deferred_run,
            solve,
            invariant_violations,
            moved,
            despawned,
        };

        applied
    }

    fn run_deferred(&mut self, this_tick: u64) -> usize {
        if self.deferred.is_empty() {
            return 0;
        }
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|d| d.due <= this_tick);
        self.deferred = waiting;
        due.sort_by_key(|d| (d.due, d.seq));
        let count = due.len();
        for d in due {
            (d.callback)(&mut self.world, &mut self.bus);
        }
        count
    }

    /// Run multiple ticks in sequence. Returns the total number of commands
    /// processed (both successful and failed) across all ticks.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        let mut total_commands = 0u64;
        for _ in 0..count {
            let applied = self.tick();
            total_commands += applied.len() as u64;
        }
        total_commands
    }

    // -- transitions --------------------------------------------------------

    /// Complete the pending transition by moving the player to `tier`.
    ///
    /// The player's tier, the active tier and the deepest-reached tier change
    /// together, and the pending request is cleared. Returns `Ok(false)` if
    /// nothing was pending. If the player no longer exists the request stays
    /// pending and the error is returned.
    pub fn resolve_transition(&mut self, tier: Tier) -> Result<bool, EcsError> {
        let Some(pending) = self.transitions.pending().copied() else {
            return Ok(false);
        };
        self.world.set_tier(pending.player, tier)?;
        self.world.set_active_tier(tier);
        self.transitions.reach(tier);
        self.transitions.take();
        info!(player = ?pending.player, from = %pending.from, to = %tier, "tier transition resolved");
        Ok(true)
    }

    /// Drop the pending transition without moving anyone.
    pub fn cancel_transition(&mut self) -> Option<PendingTransition> {
        let cancelled = self.transitions.take();
        if let Some(t) = &cancelled {
            warn!(player = ?t.player, to = %t.to, "tier transition cancelled");
        }
        cancelled
    }

    pub fn transitions(&self) -> &TransitionState {
        &self.transitions
    }

    // -- events -------------------------------------------------------------

    /// Take every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.bus.drain()
    }

    /// The event bus, for registering or removing handlers.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    // -- accessors ----------------------------------------------------------

    /// The number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds, computed as `tick_count * fixed_dt` so it
    /// does not drift.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, for setup and tests. Systems should go
    /// through the command buffer.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The spatial grid as rebuilt during the last tick.
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick_counter", &self.tick_counter)
            .field("systems", &self.systems)
            .field("deferred", &self.deferred.len())
            .field("active_tier", &self.world.active_tier())
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
