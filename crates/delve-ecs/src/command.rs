//! Command buffer for deferred world mutations.
//!
//! Upstream systems (input, AI, spawners) only get a shared `&World`. They
//! queue their changes in a [`CommandBuffer`], which the tick loop applies in
//! FIFO order once every upstream system has run. Each command remembers which
//! system issued it so failures can be traced in the logs.
//!
//! # Example
//!
//! ```
//! use delve_ecs::prelude::*;
//!
//! let mut world = World::new();
//! let e = world.spawn_with(Tier(0), [Position { x: 0.0, y: 0.0 }.into()]);
//!
//! let mut cmds = CommandBuffer::new();
//! cmds.insert(e, MovementIntent { target_x: 4.0, target_y: 0.0 }, "input");
//!
//! let applied = cmds.apply(&mut world);
//! assert_eq!(applied.len(), 1);
//! assert!(world.has(e, ComponentTag::MovementIntent));
//! ```

use std::collections::HashMap;

use tracing::warn;

use crate::component::{Component, ComponentTag};
use crate::entity::EntityId;
use crate::identity::Tier;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// What mutation to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Insert or overwrite a component.
    Insert(Component),
    /// Remove a component (no-op if absent).
    Remove(ComponentTag),
    /// Move the entity to another tier.
    SetTier(Tier),
    /// Despawn the entity.
    Despawn,
    /// Spawn a new entity with the given components.
    Spawn {
        tier: Tier,
        components: Vec<Component>,
    },
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single queued mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The entity affected. `None` for spawns.
    pub target: Option<EntityId>,
    pub kind: CommandKind,
    /// Name of the system that issued the command.
    pub issued_by: String,
    /// Position within the buffer at the time it was queued.
    pub command_index: u32,
    /// Filled in after a spawn command is applied.
    pub spawned_entity: Option<EntityId>,
    /// Whether the command changed the world.
    pub applied_successfully: bool,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Summary of the most recent [`CommandBuffer::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Number of (entity, tag) pairs written by more than one command.
    pub conflict_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// FIFO queue of deferred mutations.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
    last_apply_report: ApplyReport,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a component insert.
    pub fn insert(&mut self, target: EntityId, component: impl Into<Component>, issued_by: &str) {
        self.push(
            Some(target),
            CommandKind::Insert(component.into()),
            issued_by,
        );
    }

    /// Queue a component removal.
    pub fn remove(&mut self, target: EntityId, tag: ComponentTag, issued_by: &str) {
        self.push(Some(target), CommandKind::Remove(tag), issued_by);
    }

    /// Queue a tier move.
    pub fn set_tier(&mut self, target: EntityId, tier: Tier, issued_by: &str) {
        self.push(Some(target), CommandKind::SetTier(tier), issued_by);
    }

    /// Queue a despawn.
    pub fn despawn(&mut self, target: EntityId, issued_by: &str) {
        self.push(Some(target), CommandKind::Despawn, issued_by);
    }

    /// Queue a spawn.
    pub fn spawn(&mut self, tier: Tier, components: Vec<Component>, issued_by: &str) {
        self.push(None, CommandKind::Spawn { tier, components }, issued_by);
    }

    /// Queued commands, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Report from the most recent [`apply`](Self::apply).
    pub fn last_apply_report(&self) -> &ApplyReport {
        &self.last_apply_report
    }

    /// Apply every queued command in insertion order and empty the buffer.
    ///
    /// Commands targeting entities that no longer exist are logged and
    /// skipped; they are still returned with `applied_successfully == false`.
    pub fn apply(&mut self, world: &mut World) -> Vec<Command> {
        let mut commands = std::mem::take(&mut self.commands);
        self.next_index = 0;

        // --- Conflict detection ---
        let mut seen: HashMap<(EntityId, ComponentTag), Vec<u32>> = HashMap::new();
        for cmd in &commands {
            let tag = match &cmd.kind {
                CommandKind::Insert(c) => Some(c.tag()),
                CommandKind::Remove(tag) => Some(*tag),
                _ => None,
            };
            if let (Some(target), Some(tag)) = (cmd.target, tag) {
                seen.entry((target, tag))
                    .or_default()
                    .push(cmd.command_index);
            }
        }
        let mut conflict_count = 0;
        for ((entity, tag), indices) in &seen {
            if indices.len() > 1 {
                conflict_count += 1;
                warn!(
                    entity = ?entity,
                    component = %tag,
                    command_indices = ?indices,
                    "conflict: {} commands target the same entity+component in this tick (last-write-wins)",
                    indices.len()
                );
            }
        }

        // --- Apply loop ---
        let mut success_count = 0;
        let mut failed_count = 0;

        for cmd in &mut commands {
            let result = Self::apply_one(world, cmd);
            match result {
                Ok(()) => {
                    cmd.applied_successfully = true;
                    success_count += 1;
                }
                Err(e) => {
                    failed_count += 1;
                    warn!(
                        command_index = cmd.command_index,
                        target = ?cmd.target,
                        issued_by = %cmd.issued_by,
                        error = %e,
                        "command application failed"
                    );
                }
            }
        }

        self.last_apply_report = ApplyReport {
            conflict_count,
            success_count,
            failed_count,
        };

        commands
    }

    fn apply_one(world: &mut World, cmd: &mut Command) -> Result<(), EcsError> {
        match (&cmd.kind, cmd.target) {
            (CommandKind::Spawn { tier, components }, _) => {
                let entity = world.spawn_with(*tier, components.iter().cloned());
                cmd.spawned_entity = Some(entity);
                Ok(())
            }
            (CommandKind::Insert(component), Some(target)) => world
                .insert_component(target, component.clone())
                .map(|_| ()),
            (CommandKind::Remove(tag), Some(target)) => {
                world.remove_component(target, *tag).map(|_| ())
            }
            (CommandKind::SetTier(tier), Some(target)) => world.set_tier(target, *tier),
            (CommandKind::Despawn, Some(target)) => world.despawn(target).map(|_| ()),
            (_, None) => Err(EcsError::MissingTarget),
        }
    }

    /// Drop every queued command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    fn push(&mut self, target: Option<EntityId>, kind: CommandKind, issued_by: &str) {
        let index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            kind,
            issued_by: issued_by.to_owned(),
            command_index: index,
            spawned_entity: None,
            applied_successfully: false,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
