//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a plain 64-bit handle. Ids are handed out in increasing
//! order and are never recycled: once an entity is despawned its id is
//! *retired*, so any handle still held elsewhere (a projectile's source, an
//! attacker reference) resolves to nothing instead of to a stranger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A unique, never-reused entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from its raw value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Why an id could not be claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// The id belongs to a live entity.
    Alive,
    /// The id belonged to an entity that has since been removed.
    Retired,
}

/// Allocates [`EntityId`]s and remembers every id that was ever retired.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Next candidate for automatic allocation.
    next: u64,
    /// Ids of live entities.
    alive: BTreeSet<EntityId>,
    /// Ids of despawned entities. Never handed out again.
    retired: BTreeSet<EntityId>,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`EntityId`], skipping any id that was explicitly
    /// claimed or retired.
    pub fn allocate(&mut self) -> EntityId {
        loop {
            let candidate = EntityId(self.next);
            self.next += 1;
            if !self.alive.contains(&candidate) && !self.retired.contains(&candidate) {
                self.alive.insert(candidate);
                return candidate;
            }
        }
    }

    /// Claim a caller-chosen id.
    pub fn claim(&mut self, id: EntityId) -> Result<(), ClaimError> {
        if self.alive.contains(&id) {
            return Err(ClaimError::Alive);
        }
        if self.retired.contains(&id) {
            return Err(ClaimError::Retired);
        }
        self.alive.insert(id);
        Ok(())
    }

    /// Retire a live id. Returns `false` if the id was not alive.
    pub fn retire(&mut self, id: EntityId) -> bool {
        if !self.alive.remove(&id) {
            return false;
        }
        self.retired.insert(id);
        true
    }

    /// Whether `id` refers to a live entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.alive.contains(&id)
    }

    /// Whether `id` was used by an entity that has been removed.
    pub fn is_retired(&self, id: EntityId) -> bool {
        self.retired.contains(&id)
    }

    /// Number of live entities.
    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
