//! The [`World`] is the top-level container for the ECS. It owns the entity
//! allocator, every entity record, and the per-tier membership index.
//!
//! Storage is deliberately plain: each [`Entity`] owns a tag-keyed map of its
//! components, and a second index maps every [`Tier`] to the ids it holds.
//! Tier queries walk the tier index; untiered queries walk all entities. Both
//! are computed fresh on each call, so they always reflect mutations made
//! earlier in the same tick.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::component::{Component, ComponentData, ComponentTag, Kind};
use crate::entity::{ClaimError, EntityAllocator, EntityId};
use crate::identity::{EntityKind, Tier};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One entity: its id, its tier, and its components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    id: EntityId,
    tier: Tier,
    components: BTreeMap<ComponentTag, Component>,
}

impl Entity {
    fn new(id: EntityId, tier: Tier) -> Self {
        Self {
            id,
            tier,
            components: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether the entity holds a component with `tag`.
    pub fn has(&self, tag: ComponentTag) -> bool {
        self.components.contains_key(&tag)
    }

    /// Whether the entity holds every tag in `tags`.
    pub fn has_all(&self, tags: &[ComponentTag]) -> bool {
        tags.iter().all(|t| self.components.contains_key(t))
    }

    /// Typed component access.
    pub fn get<T: ComponentData>(&self) -> Option<&T> {
        self.components.get(&T::TAG).and_then(T::from_component)
    }

    /// Untyped component access.
    pub fn component(&self, tag: ComponentTag) -> Option<&Component> {
        self.components.get(&tag)
    }

    /// Tags currently held, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = ComponentTag> + '_ {
        self.components.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The entity-component store.
#[derive(Default)]
pub struct World {
    allocator: EntityAllocator,
    entities: BTreeMap<EntityId, Entity>,
    /// Tier -> ids of the entities currently in that tier.
    tiers: BTreeMap<Tier, BTreeSet<EntityId>>,
    /// Implicit default scope for systems.
    active_tier: Tier,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("tier_count", &self.tiers.len())
            .field("active_tier", &self.active_tier)
            .finish()
    }
}

impl World {
    /// Create a new, empty world. The active tier starts at the surface.
    pub fn new() -> Self {
        Self::default()
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with a caller-chosen id.
    ///
    /// Fails if the id is alive or was used by an entity that has been
    /// removed; ids are never reused.
    pub fn create_entity(&mut self, id: EntityId, tier: Tier) -> Result<EntityId, EcsError> {
        self.allocator.claim(id).map_err(|e| match e {
            ClaimError::Alive => EcsError::DuplicateEntity { entity: id },
            ClaimError::Retired => EcsError::RetiredEntity { entity: id },
        })?;
        self.insert_record(Entity::new(id, tier));
        Ok(id)
    }

    /// Create an entity with a freshly allocated id.
    pub fn spawn(&mut self, tier: Tier) -> EntityId {
        let id = self.allocator.allocate();
        self.insert_record(Entity::new(id, tier));
        id
    }

    /// Create an entity with a fresh id and the given components.
    pub fn spawn_with<I>(&mut self, tier: Tier, components: I) -> EntityId
    where
        I: IntoIterator<Item = Component>,
    {
        let id = self.spawn(tier);
        if let Some(entity) = self.entities.get_mut(&id) {
            for c in components {
                entity.components.insert(c.tag(), c);
            }
        }
        id
    }

    fn insert_record(&mut self, entity: Entity) {
        self.tiers.entry(entity.tier).or_default().insert(entity.id);
        self.entities.insert(entity.id, entity);
    }

    /// Remove an entity and retire its id.
    pub fn despawn(&mut self, id: EntityId) -> Result<Entity, EcsError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(EcsError::StaleEntity { entity: id })?;
        self.detach_from_tier(id, entity.tier);
        self.allocator.retire(id);
        Ok(entity)
    }

    fn detach_from_tier(&mut self, id: EntityId, tier: Tier) {
        if let Some(members) = self.tiers.get_mut(&tier) {
            members.remove(&id);
            if members.is_empty() {
                self.tiers.remove(&tier);
            }
        }
    }

    /// Whether `id` refers to a live entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- tiers --------------------------------------------------------------

    /// Move an entity to another tier. The entity record and the tier index
    /// change together; there is no observable state in which the entity is
    /// in both tiers or neither.
    pub fn set_tier(&mut self, id: EntityId, tier: Tier) -> Result<(), EcsError> {
        let old = {
            let entity = self
                .entities
                .get_mut(&id)
                .ok_or(EcsError::StaleEntity { entity: id })?;
            std::mem::replace(&mut entity.tier, tier)
        };
        if old != tier {
            self.detach_from_tier(id, old);
            self.tiers.entry(tier).or_default().insert(id);
        }
        Ok(())
    }

    /// The tier an entity belongs to.
    pub fn tier_of(&self, id: EntityId) -> Option<Tier> {
        self.entities.get(&id).map(|e| e.tier)
    }

    pub fn set_active_tier(&mut self, tier: Tier) {
        self.active_tier = tier;
    }

    pub fn active_tier(&self) -> Tier {
        self.active_tier
    }

    /// Ids of every entity currently in `tier`, in id order.
    pub fn tier_members(&self, tier: Tier) -> Vec<EntityId> {
        self.tiers
            .get(&tier)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    // -- component access ---------------------------------------------------

    /// Look up an entity record.
    pub fn get_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Insert a component, replacing any existing component with the same tag.
    /// Returns the replaced value.
    pub fn insert_component(
        &mut self,
        id: EntityId,
        component: impl Into<Component>,
    ) -> Result<Option<Component>, EcsError> {
        let component = component.into();
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::StaleEntity { entity: id })?;
        Ok(entity.components.insert(component.tag(), component))
    }

    /// Remove the component with `tag`. Removing an absent tag is a no-op.
    pub fn remove_component(
        &mut self,
        id: EntityId,
        tag: ComponentTag,
    ) -> Result<Option<Component>, EcsError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(EcsError::StaleEntity { entity: id })?;
        Ok(entity.components.remove(&tag))
    }

    /// Typed removal. Returns the removed value, or `None` when the entity or
    /// the component is missing.
    pub fn remove<T: ComponentData>(&mut self, id: EntityId) -> Option<T> {
        let removed = self.entities.get_mut(&id)?.components.remove(&T::TAG)?;
        T::into_record(removed)
    }

    /// Typed read access.
    pub fn get<T: ComponentData>(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)?.get::<T>()
    }

    /// Typed write access.
    pub fn get_mut<T: ComponentData>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities
            .get_mut(&id)?
            .components
            .get_mut(&T::TAG)
            .and_then(T::from_component_mut)
    }

    /// Typed write access, inserting `T::default()` first if absent.
    ///
    /// Returns `None` only when the entity does not exist.
    pub fn get_or_insert_default<T>(&mut self, id: EntityId) -> Option<&mut T>
    where
        T: ComponentData + Default,
    {
        let slot = self
            .entities
            .get_mut(&id)?
            .components
            .entry(T::TAG)
            .or_insert_with(|| T::default().into());
        T::from_component_mut(slot)
    }

    /// Whether the entity holds a component with `tag`.
    pub fn has(&self, id: EntityId, tag: ComponentTag) -> bool {
        self.entities.get(&id).is_some_and(|e| e.has(tag))
    }

    /// The entity's gameplay kind, if it has one.
    pub fn kind(&self, id: EntityId) -> Option<&EntityKind> {
        self.get::<Kind>(id).map(|k| &k.0)
    }

    /// Mutable access to the entity's gameplay kind.
    pub fn kind_mut(&mut self, id: EntityId) -> Option<&mut EntityKind> {
        self.get_mut::<Kind>(id).map(|k| &mut k.0)
    }

    // -- queries ------------------------------------------------------------

    /// Every entity holding all `tags`, optionally restricted to one tier.
    ///
    /// Computed fresh on every call. The result is sorted by id and contains
    /// no duplicates.
    pub fn entities_with(&self, tags: &[ComponentTag], tier: Option<Tier>) -> Vec<EntityId> {
        match tier {
            Some(tier) => self
                .tiers
                .get(&tier)
                .into_iter()
                .flatten()
                .filter(|id| self.entities.get(id).is_some_and(|e| e.has_all(tags)))
                .copied()
                .collect(),
            None => self
                .entities
                .values()
                .filter(|e| e.has_all(tags))
                .map(|e| e.id)
                .collect(),
        }
    }

    /// Iterate over every entity record in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    // -- determinism --------------------------------------------------------

    /// blake3 digest of every entity record plus the active tier.
    ///
    /// Two worlds that went through the same operations hash identically.
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.active_tier.0.to_le_bytes());
        for entity in self.entities.values() {
            match serde_json::to_vec(entity) {
                Ok(bytes) => {
                    hasher.update(&bytes);
                }
                Err(e) => {
                    tracing::warn!(entity = ?entity.id, error = %e, "state_hash: failed to serialize entity");
                }
            }
        }
        *hasher.finalize().as_bytes()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
