//! Coarse bucket grid over one tier.
//!
//! Each entity is filed under the cell containing its position:
//! `cell = floor(x / tile_size / bucket_span)`. The grid is rebuilt from the
//! store every tick and never updated incrementally. Cells are
//! generation-counted: a rebuild bumps the generation instead of freeing cell
//! vectors, and a cell whose generation is behind the grid's reads as empty.
//!
//! Footprints can spill out of the cell that holds their position, so
//! [`SpatialGrid::query`] widens the searched cell range by the largest spill
//! seen during the rebuild. The query is conservative: every entity whose
//! footprint touches the area is returned, plus possibly some that do not.
//!
//! ```
//! use delve_ecs::prelude::*;
//! use delve_engine::spatial::SpatialGrid;
//! use delve_engine::sweep::Aabb;
//!
//! let mut world = World::new();
//! let wall = world.spawn_with(
//!     Tier(0),
//!     [Position { x: 70.0, y: 0.0 }.into(), Hitbox::new(16.0, 16.0).into()],
//! );
//!
//! let mut grid = SpatialGrid::new(16.0, 4);
//! grid.rebuild(&world, Tier(0));
//! assert_eq!(grid.cell_key(70.0, 0.0), (1, 0));
//! assert_eq!(grid.query(&Aabb::new(60.0, 0.0, 20.0, 10.0)), vec![wall]);
//! ```

use std::collections::HashMap;

use delve_ecs::component::{ComponentTag, Hitbox, Position, Visuals};
use delve_ecs::entity::EntityId;
use delve_ecs::identity::Tier;
use delve_ecs::world::World;
use tracing::trace;

use crate::sweep::Aabb;

/// Integer cell coordinate.
pub type CellKey = (i64, i64);

#[derive(Debug, Default)]
struct Cell {
    generation: u64,
    members: Vec<EntityId>,
}

/// Per-tier bucket grid. A derived cache of the store, never a source of
/// truth.
#[derive(Debug)]
pub struct SpatialGrid {
    tile_size: f64,
    bucket_span: f64,
    generation: u64,
    tier: Option<Tier>,
    cells: HashMap<CellKey, Cell>,
    footprints: HashMap<EntityId, Aabb>,
    /// Largest distance a footprint reaches left of / above its position.
    spill_lo: f64,
    /// Largest distance a footprint reaches right of / below its position.
    spill_hi: f64,
}

impl SpatialGrid {
    /// Create an empty grid. `tile_size` must be positive and `bucket_span`
    /// at least 1.
    pub fn new(tile_size: f64, bucket_span: u32) -> Self {
        assert!(
            tile_size > 0.0 && tile_size.is_finite(),
            "tile_size must be positive and finite, got {tile_size}"
        );
        assert!(bucket_span >= 1, "bucket_span must be at least 1");
        Self {
            tile_size,
            bucket_span: f64::from(bucket_span),
            generation: 0,
            tier: None,
            cells: HashMap::new(),
            footprints: HashMap::new(),
            spill_lo: 0.0,
            spill_hi: 0.0,
        }
    }

    /// The one key function used by both insertion and lookup.
    pub fn cell_key(&self, x: f64, y: f64) -> CellKey {
        (
            (x / self.tile_size / self.bucket_span).floor() as i64,
            (y / self.tile_size / self.bucket_span).floor() as i64,
        )
    }

    /// Tier indexed by the latest rebuild.
    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // -- population ---------------------------------------------------------

    /// Discard the current contents and start indexing `tier`.
    ///
    /// Cell vectors are kept for reuse.
    pub fn clear(&mut self, tier: Tier) {
        self.generation += 1;
        self.tier = Some(tier);
        self.footprints.clear();
        self.spill_lo = 0.0;
        self.spill_hi = 0.0;
    }

    /// File `id` under the cell containing `anchor`, remembering its
    /// footprint.
    pub fn insert(&mut self, id: EntityId, anchor: &Position, footprint: Aabb) {
        let key = self.cell_key(anchor.x, anchor.y);
        let generation = self.generation;
        let cell = self.cells.entry(key).or_default();
        if cell.generation != generation {
            cell.members.clear();
            cell.generation = generation;
        }
        cell.members.push(id);

        self.spill_lo = self
            .spill_lo
            .max(anchor.x - footprint.x)
            .max(anchor.y - footprint.y);
        self.spill_hi = self
            .spill_hi
            .max(footprint.max_x() - anchor.x)
            .max(footprint.max_y() - anchor.y);
        self.footprints.insert(id, footprint);
    }

    /// Rebuild from every entity of `tier` that has a position and an
    /// extent. The extent is the hitbox when present, the visual size
    /// otherwise. Entities pending removal are left out.
    pub fn rebuild(&mut self, world: &World, tier: Tier) {
        self.clear(tier);
        for id in world.tier_members(tier) {
            if world.has(id, ComponentTag::PendingRemoval) {
                continue;
            }
            let Some(position) = world.get::<Position>(id).copied() else {
                continue;
            };
            let footprint = if let Some(hitbox) = world.get::<Hitbox>(id) {
                Aabb::footprint(&position, hitbox)
            } else if let Some(visuals) = world.get::<Visuals>(id) {
                Aabb::new(position.x, position.y, visuals.width, visuals.height)
            } else {
                continue;
            };
            self.insert(id, &position, footprint);
        }
        trace!(
            tier = %tier,
            entities = self.footprints.len(),
            generation = self.generation,
            "spatial grid rebuilt"
        );
    }

    // -- lookup -------------------------------------------------------------

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Members of one cell, in insertion order. Stale cells read as empty.
    pub fn cell(&self, key: CellKey) -> &[EntityId] {
        match self.cells.get(&key) {
            Some(cell) if cell.generation == self.generation => &cell.members,
            _ => &[],
        }
    }

    /// Footprint recorded for `id` in the latest rebuild.
    pub fn footprint(&self, id: EntityId) -> Option<Aabb> {
        self.footprints.get(&id).copied()
    }

    /// Candidate ids whose footprint may touch `area`, sorted by id.
    pub fn query(&self, area: &Aabb) -> Vec<EntityId> {
        let (min_cx, min_cy) = self.cell_key(area.x - self.spill_hi, area.y - self.spill_hi);
        let (max_cx, max_cy) =
            self.cell_key(area.max_x() + self.spill_lo, area.max_y() + self.spill_lo);

        // Keys saturate at the i64 range for far-off coordinates.
        let span_x = (i128::from(max_cx) - i128::from(min_cx) + 1).max(0) as u128;
        let span_y = (i128::from(max_cy) - i128::from(min_cy) + 1).max(0) as u128;
        let in_range = |(cx, cy): CellKey| cx >= min_cx && cx <= max_cx && cy >= min_cy && cy <= max_cy;

        let mut out = Vec::new();
        if span_x.saturating_mul(span_y) > self.cells.len() as u128 {
            // Huge area (a very fast mover): walking the live cells is cheaper
            // than walking the key range.
            for (key, cell) in &self.cells {
                if cell.generation == self.generation && in_range(*key) {
                    out.extend_from_slice(&cell.members);
                }
            }
        } else {
            for cx in min_cx..=max_cx {
                for cy in min_cy..=max_cy {
                    out.extend_from_slice(self.cell((cx, cy)));
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// blake3 digest of the live contents: tier, then every live cell in key
    /// order with its members sorted. Independent of insertion order.
    pub fn digest(&self) -> [u8; 32] {
        let mut live: Vec<(CellKey, Vec<EntityId>)> = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.generation == self.generation && !cell.members.is_empty())
            .map(|(key, cell)| {
                let mut members = cell.members.clone();
                members.sort_unstable();
                (*key, members)
            })
            .collect();
        live.sort_unstable_by_key(|(key, _)| *key);

        let mut hasher = blake3::Hasher::new();
        if let Some(tier) = self.tier {
            hasher.update(&tier.0.to_le_bytes());
        }
        for ((cx, cy), members) in &live {
            hasher.update(&cx.to_le_bytes());
            hasher.update(&cy.to_le_bytes());
            hasher.update(&(members.len() as u64).to_le_bytes());
            for id in members {
                hasher.update(&id.to_raw().to_le_bytes());
            }
        }
        *hasher.finalize().as_bytes()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
