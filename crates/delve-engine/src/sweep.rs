//! Axis-aligned box geometry and the continuous (swept) overlap test.
//!
//! The narrow phase treats the mover as a rectangle translated by `(dx, dy)`
//! over one tick and the target as stationary. For each axis it computes the
//! fractions of the motion at which the two rectangles start and stop
//! overlapping on that axis; the contact window is the intersection of the
//! two per-axis windows. Because the test works on the whole segment rather
//! than on sampled positions, a fast mover cannot skip over a thin wall.
//!
//! The broad phase is the mover's *path bounds*: the smallest box containing
//! the mover at the start and at the end of the motion. Every intermediate
//! position lies inside it, so a target outside the path bounds cannot be hit.

use delve_ecs::component::{Hitbox, Position};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in world pixels (`x`, `y` is the top-left corner).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aabb {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Aabb {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The world-space footprint of an entity: its hitbox, offset from its
    /// position.
    pub fn footprint(position: &Position, hitbox: &Hitbox) -> Self {
        Self::new(
            position.x + hitbox.offset_x,
            position.y + hitbox.offset_y,
            hitbox.width,
            hitbox.height,
        )
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// The same box moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }

    /// Grow the box by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Overlap with positive area. Boxes that only share an edge do not
    /// overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    /// Overlap including shared edges and corners.
    pub fn touches(&self, other: &Aabb) -> bool {
        self.x <= other.max_x()
            && other.x <= self.max_x()
            && self.y <= other.max_y()
            && other.y <= self.max_y()
    }
}

// ---------------------------------------------------------------------------
// Broad phase helpers
// ---------------------------------------------------------------------------

/// The region swept by `mover` over a motion of `(dx, dy)`.
pub fn path_bounds(mover: &Aabb, dx: f64, dy: f64) -> Aabb {
    mover.union(&mover.translated(dx, dy))
}

/// Conservative prefilter: can `target` possibly be touched along the path?
pub fn broad_phase_accepts(path: &Aabb, target: &Aabb) -> bool {
    path.touches(target)
}

/// Adjacency test used for melee and interactions. Looser than overlap: two
/// boxes within `reach` pixels of each other on both axes count.
pub fn within_reach(a: &Aabb, b: &Aabb, reach: f64) -> bool {
    a.expanded(reach).touches(b)
}

// ---------------------------------------------------------------------------
// Narrow phase
// ---------------------------------------------------------------------------

/// Result of a successful swept test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the motion at which contact starts, in `[0, 1]`.
    pub entry_time: f64,
    pub normal_x: f64,
    pub normal_y: f64,
}

/// Sign that maps zero to zero (unlike `f64::signum`).
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Entry/exit fractions on one axis, or `None` if the boxes can never overlap
/// on this axis.
///
/// A zero-delta axis puts no time constraint on the contact, provided the
/// boxes already overlap on that axis.
fn axis_window(a_min: f64, a_len: f64, b_min: f64, b_len: f64, d: f64) -> Option<(f64, f64)> {
    let a_max = a_min + a_len;
    let b_max = b_min + b_len;
    if d == 0.0 {
        if a_min < b_max && b_min < a_max {
            Some((f64::NEG_INFINITY, f64::INFINITY))
        } else {
            None
        }
    } else if d > 0.0 {
        Some(((b_min - a_max) / d, (b_max - a_min) / d))
    } else {
        Some(((b_max - a_min) / d, (b_min - a_max) / d))
    }
}

/// Push-out normal for boxes that already overlap: along the axis of least
/// penetration, away from the target's centre.
fn separation_normal(mover: &Aabb, target: &Aabb) -> (f64, f64) {
    let pen_x = mover.max_x().min(target.max_x()) - mover.x.max(target.x);
    let pen_y = mover.max_y().min(target.max_y()) - mover.y.max(target.y);
    let (mcx, mcy) = mover.center();
    let (tcx, tcy) = target.center();
    if pen_x < pen_y {
        (sign(mcx - tcx), 0.0)
    } else {
        (0.0, sign(mcy - tcy))
    }
}

/// Continuous overlap test of `mover` moving by `(dx, dy)` against a
/// stationary `target`.
///
/// Returns `None` when the boxes do not meet during the motion. Boxes that
/// already overlap report `entry_time == 0`.
pub fn swept_aabb(mover: &Aabb, dx: f64, dy: f64, target: &Aabb) -> Option<SweepHit> {
    if mover.overlaps(target) {
        let (normal_x, normal_y) = separation_normal(mover, target);
        return Some(SweepHit {
            entry_time: 0.0,
            normal_x,
            normal_y,
        });
    }

    let (x_entry, x_exit) = axis_window(mover.x, mover.width, target.x, target.width, dx)?;
    let (y_entry, y_exit) = axis_window(mover.y, mover.height, target.y, target.height, dy)?;

    let entry_time = x_entry.max(y_entry);
    let exit_time = x_exit.min(y_exit);

    if entry_time > exit_time || (x_entry < 0.0 && y_entry < 0.0) || x_entry > 1.0 || y_entry > 1.0
    {
        return None;
    }

    let (normal_x, normal_y) = if x_entry >= y_entry {
        (-sign(dx), 0.0)
    } else {
        (0.0, -sign(dy))
    };

    Some(SweepHit {
        entry_time,
        normal_x,
        normal_y,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
