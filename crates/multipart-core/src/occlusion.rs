//! Axis-aligned occlusion volumes and the overlap test used to reject
//! placements.
//!
//! Boxes live in cell-local coordinates. Two boxes intersect only if they
//! share a nonzero volume; boxes that merely touch along a face, edge, or
//! corner do not. Cells hold single-digit part counts, so the pairwise test
//! is linear in the product of box counts and needs no spatial index.

use crate::fixed::{Coord, sixteenths};
use serde::{Deserialize, Serialize};

/// An axis-aligned box. `min` is inclusive, `max` exclusive on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [Coord; 3],
    pub max: [Coord; 3],
}

impl Aabb {
    /// Build a box from two opposite corners in any order.
    pub fn new(a: [Coord; 3], b: [Coord; 3]) -> Self {
        let mut min = a;
        let mut max = b;
        for axis in 0..3 {
            if min[axis] > max[axis] {
                std::mem::swap(&mut min[axis], &mut max[axis]);
            }
        }
        Self { min, max }
    }

    /// Build a box from corner points in sixteenths of a cell.
    pub fn from_sixteenths(a: [i32; 3], b: [i32; 3]) -> Self {
        Self::new(a.map(sixteenths), b.map(sixteenths))
    }

    /// The whole cell.
    pub fn unit() -> Self {
        Self::from_sixteenths([0, 0, 0], [16, 16, 16])
    }

    /// True if the two boxes share a region of nonzero volume.
    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|axis| self.min[axis] < other.max[axis] && other.min[axis] < self.max[axis])
    }

    /// True if the box has zero extent along any axis.
    pub fn is_degenerate(&self) -> bool {
        (0..3).any(|axis| self.min[axis] >= self.max[axis])
    }

    /// The smallest box containing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..3 {
            min[axis] = min[axis].min(other.min[axis]);
            max[axis] = max[axis].max(other.max[axis]);
        }
        Aabb { min, max }
    }

    pub fn volume(&self) -> Coord {
        (self.max[0] - self.min[0]) * (self.max[1] - self.min[1]) * (self.max[2] - self.min[2])
    }
}

/// True if any candidate box intersects any resident box.
pub fn boxes_intersect(candidate: &[Aabb], resident: &[Aabb]) -> bool {
    candidate
        .iter()
        .any(|c| resident.iter().any(|r| c.intersects(r)))
}
