//! Part descriptors and tiles: the two extension points content authors
//! implement.
//!
//! A [`PartDescriptor`] is the immutable, shared description of a part kind.
//! It answers geometry questions (occlusion boxes, ghost slots), produces
//! tiles, and receives lifecycle hooks. A [`Tile`] is the optional mutable
//! per-part state a placed part may carry: it ticks, persists itself,
//! answers capability queries, and hints the renderer.

use crate::capability::{Capability, CapabilityKind};
use crate::id::PlacementState;
use crate::occlusion::Aabb;
use crate::part::PartInfo;
use crate::slot::{Face, Slot};
use crate::tag::TagCompound;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;

/// Default squared render distance, in cells, for tiles that do not override
/// [`Tile::max_render_distance_sq`].
pub const DEFAULT_RENDER_DISTANCE_SQ: f64 = 64.0 * 64.0;

/// Rotation applied to a structure as a whole, forwarded to every tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    CounterClockwise90,
}

/// Mirroring applied to a structure as a whole, forwarded to every tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mirror {
    #[default]
    None,
    LeftRight,
    FrontBack,
}

/// A prospective or actual placement: what a descriptor sees when asked
/// about geometry.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub slot: Slot,
    pub state: PlacementState,
    pub tile: Option<&'a dyn Tile>,
}

impl<'a> Placement<'a> {
    pub fn new(slot: Slot, state: PlacementState, tile: Option<&'a dyn Tile>) -> Self {
        Self { slot, state, tile }
    }
}

// ---------------------------------------------------------------------------
// PartDescriptor
// ---------------------------------------------------------------------------

/// Immutable description of a part kind, shared by every instance.
pub trait PartDescriptor: fmt::Debug + Send + Sync {
    /// Stable name used in logs and by content files.
    fn name(&self) -> &str;

    /// Boxes, in cell-local coordinates, this placement occupies exclusively.
    fn occlusion_boxes(&self, placement: &Placement<'_>) -> Vec<Aabb>;

    /// Additional slots this placement blocks without occupying them.
    fn ghost_slots(&self, placement: &Placement<'_>) -> BTreeSet<Slot> {
        let _ = placement;
        BTreeSet::new()
    }

    /// Create a fresh tile for a new placement, if this kind carries one.
    fn create_tile(&self, slot: Slot, state: PlacementState) -> Option<Box<dyn Tile>> {
        let _ = (slot, state);
        None
    }

    /// Rebuild a tile from its persisted form.
    fn load_tile(
        &self,
        slot: Slot,
        state: PlacementState,
        tag: &TagCompound,
    ) -> Option<Box<dyn Tile>> {
        let mut tile = self.create_tile(slot, state)?;
        tile.read(tag);
        Some(tile)
    }

    /// Called after `part` has been inserted into its cell.
    fn on_added(&self, part: &PartInfo) {
        let _ = part;
    }

    /// Called after `part` has been taken out of its cell.
    fn on_removed(&self, part: &PartInfo) {
        let _ = part;
    }

    /// Called on `part` when `added` joined the same cell.
    fn on_part_added(&self, part: &PartInfo, added: &PartInfo) {
        let _ = (part, added);
    }

    /// Called on `part` when `removed` left the same cell.
    fn on_part_removed(&self, part: &PartInfo, removed: &PartInfo) {
        let _ = (part, removed);
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// Mutable per-part state.
pub trait Tile: fmt::Debug + Send + Sync {
    /// Whether this tile wants per-tick callbacks. May change over the
    /// tile's lifetime; the container re-checks on removal and on tick.
    fn is_tickable(&self) -> bool {
        false
    }

    fn tick(&mut self) {}

    /// Full persisted state.
    fn write(&self) -> TagCompound;

    /// Restore from [`Tile::write`] output.
    fn read(&mut self, tag: &TagCompound) {
        let _ = tag;
    }

    /// The reduced state sent to mirrors. Defaults to the full state.
    fn update_tag(&self) -> TagCompound {
        self.write()
    }

    /// Apply [`Tile::update_tag`] output received from the authoritative side.
    fn handle_update_tag(&mut self, tag: &TagCompound) {
        self.read(tag);
    }

    /// Tile became live in a cell.
    fn validate(&mut self) {}

    /// Tile left its cell.
    fn invalidate(&mut self) {}

    /// The surrounding region finished loading.
    fn on_load(&mut self) {}

    /// The surrounding region is being unloaded.
    fn on_unload(&mut self) {}

    fn rotate(&mut self, rotation: Rotation) {
        let _ = rotation;
    }

    fn mirror(&mut self, mirror: Mirror) {
        let _ = mirror;
    }

    fn has_capability(&self, kind: CapabilityKind, face: Option<Face>) -> bool {
        let _ = (kind, face);
        false
    }

    fn capability(&self, kind: CapabilityKind, face: Option<Face>) -> Option<Capability> {
        let _ = (kind, face);
        None
    }

    // -- Render hints --

    fn render_bounds(&self) -> Aabb {
        Aabb::unit()
    }

    fn max_render_distance_sq(&self) -> f64 {
        DEFAULT_RENDER_DISTANCE_SQ
    }

    /// Whether the tile can be drawn by the batched fast path.
    fn has_fast_renderer(&self) -> bool {
        false
    }

    fn should_render_in_pass(&self, pass: u8) -> bool {
        pass == 0
    }

    /// Whether the tile draws its own breaking overlay.
    fn can_render_breaking(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
