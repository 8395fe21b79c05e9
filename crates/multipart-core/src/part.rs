use crate::descriptor::{PartDescriptor, Placement, Tile};
use crate::id::{CellId, PlacementState};
use crate::occlusion::Aabb;
use crate::slot::Slot;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One placed part: a slot, a descriptor, a placement state, and an optional
/// tile.
///
/// The part refers to its cell by id rather than by reference, so when a
/// cell's representation migrates the part only needs its id re-stamped.
#[derive(Debug)]
pub struct PartInfo {
    cell: CellId,
    slot: Slot,
    descriptor: Arc<dyn PartDescriptor>,
    state: PlacementState,
    tile: Option<Box<dyn Tile>>,
}

impl PartInfo {
    pub fn new(
        cell: CellId,
        slot: Slot,
        descriptor: Arc<dyn PartDescriptor>,
        state: PlacementState,
        tile: Option<Box<dyn Tile>>,
    ) -> Self {
        Self {
            cell,
            slot,
            descriptor,
            state,
            tile,
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub(crate) fn set_cell(&mut self, cell: CellId) {
        self.cell = cell;
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn descriptor(&self) -> &Arc<dyn PartDescriptor> {
        &self.descriptor
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn tile(&self) -> Option<&dyn Tile> {
        self.tile.as_deref()
    }

    pub fn tile_mut(&mut self) -> Option<&mut (dyn Tile + 'static)> {
        self.tile.as_deref_mut()
    }

    /// Downcast the tile to a concrete type.
    pub fn tile_as<T: 'static>(&self) -> Option<&T> {
        self.tile()?.as_any().downcast_ref::<T>()
    }

    pub fn tile_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.tile_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// True if the part has a tile that currently wants ticks.
    pub fn is_ticking(&self) -> bool {
        self.tile.as_ref().is_some_and(|t| t.is_tickable())
    }

    pub fn placement(&self) -> Placement<'_> {
        Placement::new(self.slot, self.state, self.tile())
    }

    pub fn occlusion_boxes(&self) -> Vec<Aabb> {
        self.descriptor.occlusion_boxes(&self.placement())
    }

    pub fn ghost_slots(&self) -> BTreeSet<Slot> {
        self.descriptor.ghost_slots(&self.placement())
    }

    /// The primary slot plus every ghost slot.
    pub fn claimed_slots(&self) -> BTreeSet<Slot> {
        let mut slots = self.ghost_slots();
        slots.insert(self.slot);
        slots
    }
}
