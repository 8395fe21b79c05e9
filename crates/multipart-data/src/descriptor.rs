//! Descriptors built from part kind files.

use crate::schema::TileKindData;
use multipart_core::descriptor::{PartDescriptor, Placement, Tile};
use multipart_core::id::PlacementState;
use multipart_core::occlusion::Aabb;
use multipart_core::slot::Slot;
use multipart_core::tag::TagCompound;
use std::any::Any;
use std::collections::BTreeSet;

const TICKS_KEY: &str = "ticks";

/// A part kind whose geometry and tile kind come from a data file.
#[derive(Debug, Clone)]
pub struct DataPart {
    name: String,
    boxes: Vec<Aabb>,
    ghosts: BTreeSet<Slot>,
    tile: TileKindData,
}

impl DataPart {
    pub fn new(
        name: impl Into<String>,
        boxes: Vec<Aabb>,
        ghosts: BTreeSet<Slot>,
        tile: TileKindData,
    ) -> Self {
        Self {
            name: name.into(),
            boxes,
            ghosts,
            tile,
        }
    }

    pub fn tile_kind(&self) -> TileKindData {
        self.tile
    }
}

impl PartDescriptor for DataPart {
    fn name(&self) -> &str {
        &self.name
    }

    fn occlusion_boxes(&self, _placement: &Placement<'_>) -> Vec<Aabb> {
        self.boxes.clone()
    }

    fn ghost_slots(&self, _placement: &Placement<'_>) -> BTreeSet<Slot> {
        self.ghosts.clone()
    }

    fn create_tile(&self, _slot: Slot, _state: PlacementState) -> Option<Box<dyn Tile>> {
        match self.tile {
            TileKindData::None => None,
            TileKindData::Static => Some(Box::new(DataTile::new(false))),
            TileKindData::Ticking => Some(Box::new(DataTile::new(true))),
        }
    }
}

/// Generic tile for data-driven parts. Counts its ticks and persists the
/// count.
#[derive(Debug, Clone, Default)]
pub struct DataTile {
    ticking: bool,
    ticks: i64,
    valid: bool,
}

impl DataTile {
    pub fn new(ticking: bool) -> Self {
        Self {
            ticking,
            ..Self::default()
        }
    }

    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Tile for DataTile {
    fn is_tickable(&self) -> bool {
        self.ticking
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn write(&self) -> TagCompound {
        TagCompound::new().with(TICKS_KEY, self.ticks)
    }

    fn read(&mut self, tag: &TagCompound) {
        self.ticks = tag.get_long(TICKS_KEY).unwrap_or(0);
    }

    fn validate(&mut self) {
        self.valid = true;
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
