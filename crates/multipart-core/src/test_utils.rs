//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available to other crates' tests through the `test-utils` feature.

use crate::capability::{Capability, CapabilityJoiners, CapabilityKind};
use crate::descriptor::{Mirror, PartDescriptor, Placement, Rotation, Tile};
use crate::engine::MultipartEngine;
use crate::host::CellGrid;
use crate::id::{CellId, PartKindId, PlacementState};
use crate::occlusion::Aabb;
use crate::part::PartInfo;
use crate::registry::{PartRegistry, PartRegistryBuilder};
use crate::slot::{Face, Slot};
use crate::sync::Side;
use crate::tag::TagCompound;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

// ===========================================================================
// Kinds
// ===========================================================================

/// Thin plate on a face slot, or the standard shape of any other slot.
pub const PANEL: PartKindId = PartKindId(1);
/// Standard shape; in the center slot a post clear of every face plate.
pub const POST: PartKindId = PartKindId(2);
/// Face plate that also claims the center slot as a ghost.
pub const SIGN: PartKindId = PartKindId(3);
/// Standard shape with a ticking [`PumpTile`].
pub const PUMP: PartKindId = PartKindId(4);
/// Standard shape with a non-ticking [`NoteTile`].
pub const NOTE: PartKindId = PartKindId(5);
/// Tall column that overlaps the up and down plates.
pub const BULKY: PartKindId = PartKindId(6);
/// Tiny cube in the middle of the cell.
pub const GEM: PartKindId = PartKindId(7);
/// Standard shape with a [`TankTile`] providing [`FLUID`].
pub const TANK: PartKindId = PartKindId(8);

pub const FLUID: CapabilityKind = CapabilityKind(1);

pub fn state(kind: PartKindId) -> PlacementState {
    PlacementState::of(kind)
}

// ===========================================================================
// Geometry
// ===========================================================================

fn axis(face: Face) -> usize {
    match face {
        Face::West | Face::East => 0,
        Face::Down | Face::Up => 1,
        Face::North | Face::South => 2,
    }
}

fn thin(face: Face) -> (i32, i32) {
    match face {
        Face::Down | Face::North | Face::West => (0, 2),
        Face::Up | Face::South | Face::East => (14, 16),
    }
}

/// Box a part of standard shape occupies in `slot`. Face plates, edge rods,
/// corner cubes, and the center post only touch one another.
pub fn standard_box(slot: Slot) -> Aabb {
    let mut min = [2, 2, 2];
    let mut max = [14, 14, 14];
    let faces: Vec<Face> = match slot {
        Slot::Center => return Aabb::from_sixteenths([6, 2, 6], [10, 14, 10]),
        Slot::Face(f) => vec![f],
        Slot::Edge(e) => {
            let (a, b) = e.faces();
            vec![a, b]
        }
        Slot::Corner(c) => c.faces().to_vec(),
    };
    for face in faces {
        let (lo, hi) = thin(face);
        min[axis(face)] = lo;
        max[axis(face)] = hi;
    }
    Aabb::from_sixteenths(min, max)
}

// ===========================================================================
// Hook log
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Added { slot: Slot },
    Removed { slot: Slot },
    PartAdded { observer: Slot, added: Slot },
    PartRemoved { observer: Slot, removed: Slot },
}

/// Shared record of descriptor hook calls, in call order.
#[derive(Debug, Clone, Default)]
pub struct HookLog(Arc<Mutex<Vec<HookCall>>>);

impl HookLog {
    fn record(&self, call: HookCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.0.lock() {
            calls.clear();
        }
    }
}

// ===========================================================================
// Tiles
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluidTank {
    pub capacity: u32,
}

/// Register a [`FLUID`] joiner that sums capacities.
pub fn register_fluid_joiner(joiners: &mut CapabilityJoiners) {
    joiners.register_typed(FLUID, |tanks: Vec<Arc<FluidTank>>| FluidTank {
        capacity: tanks.iter().map(|t| t.capacity).sum(),
    });
}

#[derive(Debug, Clone, PartialEq)]
pub struct PumpTile {
    pub ticks: u32,
    pub active: bool,
    pub valid: bool,
    pub loaded: bool,
    pub updates_applied: u32,
    pub rotation: Rotation,
}

impl Default for PumpTile {
    fn default() -> Self {
        Self {
            ticks: 0,
            active: true,
            valid: false,
            loaded: false,
            updates_applied: 0,
            rotation: Rotation::None,
        }
    }
}

impl Tile for PumpTile {
    fn is_tickable(&self) -> bool {
        self.active
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn write(&self) -> TagCompound {
        TagCompound::new()
            .with("ticks", i64::from(self.ticks))
            .with("active", self.active)
    }

    fn read(&mut self, tag: &TagCompound) {
        self.ticks = tag.get_long("ticks").unwrap_or_default() as u32;
        self.active = tag.get_bool("active").unwrap_or(true);
    }

    fn handle_update_tag(&mut self, tag: &TagCompound) {
        self.read(tag);
        self.updates_applied += 1;
    }

    fn validate(&mut self) {
        self.valid = true;
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    fn on_load(&mut self) {
        self.loaded = true;
    }

    fn on_unload(&mut self) {
        self.loaded = false;
    }

    fn rotate(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    fn has_capability(&self, kind: CapabilityKind, _face: Option<Face>) -> bool {
        kind == FLUID
    }

    fn capability(&self, kind: CapabilityKind, _face: Option<Face>) -> Option<Capability> {
        (kind == FLUID).then(|| Arc::new(FluidTank { capacity: 1000 }) as Capability)
    }

    fn can_render_breaking(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteTile {
    pub text: String,
    pub valid: bool,
    pub mirror: Mirror,
}

impl Tile for NoteTile {
    fn write(&self) -> TagCompound {
        TagCompound::new().with("text", self.text.as_str())
    }

    fn read(&mut self, tag: &TagCompound) {
        self.text = tag.get_str("text").unwrap_or_default().to_string();
    }

    fn validate(&mut self) {
        self.valid = true;
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    fn mirror(&mut self, mirror: Mirror) {
        self.mirror = mirror;
    }

    fn has_fast_renderer(&self) -> bool {
        true
    }

    fn should_render_in_pass(&self, pass: u8) -> bool {
        pass <= 1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TankTile {
    pub capacity: u32,
}

impl Tile for TankTile {
    fn write(&self) -> TagCompound {
        TagCompound::new().with("capacity", self.capacity as i32)
    }

    fn read(&mut self, tag: &TagCompound) {
        self.capacity = tag.get_int("capacity").unwrap_or_default() as u32;
    }

    fn has_capability(&self, kind: CapabilityKind, _face: Option<Face>) -> bool {
        kind == FLUID
    }

    fn capability(&self, kind: CapabilityKind, _face: Option<Face>) -> Option<Capability> {
        (kind == FLUID).then(|| {
            Arc::new(FluidTank {
                capacity: self.capacity,
            }) as Capability
        })
    }

    fn max_render_distance_sq(&self) -> f64 {
        16.0 * 16.0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn pump_tile() -> Box<dyn Tile> {
    Box::new(PumpTile::default())
}

pub fn note_tile(text: &str) -> Box<dyn Tile> {
    Box::new(NoteTile {
        text: text.to_string(),
        ..NoteTile::default()
    })
}

pub fn tank_tile(capacity: u32) -> Box<dyn Tile> {
    Box::new(TankTile { capacity })
}

// ===========================================================================
// Descriptors
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Standard,
    Column,
    Gem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileKind {
    None,
    Pump,
    Note,
    Tank,
}

/// Configurable descriptor used by every test kind.
#[derive(Debug)]
pub struct TestPart {
    name: &'static str,
    shape: Shape,
    ghosts: Vec<Slot>,
    tile: TileKind,
    log: HookLog,
}

impl TestPart {
    fn new(name: &'static str, log: &HookLog) -> Self {
        Self {
            name,
            shape: Shape::Standard,
            ghosts: Vec::new(),
            tile: TileKind::None,
            log: log.clone(),
        }
    }
}

impl PartDescriptor for TestPart {
    fn name(&self) -> &str {
        self.name
    }

    fn occlusion_boxes(&self, placement: &Placement<'_>) -> Vec<Aabb> {
        match self.shape {
            Shape::Standard => vec![standard_box(placement.slot)],
            Shape::Column => vec![Aabb::from_sixteenths([4, 0, 4], [12, 16, 12])],
            Shape::Gem => vec![Aabb::from_sixteenths([7, 7, 7], [9, 9, 9])],
        }
    }

    fn ghost_slots(&self, _placement: &Placement<'_>) -> BTreeSet<Slot> {
        self.ghosts.iter().copied().collect()
    }

    fn create_tile(&self, _slot: Slot, _state: PlacementState) -> Option<Box<dyn Tile>> {
        match self.tile {
            TileKind::None => None,
            TileKind::Pump => Some(pump_tile()),
            TileKind::Note => Some(Box::new(NoteTile::default())),
            TileKind::Tank => Some(tank_tile(100)),
        }
    }

    fn on_added(&self, part: &PartInfo) {
        self.log.record(HookCall::Added { slot: part.slot() });
    }

    fn on_removed(&self, part: &PartInfo) {
        self.log.record(HookCall::Removed { slot: part.slot() });
    }

    fn on_part_added(&self, part: &PartInfo, added: &PartInfo) {
        self.log.record(HookCall::PartAdded {
            observer: part.slot(),
            added: added.slot(),
        });
    }

    fn on_part_removed(&self, part: &PartInfo, removed: &PartInfo) {
        self.log.record(HookCall::PartRemoved {
            observer: part.slot(),
            removed: removed.slot(),
        });
    }
}

/// Builder with every test kind registered, plus the log their hooks write
/// to.
pub fn test_registry_builder() -> (PartRegistryBuilder, HookLog) {
    let log = HookLog::default();
    let kinds: Vec<(PartKindId, TestPart)> = vec![
        (PANEL, TestPart::new("panel", &log)),
        (POST, TestPart::new("post", &log)),
        (
            SIGN,
            TestPart {
                ghosts: vec![Slot::Center],
                ..TestPart::new("sign", &log)
            },
        ),
        (
            PUMP,
            TestPart {
                tile: TileKind::Pump,
                ..TestPart::new("pump", &log)
            },
        ),
        (
            NOTE,
            TestPart {
                tile: TileKind::Note,
                ..TestPart::new("note", &log)
            },
        ),
        (
            BULKY,
            TestPart {
                shape: Shape::Column,
                ..TestPart::new("bulky", &log)
            },
        ),
        (
            GEM,
            TestPart {
                shape: Shape::Gem,
                ..TestPart::new("gem", &log)
            },
        ),
        (
            TANK,
            TestPart {
                tile: TileKind::Tank,
                ..TestPart::new("tank", &log)
            },
        ),
    ];

    let mut builder = PartRegistryBuilder::new();
    for (kind, descriptor) in kinds {
        builder
            .register(kind, Arc::new(descriptor))
            .expect("test kinds are distinct");
    }
    (builder, log)
}

pub fn test_registry() -> (PartRegistry, HookLog) {
    let (builder, log) = test_registry_builder();
    (builder.build(), log)
}

pub fn test_engine() -> (MultipartEngine, HookLog) {
    let (registry, log) = test_registry();
    let mut engine = MultipartEngine::new(registry);
    register_fluid_joiner(engine.joiners_mut());
    (engine, log)
}

/// An authoritative grid with one empty cell.
pub fn authoritative_grid() -> (CellGrid, CellId) {
    let mut grid = CellGrid::new(Side::Authoritative);
    let cell = grid.create_cell();
    (grid, cell)
}

/// A mirrored grid with one empty cell.
pub fn mirrored_grid() -> (CellGrid, CellId) {
    let mut grid = CellGrid::new(Side::Mirrored);
    let cell = grid.create_cell();
    (grid, cell)
}

/// Build a part of `kind` without going through a container.
pub fn part(
    registry: &PartRegistry,
    cell: CellId,
    slot: Slot,
    kind: PartKindId,
    tile: Option<Box<dyn Tile>>,
) -> PartInfo {
    let state = state(kind);
    let descriptor = registry.resolve(state).expect("kind registered");
    PartInfo::new(cell, slot, descriptor, state, tile)
}
