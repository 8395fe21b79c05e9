//! Slots: the attachment points inside a cell, and the registry that gives
//! them compact session-local integer ids.
//!
//! A cell has 27 slots: six faces, the center, twelve edges, and eight
//! corners. Every slot has a stable textual name (`face_up`, `center`,
//! `edge_down_north`, `corner_up_south_east`). Names are the value identity
//! used when persisted data is re-resolved in a later session; integer ids
//! are only valid within the [`SlotRegistry`] that assigned them.

use crate::id::SlotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Face / Edge / Corner
// ---------------------------------------------------------------------------

/// One of the six faces of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    pub fn all() -> [Face; 6] {
        [
            Face::Down,
            Face::Up,
            Face::North,
            Face::South,
            Face::West,
            Face::East,
        ]
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::Down => Face::Up,
            Face::Up => Face::Down,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::East => Face::West,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Face::Down => "down",
            Face::Up => "up",
            Face::North => "north",
            Face::South => "south",
            Face::West => "west",
            Face::East => "east",
        }
    }
}

/// One of the twelve edges of a cell, named by the two faces it joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Edge {
    DownNorth,
    DownSouth,
    DownWest,
    DownEast,
    UpNorth,
    UpSouth,
    UpWest,
    UpEast,
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Edge {
    pub fn all() -> [Edge; 12] {
        [
            Edge::DownNorth,
            Edge::DownSouth,
            Edge::DownWest,
            Edge::DownEast,
            Edge::UpNorth,
            Edge::UpSouth,
            Edge::UpWest,
            Edge::UpEast,
            Edge::NorthWest,
            Edge::NorthEast,
            Edge::SouthWest,
            Edge::SouthEast,
        ]
    }

    /// The two faces this edge joins.
    pub fn faces(self) -> (Face, Face) {
        match self {
            Edge::DownNorth => (Face::Down, Face::North),
            Edge::DownSouth => (Face::Down, Face::South),
            Edge::DownWest => (Face::Down, Face::West),
            Edge::DownEast => (Face::Down, Face::East),
            Edge::UpNorth => (Face::Up, Face::North),
            Edge::UpSouth => (Face::Up, Face::South),
            Edge::UpWest => (Face::Up, Face::West),
            Edge::UpEast => (Face::Up, Face::East),
            Edge::NorthWest => (Face::North, Face::West),
            Edge::NorthEast => (Face::North, Face::East),
            Edge::SouthWest => (Face::South, Face::West),
            Edge::SouthEast => (Face::South, Face::East),
        }
    }

    pub fn touches(self, face: Face) -> bool {
        let (a, b) = self.faces();
        a == face || b == face
    }
}

/// One of the eight corners of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Corner {
    DownNorthWest,
    DownNorthEast,
    DownSouthWest,
    DownSouthEast,
    UpNorthWest,
    UpNorthEast,
    UpSouthWest,
    UpSouthEast,
}

impl Corner {
    pub fn all() -> [Corner; 8] {
        [
            Corner::DownNorthWest,
            Corner::DownNorthEast,
            Corner::DownSouthWest,
            Corner::DownSouthEast,
            Corner::UpNorthWest,
            Corner::UpNorthEast,
            Corner::UpSouthWest,
            Corner::UpSouthEast,
        ]
    }

    /// The three faces meeting at this corner.
    pub fn faces(self) -> [Face; 3] {
        match self {
            Corner::DownNorthWest => [Face::Down, Face::North, Face::West],
            Corner::DownNorthEast => [Face::Down, Face::North, Face::East],
            Corner::DownSouthWest => [Face::Down, Face::South, Face::West],
            Corner::DownSouthEast => [Face::Down, Face::South, Face::East],
            Corner::UpNorthWest => [Face::Up, Face::North, Face::West],
            Corner::UpNorthEast => [Face::Up, Face::North, Face::East],
            Corner::UpSouthWest => [Face::Up, Face::South, Face::West],
            Corner::UpSouthEast => [Face::Up, Face::South, Face::East],
        }
    }

    pub fn touches(self, face: Face) -> bool {
        self.faces().contains(&face)
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// An attachment point within a cell. Totally ordered so container maps
/// iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Slot {
    Face(Face),
    Center,
    Edge(Edge),
    Corner(Corner),
}

impl Slot {
    pub const UP: Slot = Slot::Face(Face::Up);
    pub const DOWN: Slot = Slot::Face(Face::Down);
    pub const NORTH: Slot = Slot::Face(Face::North);
    pub const SOUTH: Slot = Slot::Face(Face::South);
    pub const WEST: Slot = Slot::Face(Face::West);
    pub const EAST: Slot = Slot::Face(Face::East);

    /// All 27 slots in canonical order.
    pub fn all() -> Vec<Slot> {
        let mut slots = Vec::with_capacity(27);
        slots.extend(Face::all().into_iter().map(Slot::Face));
        slots.push(Slot::Center);
        slots.extend(Edge::all().into_iter().map(Slot::Edge));
        slots.extend(Corner::all().into_iter().map(Slot::Corner));
        slots
    }

    /// Edge and corner slots that border the given face.
    pub fn bordering(face: Face) -> impl Iterator<Item = Slot> {
        let edges = Edge::all()
            .into_iter()
            .filter(move |e| e.touches(face))
            .map(Slot::Edge);
        let corners = Corner::all()
            .into_iter()
            .filter(move |c| c.touches(face))
            .map(Slot::Corner);
        edges.chain(corners)
    }

    /// Stable textual name of this slot.
    pub fn name(self) -> String {
        match self {
            Slot::Face(f) => format!("face_{}", f.name()),
            Slot::Center => "center".to_string(),
            Slot::Edge(e) => {
                let (a, b) = e.faces();
                format!("edge_{}_{}", a.name(), b.name())
            }
            Slot::Corner(c) => {
                let [a, b, d] = c.faces();
                format!("corner_{}_{}_{}", a.name(), b.name(), d.name())
            }
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Error parsing a slot name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown slot name '{0}'")]
pub struct UnknownSlotName(pub String);

impl FromStr for Slot {
    type Err = UnknownSlotName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::all()
            .into_iter()
            .find(|slot| slot.name() == s)
            .ok_or_else(|| UnknownSlotName(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// SlotRegistry
// ---------------------------------------------------------------------------

/// Bidirectional mapping between slots and dense integer ids.
///
/// Ids are assigned on first registration and stay stable for the lifetime of
/// the registry. They are not content-addressed: two registries may assign
/// different ids to the same slot, so persisted data carries slot names
/// alongside the ids.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
    by_id: Vec<Slot>,
    by_slot: BTreeMap<Slot, SlotId>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with all 27 built-in slots registered in canonical order.
    pub fn with_builtin_slots() -> Self {
        let mut registry = Self::new();
        for slot in Slot::all() {
            registry.register(slot);
        }
        registry
    }

    /// Register a slot, returning its id. Registering the same slot twice
    /// returns the id from the first registration.
    pub fn register(&mut self, slot: Slot) -> SlotId {
        if let Some(&id) = self.by_slot.get(&slot) {
            return id;
        }
        let id = SlotId(self.by_id.len() as u16);
        self.by_id.push(slot);
        self.by_slot.insert(slot, id);
        id
    }

    pub fn id_of(&self, slot: Slot) -> Option<SlotId> {
        self.by_slot.get(&slot).copied()
    }

    pub fn slot(&self, id: SlotId) -> Option<Slot> {
        self.by_id.get(id.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
