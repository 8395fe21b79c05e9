//! Serde structs for part kind and settings files.
//!
//! These define the on-disk format. They are deserialized from RON, JSON, or
//! TOML and then resolved into descriptors by the loader.

use serde::Deserialize;

// ===========================================================================
// Part kinds
// ===========================================================================

/// One part kind in a `parts` file.
#[derive(Debug, Clone, Deserialize)]
pub struct PartKindData {
    /// Numeric kind id. Ends up in persisted placement states, so it must
    /// stay stable across releases.
    pub kind: u16,
    pub name: String,
    /// Occlusion boxes in 1/16 cell units.
    #[serde(default)]
    pub occlusion: Vec<BoxData>,
    /// Slot names the part claims besides its own.
    #[serde(default)]
    pub ghost_slots: Vec<String>,
    #[serde(default)]
    pub tile: TileKindData,
}

/// An occlusion box, supporting both the short `([x, y, z], [x, y, z])` form
/// and the full form with named corners.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum BoxData {
    Short([i32; 3], [i32; 3]),
    Full { from: [i32; 3], to: [i32; 3] },
}

impl BoxData {
    pub fn corners(self) -> ([i32; 3], [i32; 3]) {
        match self {
            BoxData::Short(from, to) | BoxData::Full { from, to } => (from, to),
        }
    }
}

/// What kind of tile a placed part carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKindData {
    #[default]
    None,
    Static,
    Ticking,
}
