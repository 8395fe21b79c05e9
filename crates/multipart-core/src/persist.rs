//! Persistence of part tables, and binary cell snapshots via `bitcode`.
//!
//! # Part table layout
//!
//! ```text
//! parts:       { "<slot id>": { state: Int, tile?: Compound }, ... }
//! slot_names:  { "<slot id>": "<slot name>", ... }
//! ```
//!
//! Slot ids are only meaningful in the session that wrote them, so every id
//! is written next to its slot name and readers resolve by name first.
//! Entries whose placement state no longer resolves to a descriptor are kept
//! verbatim and written back unchanged on the next save.

use crate::container::MultipartContainer;
use crate::id::{CellId, PlacementState};
use crate::part::PartInfo;
use crate::registry::PartRegistry;
use crate::slot::{Slot, SlotRegistry};
use crate::sync::SyncDelta;
use crate::tag::{TagCompound, TagValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const PARTS_KEY: &str = "parts";
pub const SLOT_NAMES_KEY: &str = "slot_names";
pub const STATE_KEY: &str = "state";
pub const TILE_KEY: &str = "tile";

/// Magic number identifying a serialized cell.
pub const CELL_SNAPSHOT_MAGIC: u32 = 0x4D50_0001;

/// Current cell snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Which tile state a part table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteMode {
    /// Full tile state and unresolved records, for disk.
    Save,
    /// Tile update tags only, for mirrors.
    Update,
}

/// How to rebuild tiles from a part table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadMode {
    /// Load tiles from saved state and keep unresolved records.
    Save,
    /// Create fresh tiles and apply update tags. Unresolved entries are
    /// dropped.
    Update,
}

// ---------------------------------------------------------------------------
// Part tables
// ---------------------------------------------------------------------------

/// Parts and unresolved records read from a part table.
#[derive(Debug, Default)]
pub struct PartTable {
    pub parts: BTreeMap<Slot, PartInfo>,
    pub missing: BTreeMap<Slot, TagCompound>,
}

/// Write parts and unresolved records to a part table.
pub fn write_part_table<'a>(
    parts: impl IntoIterator<Item = &'a PartInfo>,
    missing: &BTreeMap<Slot, TagCompound>,
    slots: &SlotRegistry,
    mode: WriteMode,
) -> TagCompound {
    let mut entries = TagCompound::new();
    let mut names = TagCompound::new();

    for part in parts {
        let Some(id) = slots.id_of(part.slot()) else {
            warn!(slot = %part.slot(), "slot has no id in this session, part not written");
            continue;
        };
        let mut entry = TagCompound::new().with(STATE_KEY, part.state().to_raw() as i32);
        if let Some(tile) = part.tile() {
            let tag = match mode {
                WriteMode::Save => tile.write(),
                WriteMode::Update => tile.update_tag(),
            };
            entry.insert(TILE_KEY, tag);
        }
        entries.insert(id.0.to_string(), entry);
        names.insert(id.0.to_string(), part.slot().name());
    }

    // Unresolved records are echoed in both modes; readers in update mode
    // skip them.
    for (slot, record) in missing {
        let Some(id) = slots.id_of(*slot) else {
            warn!(%slot, "slot has no id in this session, unresolved record not written");
            continue;
        };
        entries.insert(id.0.to_string(), record.clone());
        names.insert(id.0.to_string(), slot.name());
    }

    TagCompound::new()
        .with(PARTS_KEY, entries)
        .with(SLOT_NAMES_KEY, names)
}

/// Rebuild parts for `cell` from a part table.
///
/// Slots resolve by name first, then by id against `slots`; entries whose
/// slot resolves neither way are dropped with a warning. Entries whose state
/// does not resolve to a descriptor are kept as unresolved records in save
/// mode and dropped in update mode.
pub fn read_part_table(
    tag: &TagCompound,
    cell: CellId,
    registry: &PartRegistry,
    slots: &SlotRegistry,
    mode: ReadMode,
) -> PartTable {
    let mut table = PartTable::default();
    let Some(entries) = tag.get_compound(PARTS_KEY) else {
        return table;
    };
    let empty = TagCompound::new();
    let names = tag.get_compound(SLOT_NAMES_KEY).unwrap_or(&empty);

    for (key, value) in entries.iter() {
        let Some(slot) = resolve_slot(key, names, slots) else {
            warn!(key, "unresolvable slot in part table, entry dropped");
            continue;
        };
        let TagValue::Compound(entry) = value else {
            warn!(%slot, "malformed part entry, dropped");
            continue;
        };

        let state = entry
            .get_int(STATE_KEY)
            .map(|raw| PlacementState::from_raw(raw as u32));
        let Some((state, descriptor)) = state.and_then(|s| Some((s, registry.resolve(s)?))) else {
            if mode == ReadMode::Save {
                warn!(%slot, ?state, "part descriptor not registered, keeping record");
                table.missing.insert(slot, entry.clone());
            }
            continue;
        };

        let tile = match (entry.get_compound(TILE_KEY), mode) {
            (Some(tile_tag), ReadMode::Save) => descriptor.load_tile(slot, state, tile_tag),
            (Some(tile_tag), ReadMode::Update) => {
                descriptor.create_tile(slot, state).map(|mut tile| {
                    tile.handle_update_tag(tile_tag);
                    tile
                })
            }
            (None, _) => descriptor.create_tile(slot, state),
        };
        table
            .parts
            .insert(slot, PartInfo::new(cell, slot, descriptor, state, tile));
    }
    table
}

fn resolve_slot(key: &str, names: &TagCompound, slots: &SlotRegistry) -> Option<Slot> {
    if let Some(name) = names.get_str(key) {
        return name.parse::<Slot>().ok();
    }
    let id = key.parse::<u16>().ok()?;
    slots.slot(crate::id::SlotId(id))
}

impl MultipartContainer {
    pub fn write_parts(&self, slots: &SlotRegistry, mode: WriteMode) -> TagCompound {
        write_part_table(self.parts().values(), self.missing_parts(), slots, mode)
    }

    /// Replace this container's parts with those read from `tag`. Save mode
    /// also replaces the unresolved records; update mode leaves them.
    pub fn read_parts(
        &mut self,
        tag: &TagCompound,
        registry: &PartRegistry,
        slots: &SlotRegistry,
        mode: ReadMode,
    ) {
        let table = read_part_table(tag, self.cell(), registry, slots, mode);
        let resident: Vec<Slot> = self.parts().keys().copied().collect();
        for slot in resident {
            self.take(slot);
        }
        for part in table.parts.into_values() {
            self.insert(part);
        }
        if mode == ReadMode::Save {
            self.set_missing_parts(table.missing);
        }
    }
}

// ---------------------------------------------------------------------------
// Binary snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", CELL_SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

/// Header prepended to every cell snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
}

impl SnapshotHeader {
    pub fn new() -> Self {
        Self {
            magic: CELL_SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != CELL_SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CellSnapshot {
    header: SnapshotHeader,
    table: TagCompound,
}

/// Encode a part table as a versioned binary snapshot.
pub fn encode_cell(table: &TagCompound) -> Result<Vec<u8>, SerializeError> {
    let snapshot = CellSnapshot {
        header: SnapshotHeader::new(),
        table: table.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a snapshot produced by [`encode_cell`], checking its header.
pub fn decode_cell(data: &[u8]) -> Result<TagCompound, DeserializeError> {
    let snapshot: CellSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot.table)
}

/// Encode a delta for the wire.
pub fn encode_delta(delta: &SyncDelta) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(delta).map_err(|e| SerializeError::Encode(e.to_string()))
}

pub fn decode_delta(data: &[u8]) -> Result<SyncDelta, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}
