use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a cell in a host grid. Parts hold this instead of a
    /// pointer to their container so a migrated container never keeps a
    /// stale one alive.
    pub struct CellId;
}

/// Session-local integer id of a slot, assigned by a
/// [`SlotRegistry`](crate::slot::SlotRegistry). Only meaningful within the
/// registry that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u16);

/// Identifies a part kind (one descriptor) in the part registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartKindId(pub u16);

/// Static placement state of a part: which kind it is and which variant of
/// that kind (orientation, color, ...). Encodes to a single integer for
/// persistence and network deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlacementState {
    pub kind: PartKindId,
    pub variant: u16,
}

impl PlacementState {
    pub fn new(kind: PartKindId, variant: u16) -> Self {
        Self { kind, variant }
    }

    /// The default variant of a kind.
    pub fn of(kind: PartKindId) -> Self {
        Self::new(kind, 0)
    }

    /// Pack into the integer form used on disk and on the wire.
    pub fn to_raw(self) -> u32 {
        (u32::from(self.kind.0) << 16) | u32::from(self.variant)
    }

    pub fn from_raw(raw: u32) -> Self {
        Self {
            kind: PartKindId((raw >> 16) as u16),
            variant: (raw & 0xFFFF) as u16,
        }
    }
}
