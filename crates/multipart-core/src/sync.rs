//! Authoritative/mirrored synchronization.
//!
//! Mutations never call the host directly. They record what they need into a
//! [`CellEffects`] buffer (visual update level, relight, outgoing deltas),
//! and the engine flushes the buffer after the new representation is
//! installed. Mirrors receive [`SyncDelta`]s and replay them locally.

use crate::config::MultipartConfig;
use crate::host::HostGrid;
use crate::id::{CellId, SlotId};
use crate::part::PartInfo;
use crate::slot::{Slot, SlotRegistry};
use crate::tag::TagCompound;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which copy of the world a host grid is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Owns the state. Runs hooks and broadcasts changes.
    Authoritative,
    /// Replays deltas. Never runs hooks or broadcasts.
    Mirrored,
}

/// How much of a visual refresh a cell needs. Ordered so the stronger level
/// wins when several are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Re-render only.
    RenderOnly,
    /// Re-render and notify neighbors.
    Full,
}

/// An incremental change sent from the authoritative side to mirrors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncDelta {
    Add {
        slot: SlotId,
        state: u32,
        tile: Option<TagCompound>,
    },
    Remove {
        slot: SlotId,
    },
    /// The full part table in update form.
    FullResync {
        table: TagCompound,
    },
}

/// Everything a mutation needs to know about where it runs.
#[derive(Debug, Clone, Copy)]
pub struct SyncContext<'a> {
    pub side: Side,
    pub slots: &'a SlotRegistry,
    pub config: &'a MultipartConfig,
}

impl SyncContext<'_> {
    pub fn is_authoritative(&self) -> bool {
        self.side == Side::Authoritative
    }

    pub fn add_delta(&self, part: &PartInfo) -> Option<SyncDelta> {
        let slot = self.slot_id(part.slot())?;
        Some(SyncDelta::Add {
            slot,
            state: part.state().to_raw(),
            tile: part.tile().map(|t| t.update_tag()),
        })
    }

    pub fn remove_delta(&self, slot: Slot) -> Option<SyncDelta> {
        Some(SyncDelta::Remove {
            slot: self.slot_id(slot)?,
        })
    }

    fn slot_id(&self, slot: Slot) -> Option<SlotId> {
        let id = self.slots.id_of(slot);
        if id.is_none() {
            warn!(%slot, "slot has no id in this session, delta dropped");
        }
        id
    }
}

/// Host notifications buffered during one mutation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CellEffects {
    pub visual: Option<NotifyLevel>,
    pub relight: bool,
    pub deltas: Vec<SyncDelta>,
}

impl CellEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_visual(&mut self, level: NotifyLevel) {
        self.visual = Some(self.visual.map_or(level, |current| current.max(level)));
    }

    pub fn request_relight(&mut self) {
        self.relight = true;
    }

    pub fn push_delta(&mut self, delta: Option<SyncDelta>) {
        self.deltas.extend(delta);
    }

    /// The usual pair after a part came or went: Full on the authoritative
    /// side, RenderOnly on a mirror, plus a relight.
    pub fn request_refresh(&mut self, side: Side) {
        self.request_visual(match side {
            Side::Authoritative => NotifyLevel::Full,
            Side::Mirrored => NotifyLevel::RenderOnly,
        });
        self.request_relight();
    }

    pub fn is_empty(&self) -> bool {
        self.visual.is_none() && !self.relight && self.deltas.is_empty()
    }

    /// Deliver to the host: visual update, then lighting, then deltas in
    /// the order they were recorded.
    pub fn flush<H: HostGrid + ?Sized>(self, host: &mut H, cell: CellId) {
        if let Some(level) = self.visual {
            host.notify_visual_update(cell, level);
        }
        if self.relight {
            host.recompute_lighting(cell);
        }
        for delta in self.deltas {
            host.broadcast(cell, delta);
        }
    }
}
