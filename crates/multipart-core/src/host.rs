//! The host grid contract and an in-memory implementation.
//!
//! The engine never owns cells. It takes a cell's [`Representation`] out of
//! the host, transforms it, and hands the result back, then reports the
//! visual, lighting, and network side effects through the same trait.

use crate::id::CellId;
use crate::representation::{Representation, RepresentationKind};
use crate::sync::{NotifyLevel, Side, SyncDelta};
use slotmap::SlotMap;
use tracing::trace;

/// Operations the engine needs from whatever stores cells.
pub trait HostGrid {
    fn side(&self) -> Side;

    fn representation(&self, cell: CellId) -> Option<&Representation>;

    fn representation_mut(&mut self, cell: CellId) -> Option<&mut Representation>;

    /// Move the representation out, leaving the cell absent until
    /// [`HostGrid::set_representation`] installs a replacement.
    fn take_representation(&mut self, cell: CellId) -> Result<Representation, HostError>;

    fn set_representation(
        &mut self,
        cell: CellId,
        representation: Representation,
    ) -> Result<(), HostError>;

    fn notify_visual_update(&mut self, cell: CellId, level: NotifyLevel);

    fn recompute_lighting(&mut self, cell: CellId);

    /// Send a delta to every mirror of this cell. Only called on the
    /// authoritative side.
    fn broadcast(&mut self, cell: CellId, delta: SyncDelta);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("cell {0:?} does not exist")]
    UnknownCell(CellId),
    #[error("host refused to replace cell {cell:?}: {reason}")]
    Refused { cell: CellId, reason: String },
}

/// What a [`CellGrid`] recorded, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Replaced {
        cell: CellId,
        kind: RepresentationKind,
    },
    VisualUpdate {
        cell: CellId,
        level: NotifyLevel,
    },
    Relight {
        cell: CellId,
    },
}

// ---------------------------------------------------------------------------
// CellGrid
// ---------------------------------------------------------------------------

/// A host grid backed by a slot map. Records every notification in a
/// journal and every broadcast in an outbox so callers can forward or
/// inspect them.
#[derive(Debug)]
pub struct CellGrid {
    side: Side,
    cells: SlotMap<CellId, Representation>,
    journal: Vec<HostEvent>,
    outbox: Vec<(CellId, SyncDelta)>,
}

impl CellGrid {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            cells: SlotMap::with_key(),
            journal: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn authoritative() -> Self {
        Self::new(Side::Authoritative)
    }

    pub fn mirrored() -> Self {
        Self::new(Side::Mirrored)
    }

    /// Allocate an empty cell.
    pub fn create_cell(&mut self) -> CellId {
        self.cells.insert(Representation::Absent)
    }

    /// Destroy a cell, returning whatever it held.
    pub fn remove_cell(&mut self, cell: CellId) -> Option<Representation> {
        self.cells.remove(cell)
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.cells.contains_key(cell)
    }

    pub fn kind(&self, cell: CellId) -> Option<RepresentationKind> {
        self.cells.get(cell).map(Representation::kind)
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Representation)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn journal(&self) -> &[HostEvent] {
        &self.journal
    }

    pub fn drain_journal(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.journal)
    }

    pub fn outbox(&self) -> &[(CellId, SyncDelta)] {
        &self.outbox
    }

    pub fn drain_outbox(&mut self) -> Vec<(CellId, SyncDelta)> {
        std::mem::take(&mut self.outbox)
    }
}

impl HostGrid for CellGrid {
    fn side(&self) -> Side {
        self.side
    }

    fn representation(&self, cell: CellId) -> Option<&Representation> {
        self.cells.get(cell)
    }

    fn representation_mut(&mut self, cell: CellId) -> Option<&mut Representation> {
        self.cells.get_mut(cell)
    }

    fn take_representation(&mut self, cell: CellId) -> Result<Representation, HostError> {
        self.cells
            .get_mut(cell)
            .map(std::mem::take)
            .ok_or(HostError::UnknownCell(cell))
    }

    fn set_representation(
        &mut self,
        cell: CellId,
        representation: Representation,
    ) -> Result<(), HostError> {
        let slot = self
            .cells
            .get_mut(cell)
            .ok_or(HostError::UnknownCell(cell))?;
        let kind = representation.kind();
        *slot = representation;
        trace!(?cell, ?kind, "representation installed");
        self.journal.push(HostEvent::Replaced { cell, kind });
        Ok(())
    }

    fn notify_visual_update(&mut self, cell: CellId, level: NotifyLevel) {
        self.journal.push(HostEvent::VisualUpdate { cell, level });
    }

    fn recompute_lighting(&mut self, cell: CellId) {
        self.journal.push(HostEvent::Relight { cell });
    }

    fn broadcast(&mut self, cell: CellId, delta: SyncDelta) {
        self.outbox.push((cell, delta));
    }
}
