//! The engine: every cell-level multipart operation, run against a
//! [`HostGrid`].
//!
//! Each mutation follows the same pipeline:
//!
//! 1. **Resolve** -- map the placement state to a descriptor, failing fast.
//! 2. **Take** -- move the cell's representation out of the host.
//! 3. **Transform** -- add or remove, migrating between representations and
//!    buffering notifications into a [`CellEffects`].
//! 4. **Install** -- hand the new representation back to the host.
//! 5. **Flush** -- deliver visual, lighting, and sync effects to the host.

use crate::capability::{Capability, CapabilityJoiners, CapabilityKind};
use crate::config::{AddPolicy, MultipartConfig};
use crate::descriptor::{Mirror, PartDescriptor, Placement, Rotation, Tile};
use crate::host::{HostError, HostGrid};
use crate::id::{CellId, PlacementState, SlotId};
use crate::part::PartInfo;
use crate::persist::{ReadMode, WriteMode, read_part_table, write_part_table};
use crate::registry::PartRegistry;
use crate::representation::{Representation, RepresentationKind};
use crate::slot::{Face, Slot, SlotRegistry};
use crate::sync::{CellEffects, Side, SyncContext, SyncDelta};
use crate::tag::TagCompound;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("placement state {0:?} has no registered part descriptor")]
    UnresolvedState(PlacementState),
    #[error("part at {slot} conflicts with a resident part")]
    Rejected { slot: Slot },
    #[error("slot {slot} is already occupied")]
    Occupied { slot: Slot },
    #[error("slot id {0:?} is not known to this session")]
    UnknownSlotId(SlotId),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Registries and settings shared by every cell.
#[derive(Debug)]
pub struct MultipartEngine {
    parts: PartRegistry,
    slots: SlotRegistry,
    joiners: CapabilityJoiners,
    config: MultipartConfig,
}

impl MultipartEngine {
    pub fn new(parts: PartRegistry) -> Self {
        Self {
            parts,
            slots: SlotRegistry::with_builtin_slots(),
            joiners: CapabilityJoiners::new(),
            config: MultipartConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MultipartConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `slots` for slot ids. Built-in slots it lacks are appended so
    /// every slot has an id.
    pub fn with_slot_registry(mut self, mut slots: SlotRegistry) -> Self {
        for slot in Slot::all() {
            slots.register(slot);
        }
        self.slots = slots;
        self
    }

    pub fn parts(&self) -> &PartRegistry {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut PartRegistry {
        &mut self.parts
    }

    pub fn slots(&self) -> &SlotRegistry {
        &self.slots
    }

    pub fn joiners(&self) -> &CapabilityJoiners {
        &self.joiners
    }

    pub fn joiners_mut(&mut self) -> &mut CapabilityJoiners {
        &mut self.joiners
    }

    pub fn config(&self) -> &MultipartConfig {
        &self.config
    }

    fn ctx(&self, side: Side) -> SyncContext<'_> {
        SyncContext {
            side,
            slots: &self.slots,
            config: &self.config,
        }
    }

    pub fn resolve(&self, state: PlacementState) -> Result<Arc<dyn PartDescriptor>, MultipartError> {
        self.parts
            .resolve(state)
            .ok_or(MultipartError::UnresolvedState(state))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn kind<H: HostGrid + ?Sized>(&self, host: &H, cell: CellId) -> Option<RepresentationKind> {
        host.representation(cell).map(Representation::kind)
    }

    /// The part in `slot`, whatever the cell's representation.
    pub fn get<'h, H: HostGrid + ?Sized>(
        &self,
        host: &'h H,
        cell: CellId,
        slot: Slot,
    ) -> Option<&'h PartInfo> {
        host.representation(cell)?.get(slot)
    }

    pub fn get_mut<'h, H: HostGrid + ?Sized>(
        &self,
        host: &'h mut H,
        cell: CellId,
        slot: Slot,
    ) -> Option<&'h mut PartInfo> {
        host.representation_mut(cell)?.get_mut(slot)
    }

    /// Whether a part of `state` could go into `slot` without claiming an
    /// occupied slot or overlapping a resident's boxes.
    pub fn can_add_part<H: HostGrid + ?Sized>(
        &self,
        host: &H,
        cell: CellId,
        slot: Slot,
        state: PlacementState,
        tile: Option<&dyn Tile>,
    ) -> Result<bool, MultipartError> {
        let descriptor = self.resolve(state)?;
        let representation = host
            .representation(cell)
            .ok_or(HostError::UnknownCell(cell))?;
        Ok(representation.can_add(descriptor.as_ref(), &Placement::new(slot, state, tile)))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add a part to a cell, migrating its representation as needed.
    ///
    /// With [`AddPolicy::Trust`] the caller is expected to have checked
    /// [`MultipartEngine::can_add_part`]; with [`AddPolicy::Validate`] a
    /// conflicting part is rejected.
    pub fn add_part<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        slot: Slot,
        state: PlacementState,
        tile: Option<Box<dyn Tile>>,
    ) -> Result<(), MultipartError> {
        let descriptor = self.resolve(state)?;
        let representation = host
            .representation(cell)
            .ok_or(HostError::UnknownCell(cell))?;
        if representation.get(slot).is_some() {
            debug!(?cell, %slot, "slot occupied");
            return Err(MultipartError::Occupied { slot });
        }
        if self.config.add_policy == AddPolicy::Validate {
            let placement = Placement::new(slot, state, tile.as_deref());
            if !representation.can_add(descriptor.as_ref(), &placement) {
                debug!(?cell, %slot, "placement rejected");
                return Err(MultipartError::Rejected { slot });
            }
        }
        let part = PartInfo::new(cell, slot, descriptor, state, tile);
        self.insert_part(host, cell, part)
    }

    /// Add a part whose tile, if any, comes from its descriptor.
    pub fn place_part<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        slot: Slot,
        state: PlacementState,
    ) -> Result<(), MultipartError> {
        let tile = self.resolve(state)?.create_tile(slot, state);
        self.add_part(host, cell, slot, state, tile)
    }

    fn insert_part<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        part: PartInfo,
    ) -> Result<(), MultipartError> {
        self.mutate(host, cell, |representation, ctx, effects| {
            (representation.add_part(ctx, part, effects), ())
        })
    }

    /// Remove the part in `slot`. Returns `None` and leaves the cell alone if
    /// the slot is empty.
    pub fn remove_part<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        slot: Slot,
    ) -> Result<Option<PartInfo>, MultipartError> {
        let representation = host
            .representation(cell)
            .ok_or(HostError::UnknownCell(cell))?;
        if representation.get(slot).is_none() {
            return Ok(None);
        }
        self.mutate(host, cell, |representation, ctx, effects| {
            representation.remove_part(ctx, slot, effects)
        })
    }

    /// Take the representation out, transform it, put the result back, and
    /// flush the buffered effects.
    fn mutate<H, R, F>(&self, host: &mut H, cell: CellId, f: F) -> Result<R, MultipartError>
    where
        H: HostGrid + ?Sized,
        F: FnOnce(Representation, &SyncContext<'_>, &mut CellEffects) -> (Representation, R),
    {
        let ctx = self.ctx(host.side());
        let current = host.take_representation(cell)?;
        let mut effects = CellEffects::new();
        let (next, out) = f(current, &ctx, &mut effects);
        host.set_representation(cell, next)?;
        effects.flush(host, cell);
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Ticking and tile lifecycle
    // -----------------------------------------------------------------------

    /// Tick a cell. Ticking containers whose tiles no longer tick are
    /// demoted instead. Returns how many tiles ticked.
    pub fn tick<H: HostGrid + ?Sized>(&self, host: &mut H, cell: CellId) -> Result<usize, MultipartError> {
        let representation = host
            .representation_mut(cell)
            .ok_or(HostError::UnknownCell(cell))?;
        let Representation::Container(container) = representation else {
            return Ok(0);
        };
        if !container.is_ticking() {
            return Ok(0);
        }
        if container.has_ticking_parts() {
            return Ok(container.tick());
        }

        debug!(?cell, "no ticking tiles left, demoting container");
        self.mutate(host, cell, |representation, _ctx, effects| {
            let next = match representation {
                Representation::Container(container) => container.settle(),
                other => other,
            };
            effects.request_relight();
            (next, 0)
        })
    }

    pub fn on_load<H: HostGrid + ?Sized>(&self, host: &mut H, cell: CellId) -> Result<(), MultipartError> {
        self.for_each_tile(host, cell, |tile| tile.on_load())
    }

    pub fn on_unload<H: HostGrid + ?Sized>(&self, host: &mut H, cell: CellId) -> Result<(), MultipartError> {
        self.for_each_tile(host, cell, |tile| tile.on_unload())
    }

    pub fn validate<H: HostGrid + ?Sized>(&self, host: &mut H, cell: CellId) -> Result<(), MultipartError> {
        self.for_each_tile(host, cell, |tile| tile.validate())
    }

    pub fn invalidate<H: HostGrid + ?Sized>(&self, host: &mut H, cell: CellId) -> Result<(), MultipartError> {
        self.for_each_tile(host, cell, |tile| tile.invalidate())
    }

    pub fn rotate<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        rotation: Rotation,
    ) -> Result<(), MultipartError> {
        self.for_each_tile(host, cell, |tile| tile.rotate(rotation))
    }

    pub fn mirror<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        mirror: Mirror,
    ) -> Result<(), MultipartError> {
        self.for_each_tile(host, cell, |tile| tile.mirror(mirror))
    }

    fn for_each_tile<H, F>(&self, host: &mut H, cell: CellId, f: F) -> Result<(), MultipartError>
    where
        H: HostGrid + ?Sized,
        F: FnMut(&mut dyn Tile),
    {
        host.representation_mut(cell)
            .ok_or(HostError::UnknownCell(cell))?
            .for_each_tile_mut(f);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------------

    pub fn has_capability<H: HostGrid + ?Sized>(
        &self,
        host: &H,
        cell: CellId,
        kind: CapabilityKind,
        face: Option<Face>,
    ) -> bool {
        match host.representation(cell) {
            None | Some(Representation::Absent) => false,
            Some(Representation::Single(part)) => part
                .tile()
                .is_some_and(|tile| tile.has_capability(kind, face)),
            Some(Representation::Container(container)) => container.has_capability(kind, face),
        }
    }

    pub fn capability<H: HostGrid + ?Sized>(
        &self,
        host: &H,
        cell: CellId,
        kind: CapabilityKind,
        face: Option<Face>,
    ) -> Option<Capability> {
        match host.representation(cell)? {
            Representation::Absent => None,
            Representation::Single(part) => {
                let tile = part.tile()?;
                if tile.has_capability(kind, face) {
                    tile.capability(kind, face)
                } else {
                    None
                }
            }
            Representation::Container(container) => container.capability(&self.joiners, kind, face),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence and sync
    // -----------------------------------------------------------------------

    /// Write a cell's part table.
    pub fn write_cell<H: HostGrid + ?Sized>(
        &self,
        host: &H,
        cell: CellId,
        mode: WriteMode,
    ) -> Result<TagCompound, MultipartError> {
        let representation = host
            .representation(cell)
            .ok_or(HostError::UnknownCell(cell))?;
        let empty = BTreeMap::new();
        let missing = representation.missing_parts().unwrap_or(&empty);
        Ok(write_part_table(representation.parts(), missing, &self.slots, mode))
    }

    /// Replace a cell's contents with a part table.
    pub fn read_cell<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        tag: &TagCompound,
        mode: ReadMode,
    ) -> Result<(), MultipartError> {
        let table = read_part_table(tag, cell, &self.parts, &self.slots, mode);
        let mut next = Representation::from_table(cell, table.parts, table.missing);
        next.for_each_tile_mut(|tile| tile.validate());
        self.mutate(host, cell, |mut previous, ctx, effects| {
            previous.for_each_tile_mut(|tile| tile.invalidate());
            if mode == ReadMode::Update {
                effects.request_refresh(ctx.side);
            }
            (next, ())
        })
    }

    /// The delta that brings a fresh mirror of `cell` up to date.
    pub fn initial_sync<H: HostGrid + ?Sized>(
        &self,
        host: &H,
        cell: CellId,
    ) -> Result<SyncDelta, MultipartError> {
        Ok(SyncDelta::FullResync {
            table: self.write_cell(host, cell, WriteMode::Update)?,
        })
    }

    /// Replay a delta received from the authoritative side.
    pub fn apply_delta<H: HostGrid + ?Sized>(
        &self,
        host: &mut H,
        cell: CellId,
        delta: &SyncDelta,
    ) -> Result<(), MultipartError> {
        match delta {
            SyncDelta::Add { slot, state, tile } => {
                let slot = self
                    .slots
                    .slot(*slot)
                    .ok_or(MultipartError::UnknownSlotId(*slot))?;
                let state = PlacementState::from_raw(*state);
                let descriptor = self.resolve(state)?;
                let tile = descriptor.create_tile(slot, state).map(|mut created| {
                    if let Some(tag) = tile {
                        created.handle_update_tag(tag);
                    }
                    created
                });
                if self.get(host, cell, slot).is_some() {
                    debug!(?cell, %slot, "add delta for occupied slot, replacing");
                    self.remove_part(host, cell, slot)?;
                }
                self.insert_part(host, cell, PartInfo::new(cell, slot, descriptor, state, tile))
            }
            SyncDelta::Remove { slot } => {
                let slot = self
                    .slots
                    .slot(*slot)
                    .ok_or(MultipartError::UnknownSlotId(*slot))?;
                self.remove_part(host, cell, slot).map(|_| ())
            }
            SyncDelta::FullResync { table } => self.read_cell(host, cell, table, ReadMode::Update),
        }
    }
}
