//! The multipart container: the parts of one cell keyed by slot, plus the
//! opaque records of parts whose descriptors are not registered.
//!
//! # Ticking
//!
//! A container is either [`ContainerKind::Plain`] or
//! [`ContainerKind::Ticking`]. Only ticking containers receive ticks. Adding
//! a part whose tile ticks to a plain container promotes it first; settling
//! a ticking container with no ticking tiles left demotes it. Promotion
//! builds a new container and moves every part into it, re-stamping each
//! part's cell id.
//!
//! # Sync suppression
//!
//! [`MultipartContainer::suppress_sync`] returns a guard that turns off
//! per-part deltas until it is dropped. Migrations use it to add the
//! triggering part quietly and follow up with a single full resync.

use crate::capability::{Capability, CapabilityJoiners, CapabilityKind, ContainerCapability, view_parts};
use crate::descriptor::{PartDescriptor, Placement, Tile};
use crate::id::CellId;
use crate::occlusion::boxes_intersect;
use crate::part::PartInfo;
use crate::persist::WriteMode;
use crate::representation::Representation;
use crate::slot::{Face, Slot};
use crate::sync::{CellEffects, SyncContext, SyncDelta};
use crate::tag::TagCompound;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Plain,
    Ticking,
}

impl ContainerKind {
    pub fn for_ticking(ticking: bool) -> Self {
        if ticking {
            ContainerKind::Ticking
        } else {
            ContainerKind::Plain
        }
    }
}

// ---------------------------------------------------------------------------
// Placement check
// ---------------------------------------------------------------------------

/// Whether a candidate placement fits among `residents`.
///
/// Fails if the candidate's primary or ghost slots include a resident's
/// primary slot, if any resident's ghost slots include one of the
/// candidate's slots, or if any candidate box overlaps any resident box.
pub fn can_place<'a>(
    residents: impl IntoIterator<Item = &'a PartInfo>,
    descriptor: &dyn PartDescriptor,
    candidate: &Placement<'_>,
) -> bool {
    let mut claimed = descriptor.ghost_slots(candidate);
    claimed.insert(candidate.slot);

    let mut resident_boxes = Vec::new();
    for resident in residents {
        if claimed.contains(&resident.slot()) {
            trace!(slot = %resident.slot(), "placement blocked by resident slot");
            return false;
        }
        if resident.ghost_slots().iter().any(|s| claimed.contains(s)) {
            trace!(resident = %resident.slot(), "placement blocked by resident ghost slot");
            return false;
        }
        resident_boxes.extend(resident.occlusion_boxes());
    }

    let candidate_boxes = descriptor.occlusion_boxes(candidate);
    !boxes_intersect(&candidate_boxes, &resident_boxes)
}

// ---------------------------------------------------------------------------
// MultipartContainer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MultipartContainer {
    cell: CellId,
    kind: ContainerKind,
    parts: BTreeMap<Slot, PartInfo>,
    missing_parts: BTreeMap<Slot, TagCompound>,
    sync_enabled: bool,
    attached: BTreeMap<CapabilityKind, Capability>,
}

impl MultipartContainer {
    pub fn new(cell: CellId, kind: ContainerKind) -> Self {
        Self {
            cell,
            kind,
            parts: BTreeMap::new(),
            missing_parts: BTreeMap::new(),
            sync_enabled: true,
            attached: BTreeMap::new(),
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn is_ticking(&self) -> bool {
        self.kind == ContainerKind::Ticking
    }

    pub fn get(&self, slot: Slot) -> Option<&PartInfo> {
        self.parts.get(&slot)
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut PartInfo> {
        self.parts.get_mut(&slot)
    }

    /// Read-only view of the resident parts in slot order.
    pub fn parts(&self) -> &BTreeMap<Slot, PartInfo> {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn missing_parts(&self) -> &BTreeMap<Slot, TagCompound> {
        &self.missing_parts
    }

    pub(crate) fn set_missing_parts(&mut self, missing: BTreeMap<Slot, TagCompound>) {
        self.missing_parts = missing;
    }

    pub fn has_ticking_parts(&self) -> bool {
        self.parts.values().any(PartInfo::is_ticking)
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Turn off per-part deltas until the returned guard drops.
    pub fn suppress_sync(&mut self) -> SyncSuppressed<'_> {
        let previous = self.sync_enabled;
        self.sync_enabled = false;
        SyncSuppressed {
            container: self,
            previous,
        }
    }

    /// Attach a capability to the cell itself. Answers queries none of the
    /// parts answer.
    pub fn attach_capability(&mut self, kind: CapabilityKind, capability: Capability) {
        self.attached.insert(kind, capability);
    }

    pub fn can_add(&self, descriptor: &dyn PartDescriptor, candidate: &Placement<'_>) -> bool {
        can_place(self.parts.values(), descriptor, candidate)
    }

    /// Put a part into its slot without hooks or notifications, returning
    /// any part it displaced.
    pub fn insert(&mut self, mut part: PartInfo) -> Option<PartInfo> {
        part.set_cell(self.cell);
        self.parts.insert(part.slot(), part)
    }

    /// Take a part out of its slot without hooks or notifications.
    pub fn take(&mut self, slot: Slot) -> Option<PartInfo> {
        self.parts.remove(&slot)
    }

    /// Move every part, missing record, and attached capability into
    /// `target`. Parts are re-stamped with the target's cell.
    pub fn copy_to(self, target: &mut MultipartContainer) {
        for part in self.parts.into_values() {
            target.insert(part);
        }
        target.missing_parts.extend(self.missing_parts);
        target.attached.extend(self.attached);
    }

    /// Rebuild as `kind`, keeping everything else.
    pub fn migrate(self, kind: ContainerKind) -> MultipartContainer {
        if self.kind == kind {
            return self;
        }
        debug!(cell = ?self.cell, from = ?self.kind, to = ?kind, "container migrating");
        let mut next = MultipartContainer::new(self.cell, kind);
        next.sync_enabled = self.sync_enabled;
        self.copy_to(&mut next);
        next
    }

    // -- Mutation --

    /// Add a part, promoting to a ticking container first if its tile ticks
    /// and this container does not.
    pub fn add_part(&mut self, ctx: &SyncContext<'_>, part: PartInfo, effects: &mut CellEffects) {
        if part.is_ticking() && !self.is_ticking() {
            let cell = self.cell;
            let plain = std::mem::replace(self, MultipartContainer::new(cell, ContainerKind::Ticking));
            debug!(?cell, slot = %part.slot(), "promoting container to ticking");
            self.sync_enabled = plain.sync_enabled;
            plain.copy_to(self);
            self.add_after_migration(ctx, part, effects);
            return;
        }
        self.insert_and_notify(ctx, part, effects);
    }

    /// Add the part that triggered a migration. With full resyncs enabled
    /// the add is quiet and the whole table follows; otherwise mirrors get
    /// the ordinary add delta and migrate on their own.
    pub(crate) fn add_after_migration(
        &mut self,
        ctx: &SyncContext<'_>,
        part: PartInfo,
        effects: &mut CellEffects,
    ) {
        if !ctx.config.broadcast_full_resync_on_migration {
            self.insert_and_notify(ctx, part, effects);
            return;
        }
        self.suppress_sync().insert_and_notify(ctx, part, effects);
        if ctx.is_authoritative() && self.sync_enabled {
            effects.push_delta(Some(SyncDelta::FullResync {
                table: self.write_parts(ctx.slots, WriteMode::Update),
            }));
        }
    }

    fn insert_and_notify(&mut self, ctx: &SyncContext<'_>, mut part: PartInfo, effects: &mut CellEffects) {
        let slot = part.slot();
        if let Some(tile) = part.tile_mut() {
            tile.validate();
        }
        self.missing_parts.remove(&slot);
        if self.parts.contains_key(&slot) {
            debug!(cell = ?self.cell, %slot, "replacing resident part");
            self.remove_part(ctx, slot, effects);
        }
        self.insert(part);
        let Some(added) = self.parts.get(&slot) else {
            return;
        };

        if ctx.is_authoritative() {
            added.descriptor().on_added(added);
            for (other_slot, other) in &self.parts {
                if *other_slot != slot {
                    other.descriptor().on_part_added(other, added);
                }
            }
            if self.sync_enabled {
                effects.push_delta(ctx.add_delta(added));
            }
        }
        effects.request_refresh(ctx.side);
    }

    /// Take the part in `slot` out, run removal hooks, and record the
    /// notifications. The caller settles the representation afterwards.
    pub fn remove_part(
        &mut self,
        ctx: &SyncContext<'_>,
        slot: Slot,
        effects: &mut CellEffects,
    ) -> Option<PartInfo> {
        let mut departing = self.take(slot)?;
        if let Some(tile) = departing.tile_mut() {
            tile.invalidate();
        }

        departing.descriptor().on_removed(&departing);
        for other in self.parts.values() {
            other.descriptor().on_part_removed(other, &departing);
        }
        if ctx.is_authoritative() && self.sync_enabled {
            effects.push_delta(ctx.remove_delta(slot));
        }
        effects.request_refresh(ctx.side);
        Some(departing)
    }

    /// Pick the representation this container should be replaced with.
    ///
    /// No parts and no missing records: absent. One non-ticking part and no
    /// missing records: a single part. Otherwise a container whose kind
    /// matches whether any tile still ticks.
    pub fn settle(self) -> Representation {
        let ticking = self.has_ticking_parts();
        if self.missing_parts.is_empty() {
            match self.parts.len() {
                0 => {
                    debug!(cell = ?self.cell, "container emptied");
                    return Representation::Absent;
                }
                1 if !ticking => {
                    if let Some(mut last) = self.parts.into_values().next() {
                        debug!(cell = ?last.cell(), slot = %last.slot(), "container collapsed to single part");
                        if let Some(tile) = last.tile_mut() {
                            tile.validate();
                        }
                        return Representation::Single(last);
                    }
                    return Representation::Absent;
                }
                _ => {}
            }
        }
        Representation::Container(self.migrate(ContainerKind::for_ticking(ticking)))
    }

    // -- Ticking and tile lifecycle --

    /// Tick every tile that currently wants it. Plain containers never tick.
    pub fn tick(&mut self) -> usize {
        if !self.is_ticking() {
            return 0;
        }
        let mut ticked = 0;
        for part in self.parts.values_mut() {
            if let Some(tile) = part.tile_mut() {
                if tile.is_tickable() {
                    tile.tick();
                    ticked += 1;
                }
            }
        }
        ticked
    }

    pub fn for_each_tile_mut(&mut self, mut f: impl FnMut(&mut dyn Tile)) {
        for part in self.parts.values_mut() {
            if let Some(tile) = part.tile_mut() {
                f(tile);
            }
        }
    }

    // -- Capabilities --

    pub fn has_capability(&self, kind: CapabilityKind, face: Option<Face>) -> bool {
        if kind == CapabilityKind::CONTAINER {
            return true;
        }
        let providers = view_parts(&self.parts, face, true, |part| {
            part.tile()
                .filter(|tile| tile.has_capability(kind, face))
                .map(|_| ())
        });
        !providers.is_empty() || self.attached.contains_key(&kind)
    }

    /// Answer a capability query through `face`, joining several providers
    /// when a joiner is registered, and falling back to capabilities
    /// attached to the cell.
    pub fn capability(
        &self,
        joiners: &CapabilityJoiners,
        kind: CapabilityKind,
        face: Option<Face>,
    ) -> Option<Capability> {
        if kind == CapabilityKind::CONTAINER {
            return Some(Arc::new(ContainerCapability { cell: self.cell }));
        }
        let providers = view_parts(&self.parts, face, true, |part| {
            let tile = part.tile()?;
            if tile.has_capability(kind, face) {
                tile.capability(kind, face)
            } else {
                None
            }
        });
        joiners
            .join(kind, providers)
            .or_else(|| self.attached.get(&kind).cloned())
    }
}

// ---------------------------------------------------------------------------
// Sync suppression guard
// ---------------------------------------------------------------------------

/// Restores the container's previous sync setting when dropped.
pub struct SyncSuppressed<'a> {
    container: &'a mut MultipartContainer,
    previous: bool,
}

impl Deref for SyncSuppressed<'_> {
    type Target = MultipartContainer;

    fn deref(&self) -> &MultipartContainer {
        self.container
    }
}

impl DerefMut for SyncSuppressed<'_> {
    fn deref_mut(&mut self) -> &mut MultipartContainer {
        self.container
    }
}

impl Drop for SyncSuppressed<'_> {
    fn drop(&mut self) {
        self.container.sync_enabled = self.previous;
    }
}
