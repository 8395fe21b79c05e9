use crate::container::{ContainerKind, MultipartContainer, can_place};
use crate::descriptor::{PartDescriptor, Placement, Tile};
use crate::id::CellId;
use crate::part::PartInfo;
use crate::slot::Slot;
use crate::sync::{CellEffects, SyncContext};
use crate::tag::TagCompound;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// What a cell holds.
///
/// A lone part without a ticking tile lives directly in the cell. Two or
/// more parts, or any part whose tile ticks, need a container.
#[derive(Debug, Default)]
pub enum Representation {
    #[default]
    Absent,
    Single(PartInfo),
    Container(MultipartContainer),
}

/// Discriminant of a [`Representation`], with the container's tick kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationKind {
    Absent,
    SinglePart,
    Container,
    TickingContainer,
}

impl Representation {
    pub fn kind(&self) -> RepresentationKind {
        match self {
            Representation::Absent => RepresentationKind::Absent,
            Representation::Single(_) => RepresentationKind::SinglePart,
            Representation::Container(c) if c.is_ticking() => RepresentationKind::TickingContainer,
            Representation::Container(_) => RepresentationKind::Container,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Representation::Absent)
    }

    pub fn container(&self) -> Option<&MultipartContainer> {
        match self {
            Representation::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn container_mut(&mut self) -> Option<&mut MultipartContainer> {
        match self {
            Representation::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&PartInfo> {
        match self {
            Representation::Absent => None,
            Representation::Single(part) => (part.slot() == slot).then_some(part),
            Representation::Container(c) => c.get(slot),
        }
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut PartInfo> {
        match self {
            Representation::Absent => None,
            Representation::Single(part) => (part.slot() == slot).then_some(part),
            Representation::Container(c) => c.get_mut(slot),
        }
    }

    /// Every resident part in slot order.
    pub fn parts(&self) -> impl Iterator<Item = &PartInfo> + '_ {
        let (single, many) = match self {
            Representation::Absent => (None, None),
            Representation::Single(part) => (Some(part), None),
            Representation::Container(c) => (None, Some(c.parts().values())),
        };
        single.into_iter().chain(many.into_iter().flatten())
    }

    pub fn len(&self) -> usize {
        match self {
            Representation::Absent => 0,
            Representation::Single(_) => 1,
            Representation::Container(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_parts(&self) -> Option<&BTreeMap<Slot, TagCompound>> {
        self.container().map(MultipartContainer::missing_parts)
    }

    pub fn can_add(&self, descriptor: &dyn PartDescriptor, candidate: &Placement<'_>) -> bool {
        can_place(self.parts(), descriptor, candidate)
    }

    pub fn for_each_tile_mut(&mut self, mut f: impl FnMut(&mut dyn Tile)) {
        match self {
            Representation::Absent => {}
            Representation::Single(part) => {
                if let Some(tile) = part.tile_mut() {
                    f(tile);
                }
            }
            Representation::Container(c) => c.for_each_tile_mut(f),
        }
    }

    // -- Transitions --

    /// Add a part, migrating to whichever representation can hold it.
    ///
    /// A part already in the slot is removed first, hooks and all, and the
    /// cell settles before the new part goes in.
    pub fn add_part(
        self,
        ctx: &SyncContext<'_>,
        part: PartInfo,
        effects: &mut CellEffects,
    ) -> Representation {
        if self.get(part.slot()).is_some() {
            let slot = part.slot();
            debug!(cell = ?part.cell(), %slot, "replacing resident part");
            let (settled, _) = self.remove_part(ctx, slot, effects);
            return settled.add_part(ctx, part, effects);
        }
        match self {
            Representation::Absent if part.is_ticking() => {
                let mut container = MultipartContainer::new(part.cell(), ContainerKind::Ticking);
                container.add_part(ctx, part, effects);
                Representation::Container(container)
            }
            Representation::Absent => Representation::Single(place_single(ctx, part, effects)),
            Representation::Single(existing) => {
                let cell = existing.cell();
                let kind = ContainerKind::for_ticking(existing.is_ticking() || part.is_ticking());
                debug!(?cell, ?kind, "single part migrating to container");
                let mut container = MultipartContainer::new(cell, kind);
                container.insert(existing);
                container.add_after_migration(ctx, part, effects);
                Representation::Container(container)
            }
            Representation::Container(mut container) => {
                container.add_part(ctx, part, effects);
                Representation::Container(container)
            }
        }
    }

    /// Remove the part in `slot` and settle into the representation that
    /// fits what is left.
    pub fn remove_part(
        self,
        ctx: &SyncContext<'_>,
        slot: Slot,
        effects: &mut CellEffects,
    ) -> (Representation, Option<PartInfo>) {
        match self {
            Representation::Absent => (Representation::Absent, None),
            Representation::Single(mut part) if part.slot() == slot => {
                if let Some(tile) = part.tile_mut() {
                    tile.invalidate();
                }
                part.descriptor().on_removed(&part);
                if ctx.is_authoritative() {
                    effects.push_delta(ctx.remove_delta(slot));
                }
                effects.request_refresh(ctx.side);
                (Representation::Absent, Some(part))
            }
            single @ Representation::Single(_) => (single, None),
            Representation::Container(mut container) => {
                match container.remove_part(ctx, slot, effects) {
                    Some(removed) => (container.settle(), Some(removed)),
                    None => (Representation::Container(container), None),
                }
            }
        }
    }

    /// Build the representation for a freshly read part table.
    pub(crate) fn from_table(
        cell: CellId,
        parts: BTreeMap<Slot, PartInfo>,
        missing: BTreeMap<Slot, TagCompound>,
    ) -> Representation {
        let ticking = parts.values().any(PartInfo::is_ticking);
        let mut container = MultipartContainer::new(cell, ContainerKind::for_ticking(ticking));
        for part in parts.into_values() {
            container.insert(part);
        }
        container.set_missing_parts(missing);
        container.settle()
    }
}

fn place_single(ctx: &SyncContext<'_>, mut part: PartInfo, effects: &mut CellEffects) -> PartInfo {
    if let Some(tile) = part.tile_mut() {
        tile.validate();
    }
    if ctx.is_authoritative() {
        part.descriptor().on_added(&part);
        effects.push_delta(ctx.add_delta(&part));
    }
    effects.request_refresh(ctx.side);
    part
}
