//! Capability (service) delegation from a cell to the tiles of its parts.
//!
//! A capability query names a [`CapabilityKind`] and optionally the face it is
//! asked through. Tiles answer individually; when several parts of one cell
//! provide the same capability, a per-kind join function registered in
//! [`CapabilityJoiners`] synthesizes one answer from all of them.

use crate::id::CellId;
use crate::part::PartInfo;
use crate::slot::{Face, Slot};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Identifies a kind of capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityKind(pub u32);

impl CapabilityKind {
    /// The container's own identity. Answered by the container itself, never
    /// delegated to parts.
    pub const CONTAINER: CapabilityKind = CapabilityKind(0);
}

/// A capability instance handed out by a tile.
pub type Capability = Arc<dyn Any + Send + Sync>;

/// Joins several providers of one capability kind into a single answer.
pub type JoinFn = Box<dyn Fn(Vec<Capability>) -> Option<Capability> + Send + Sync>;

/// What a [`CapabilityKind::CONTAINER`] query returns: a handle to the cell
/// holding the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerCapability {
    pub cell: CellId,
}

// ---------------------------------------------------------------------------
// CapabilityJoiners
// ---------------------------------------------------------------------------

/// Registry of join strategies, one per capability kind.
#[derive(Default)]
pub struct CapabilityJoiners {
    joiners: BTreeMap<CapabilityKind, JoinFn>,
}

impl fmt::Debug for CapabilityJoiners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityJoiners")
            .field("kinds", &self.joiners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityJoiners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an untyped join function. Replaces any previous joiner for
    /// the same kind.
    pub fn register(&mut self, kind: CapabilityKind, join: JoinFn) {
        self.joiners.insert(kind, join);
    }

    /// Register a join function over concrete capability values of type `T`.
    /// Providers whose value is not a `T` are ignored.
    pub fn register_typed<T, F>(&mut self, kind: CapabilityKind, join: F)
    where
        T: Any + Send + Sync,
        F: Fn(Vec<Arc<T>>) -> T + Send + Sync + 'static,
    {
        self.register(
            kind,
            Box::new(move |providers: Vec<Capability>| {
                let typed: Vec<Arc<T>> = providers
                    .into_iter()
                    .filter_map(|p| p.downcast::<T>().ok())
                    .collect();
                if typed.is_empty() {
                    return None;
                }
                Some(Arc::new(join(typed)) as Capability)
            }),
        );
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.joiners.contains_key(&kind)
    }

    /// Reduce the providers to one capability. A single provider is returned
    /// as is; several are joined, or yield nothing if no joiner is registered.
    pub fn join(&self, kind: CapabilityKind, mut providers: Vec<Capability>) -> Option<Capability> {
        match providers.len() {
            0 => None,
            1 => providers.pop(),
            n => match self.joiners.get(&kind) {
                Some(join) => {
                    trace!(?kind, providers = n, "joining capability providers");
                    join(providers)
                }
                None => {
                    trace!(?kind, providers = n, "no joiner registered, ignoring providers");
                    None
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Face-aware part view
// ---------------------------------------------------------------------------

/// Collect a value from the parts visible through `face`.
///
/// With a face, the part in that face slot wins outright if it yields a
/// value. Otherwise the edge and corner slots bordering the face (and the
/// center slot if `include_center`) are collected in slot order. Without a
/// face every resident part is collected.
pub fn view_parts<'a, T, F>(
    parts: &'a BTreeMap<Slot, PartInfo>,
    face: Option<Face>,
    include_center: bool,
    mut f: F,
) -> Vec<T>
where
    F: FnMut(&'a PartInfo) -> Option<T>,
{
    let Some(face) = face else {
        return parts.values().filter_map(f).collect();
    };

    if let Some(value) = parts.get(&Slot::Face(face)).and_then(&mut f) {
        return vec![value];
    }

    let mut result: Vec<T> = Slot::bordering(face)
        .filter_map(|slot| parts.get(&slot))
        .filter_map(&mut f)
        .collect();
    if include_center {
        if let Some(value) = parts.get(&Slot::Center).and_then(&mut f) {
            result.push(value);
        }
    }
    result
}
