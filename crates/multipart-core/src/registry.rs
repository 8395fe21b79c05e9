use crate::descriptor::PartDescriptor;
use crate::id::{PartKindId, PlacementState};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Builder for a [`PartRegistry`].
///
/// Kind ids end up in persisted placement states, so callers that need data
/// to survive a restart register with explicit ids. [`PartRegistryBuilder::register_next`]
/// is for content whose ids are assigned fresh every session.
#[derive(Debug, Default)]
pub struct PartRegistryBuilder {
    descriptors: BTreeMap<PartKindId, Arc<dyn PartDescriptor>>,
    name_to_id: BTreeMap<String, PartKindId>,
}

impl PartRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under an explicit kind id.
    pub fn register(
        &mut self,
        kind: PartKindId,
        descriptor: Arc<dyn PartDescriptor>,
    ) -> Result<PartKindId, RegistryError> {
        if self.descriptors.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        let name = descriptor.name().to_string();
        if self.name_to_id.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.name_to_id.insert(name, kind);
        self.descriptors.insert(kind, descriptor);
        Ok(kind)
    }

    /// Register a descriptor under the lowest unused kind id.
    pub fn register_next(
        &mut self,
        descriptor: Arc<dyn PartDescriptor>,
    ) -> Result<PartKindId, RegistryError> {
        let mut next = 0u16;
        for id in self.descriptors.keys() {
            if id.0 != next {
                break;
            }
            next = next.checked_add(1).ok_or(RegistryError::Exhausted)?;
        }
        self.register(PartKindId(next), descriptor)
    }

    pub fn kind_id(&self, name: &str) -> Option<PartKindId> {
        self.name_to_id.get(name).copied()
    }

    pub fn build(self) -> PartRegistry {
        debug!(kinds = self.descriptors.len(), "part registry built");
        PartRegistry {
            descriptors: self.descriptors,
            name_to_id: self.name_to_id,
        }
    }
}

/// Maps placement states to part descriptors.
#[derive(Debug, Default, Clone)]
pub struct PartRegistry {
    descriptors: BTreeMap<PartKindId, Arc<dyn PartDescriptor>>,
    name_to_id: BTreeMap<String, PartKindId>,
}

impl PartRegistry {
    /// The descriptor for a placement state, if its kind is registered.
    pub fn resolve(&self, state: PlacementState) -> Option<Arc<dyn PartDescriptor>> {
        self.descriptors.get(&state.kind).cloned()
    }

    pub fn get(&self, kind: PartKindId) -> Option<&Arc<dyn PartDescriptor>> {
        self.descriptors.get(&kind)
    }

    pub fn kind_id(&self, name: &str) -> Option<PartKindId> {
        self.name_to_id.get(name).copied()
    }

    /// Drop a kind. Placement states of that kind stop resolving; persisted
    /// parts of it are kept opaque on the next load.
    pub fn unregister(&mut self, kind: PartKindId) -> Option<Arc<dyn PartDescriptor>> {
        let descriptor = self.descriptors.remove(&kind)?;
        self.name_to_id.remove(descriptor.name());
        Some(descriptor)
    }

    /// Reopen for further registration.
    pub fn into_builder(self) -> PartRegistryBuilder {
        PartRegistryBuilder {
            descriptors: self.descriptors,
            name_to_id: self.name_to_id,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = PartKindId> + '_ {
        self.descriptors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("part kind {0:?} is already registered")]
    DuplicateKind(PartKindId),
    #[error("part name '{0}' is already registered")]
    DuplicateName(String),
    #[error("no part kind ids left")]
    Exhausted,
}
