use std::fmt;

/// Opaque handle to an entity owned by a [`ComponentManager`](super::ComponentManager).
///
/// The generation makes handles of destroyed entities stale: a slot reused by a
/// new entity never compares equal to the handle of its previous occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the owning manager
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Back references from an owning entity to the entities it spawned.
///
/// Deferred removal of the owner cascades through this list (see
/// [`ComponentManager::flush_removed`](super::ComponentManager::flush_removed)).
#[derive(Debug, Clone, Default)]
pub struct ChildEntitiesComponent(pub Vec<EntityId>);
