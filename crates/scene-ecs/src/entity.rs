//! Entity identifiers and the entity registry.
//!
//! An entity is an [`EntityId`] plus the [`TagBits`] of the components
//! currently attached to it. Payloads are not stored here; they live in the
//! component stores, keyed by id.
//!
//! Auto-assigned ids come from a counter that only moves forward. The counter
//! is also pushed past every explicitly registered id, so an automatic id can
//! never land on an id a caller picked, and a removed id is never handed out
//! again by the allocator.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::tag::TagBits;

/// Opaque entity handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an entity ID from a raw value.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live entity: its id and accumulated capability tag.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    id: EntityId,
    tag: TagBits,
}

impl Entity {
    const fn new(id: EntityId) -> Self {
        Self {
            id,
            tag: TagBits::EMPTY,
        }
    }

    /// Get the entity's id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Get the OR of the bits of every attached component.
    #[must_use]
    pub const fn tag(&self) -> TagBits {
        self.tag
    }

    pub(crate) const fn set_bits(&mut self, bits: TagBits) {
        self.tag.insert(bits);
    }

    pub(crate) const fn clear_bits(&mut self, bits: TagBits) {
        self.tag.remove(bits);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, {:#b})", self.id.0, self.tag.as_raw())
    }
}

/// Owns entity identities and their tags.
///
/// Entities are kept in a dense list for ordered iteration plus an index
/// from id to position. Removal swaps the last entity into the hole, so
/// iteration order is not stable across removals.
pub struct EntityRegistry {
    /// Live entities in registry order.
    entities: Vec<Entity>,
    /// Map from id to position in `entities`.
    index: FxHashMap<EntityId, usize>,
    /// Next candidate for an automatic id. `None` once `u64::MAX` is taken.
    next_id: Option<u64>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    /// Create a new registry. Automatic ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0, 1)
    }

    /// Create a registry with pre-allocated capacity and a custom first id.
    #[must_use]
    pub fn with_capacity(capacity: usize, first_id: u64) -> Self {
        Self {
            entities: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            next_id: Some(first_id),
        }
    }

    /// Register a new entity under the next unused automatic id.
    ///
    /// Returns `None` once every id up to `u64::MAX` has been handed out.
    pub fn allocate(&mut self) -> Option<EntityId> {
        // `insert` keeps the counter past every registered id; scan anyway.
        loop {
            let id = EntityId(self.next_id?);
            self.next_id = id.0.checked_add(1);
            if !self.index.contains_key(&id) {
                self.push(id);
                return Some(id);
            }
        }
    }

    /// Register an entity under an explicit id.
    ///
    /// Returns `false` and changes nothing if the id is already in use; the
    /// caller must remove the old entity (and detach its payloads) first.
    pub fn insert(&mut self, id: EntityId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.next_id = match (self.next_id, id.0.checked_add(1)) {
            (Some(next), Some(past)) => Some(next.max(past)),
            _ => None,
        };
        self.push(id);
        true
    }

    fn push(&mut self, id: EntityId) {
        self.index.insert(id, self.entities.len());
        self.entities.push(Entity::new(id));
    }

    /// Remove an entity, returning it if it was registered.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let row = self.index.remove(&id)?;
        let removed = self.entities.swap_remove(row);

        // Update the swapped entity's position
        if let Some(swapped) = self.entities.get(row) {
            self.index.insert(swapped.id, row);
        }

        Some(removed)
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&row| &self.entities[row])
    }

    /// Look up an entity by id, mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let row = *self.index.get(&id)?;
        self.entities.get_mut(row)
    }

    /// Check if an entity is registered.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Get the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over entities in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Snapshot of all live ids in registry order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(Entity::id).collect()
    }

    /// The id the next call to [`allocate`](Self::allocate) will try first,
    /// or `None` if automatic ids are exhausted.
    #[must_use]
    pub const fn next_id(&self) -> Option<u64> {
        self.next_id
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("count", &self.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
