//! Component stores - per-capability maps from entity to payload.
//!
//! Each store holds payloads of a single type, keyed by [`EntityId`]. The
//! scene keeps its stores behind the [`ErasedStore`] trait so it can detach
//! an entity from every store without knowing the payload types.

use std::{any::Any, fmt};

use rustc_hash::FxHashMap;

use crate::{component::ComponentInfo, entity::EntityId};

/// Cleanup hook run with the entity and its payload when a payload is detached.
pub type Destructor<T> = Box<dyn FnMut(EntityId, T)>;

/// A store of payloads of one type.
pub struct ComponentStore<T> {
    /// Component metadata.
    info: ComponentInfo,
    /// Payload per entity.
    data: FxHashMap<EntityId, T>,
    /// Optional cleanup hook.
    destructor: Option<Destructor<T>>,
}

impl<T: 'static> ComponentStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new(info: ComponentInfo) -> Self {
        debug_assert!(info.is::<T>(), "Type mismatch in ComponentStore::new");
        Self {
            info,
            data: FxHashMap::default(),
            destructor: None,
        }
    }

    /// Get the component info.
    #[must_use]
    pub const fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Insert or overwrite the payload for `entity`.
    ///
    /// Returns the payload that was replaced. The destructor does not run
    /// for a replaced payload; the caller gets it back instead.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        self.data.insert(entity, value)
    }

    /// Remove the payload for `entity`, running the destructor if one is set.
    ///
    /// Returns `true` if a payload was present.
    pub fn detach(&mut self, entity: EntityId) -> bool {
        let Some(value) = self.data.remove(&entity) else {
            return false;
        };
        if let Some(destructor) = self.destructor.as_mut() {
            destructor(entity, value);
        }
        true
    }

    /// Get the payload for `entity`.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.data.get(&entity)
    }

    /// Get a mutable reference to the payload for `entity`.
    #[must_use]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.data.get_mut(&entity)
    }

    /// Set the cleanup hook, replacing any previous one.
    pub fn set_destructor(&mut self, destructor: Destructor<T>) {
        self.destructor = Some(destructor);
    }

    /// Iterate over `(entity, payload)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.data.iter().map(|(&id, value)| (id, value))
    }
}

impl<T> fmt::Debug for ComponentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("info", &self.info)
            .field("len", &self.data.len())
            .field("has_destructor", &self.destructor.is_some())
            .finish()
    }
}

/// Type-erased access to a [`ComponentStore`].
pub trait ErasedStore {
    /// Get the component info.
    fn info(&self) -> &ComponentInfo;

    /// Check if the store holds a payload for `entity`.
    fn contains(&self, entity: EntityId) -> bool;

    /// Remove the payload for `entity`, running the destructor.
    ///
    /// Returns `true` if a payload was present.
    fn detach(&mut self, entity: EntityId) -> bool;

    /// Get the payload for `entity` as `&dyn Any`.
    fn get_any(&self, entity: EntityId) -> Option<&dyn Any>;

    /// Get the number of payloads stored.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedStore for ComponentStore<T> {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.data.contains_key(&entity)
    }

    fn detach(&mut self, entity: EntityId) -> bool {
        Self::detach(self, entity)
    }

    fn get_any(&self, entity: EntityId) -> Option<&dyn Any> {
        self.data.get(&entity).map(|value| value as &dyn Any)
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
