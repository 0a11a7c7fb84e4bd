//! Component registration and capability bits.
//!
//! Each component store registered in a scene is assigned the next free bit
//! of a 64-bit mask. The bit is the store's identity for tags and queries and
//! is never reassigned while the scene lives.

use std::{
    any::{TypeId, type_name},
    fmt,
    marker::PhantomData,
};

use rustc_hash::FxHashMap;

use crate::{
    error::{SceneError, SceneResult},
    tag::TagBits,
};

/// Maximum number of component stores in one scene (width of [`TagBits`]).
pub const MAX_COMPONENTS: usize = u64::BITS as usize;

/// Index of a component store within its scene.
///
/// The capability bit is `1 << index`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u8);

impl ComponentId {
    /// Create a component ID from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_COMPONENTS`].
    #[must_use]
    pub const fn from_raw(index: u8) -> Self {
        assert!((index as usize) < MAX_COMPONENTS, "component index out of range");
        Self(index)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn as_raw(self) -> u8 {
        self.0
    }

    /// Get the index as a `usize`, for indexing store lists.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The single capability bit of this component.
    #[must_use]
    pub const fn bit(self) -> TagBits {
        TagBits::from_raw(1 << self.0)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

/// Typed handle to a component store holding payloads of type `T`.
///
/// Handles are plain ids and can be copied freely. The payload type is fixed
/// when the store is registered, so reads and writes through the handle are
/// type checked at the call site.
pub struct Component<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Component<T> {
    pub(crate) const fn new(id: ComponentId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Get the component ID.
    #[must_use]
    pub const fn id(self) -> ComponentId {
        self.id
    }

    /// The capability bit of this component.
    #[must_use]
    pub const fn bit(self) -> TagBits {
        self.id.bit()
    }
}

impl<T> Clone for Component<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Component<T> {}

impl<T> PartialEq for Component<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Component<T> {}

impl<T> From<Component<T>> for ComponentId {
    fn from(component: Component<T>) -> Self {
        component.id
    }
}

impl<T> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component<{}>({})", type_name::<T>(), self.id.0)
    }
}

/// Runtime information about a registered component store.
#[derive(Clone)]
pub struct ComponentInfo {
    /// Unique ID for this store.
    id: ComponentId,
    /// Name the store was registered under.
    name: String,
    /// Payload type name for debugging.
    type_name: &'static str,
    /// Rust TypeId for type checking.
    type_id: TypeId,
}

impl ComponentInfo {
    /// Create component info for a payload type.
    #[must_use]
    pub fn of<T: 'static>(id: ComponentId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Get the component ID.
    #[must_use]
    pub const fn id(&self) -> ComponentId {
        self.id
    }

    /// Get the capability bit.
    #[must_use]
    pub const fn bit(&self) -> TagBits {
        self.id.bit()
    }

    /// Get the registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the payload type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check if this store holds payloads of type `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Registry of the component stores of one scene.
///
/// Assigns bits sequentially and maps store names to IDs.
pub struct ComponentRegistry {
    /// Component info indexed by ComponentId.
    infos: Vec<ComponentInfo>,
    /// Map from registered name to ComponentId.
    by_name: FxHashMap<String, ComponentId>,
    /// Maximum number of stores, at most [`MAX_COMPONENTS`].
    capacity: usize,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Create a new empty registry with room for [`MAX_COMPONENTS`] stores.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_COMPONENTS)
    }

    /// Create a registry that refuses registrations past `capacity`.
    ///
    /// Capacities above [`MAX_COMPONENTS`] are clamped.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_COMPONENTS);
        Self {
            infos: Vec::with_capacity(capacity),
            by_name: FxHashMap::default(),
            capacity,
        }
    }

    /// Register a store and return its ID.
    ///
    /// Nothing is written if the registry is full or the name is taken.
    pub fn register<T: 'static>(&mut self, name: &str) -> SceneResult<ComponentId> {
        if self.infos.len() >= self.capacity {
            return Err(SceneError::ComponentCapacity {
                name: name.to_string(),
                max: self.capacity,
            });
        }
        if self.by_name.contains_key(name) {
            return Err(SceneError::DuplicateComponent(name.to_string()));
        }

        // Capacity is at most 64, so the index fits.
        let id = ComponentId::from_raw(self.infos.len() as u8);
        self.infos.push(ComponentInfo::of::<T>(id, name));
        self.by_name.insert(name.to_string(), id);

        Ok(id)
    }

    /// Get the component ID registered under `name`.
    #[must_use]
    pub fn get_id(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// Get component info by ID.
    #[must_use]
    pub fn get_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Mask with the bit of every registered store set.
    #[must_use]
    pub fn registered_bits(&self) -> TagBits {
        self.infos
            .iter()
            .fold(TagBits::EMPTY, |bits, info| bits | info.bit())
    }

    /// Get the number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Get the maximum number of stores.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over all registered component infos, in bit order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("count", &self.len())
            .field("components", &self.infos)
            .finish()
    }
}
