//! Query engine - resolve entities by id or by capability tag.
//!
//! A query returns one [`QueryResult`] per matched entity. Each result
//! borrows the scene and carries the payload of every component attached to
//! the entity, so systems can branch on which stores populated the result.
//!
//! # Basic Usage
//!
//! ```ignore
//! let drawable = scene.tag("drawable").unwrap();
//!
//! for row in scene.query(&drawable) {
//!     let Some(shape) = row.get(shapes) else { continue };
//!     if let Some(label) = row.get(labels) {
//!         draw_text(shape, label);
//!     }
//! }
//! ```
//!
//! Results are never cached. Attachments change between frames, so each
//! call walks the registry again.

use std::{any::Any, fmt};

use smallvec::SmallVec;

use crate::{
    component::{Component, ComponentId},
    entity::{Entity, EntityId, EntityRegistry},
    store::ErasedStore,
    tag::{Tag, TagBits},
};

/// What a query selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    /// A single entity by id. Matches zero or one entity.
    Entity(EntityId),
    /// Every entity whose tag is a superset of these bits.
    Tag(TagBits),
}

impl Selector {
    /// Select entities having every capability of every given tag.
    ///
    /// The tags' bits are OR-ed into one effective mask.
    #[must_use]
    pub fn all_of<'t>(tags: impl IntoIterator<Item = &'t Tag>) -> Self {
        let bits = tags
            .into_iter()
            .fold(TagBits::EMPTY, |bits, tag| bits | tag.bits());
        Self::Tag(bits)
    }

    /// Check if an entity is selected.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        match *self {
            Self::Entity(id) => entity.id() == id,
            Self::Tag(bits) => entity.tag().contains(bits),
        }
    }
}

impl From<EntityId> for Selector {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<&Tag> for Selector {
    fn from(tag: &Tag) -> Self {
        Self::Tag(tag.bits())
    }
}

impl From<Tag> for Selector {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag.bits())
    }
}

impl From<TagBits> for Selector {
    fn from(bits: TagBits) -> Self {
        Self::Tag(bits)
    }
}

impl<T> From<Component<T>> for Selector {
    fn from(component: Component<T>) -> Self {
        Self::Tag(component.bit())
    }
}

/// One matched entity with the payloads of its attached components.
pub struct QueryResult<'s> {
    entity: &'s Entity,
    components: SmallVec<[(ComponentId, &'s dyn Any); 8]>,
}

impl<'s> QueryResult<'s> {
    /// Collect the payloads of every store whose bit is set on `entity`.
    pub(crate) fn collect(entity: &'s Entity, stores: &'s [Box<dyn ErasedStore>]) -> Self {
        let tag = entity.tag();
        let components = stores
            .iter()
            .filter(|store| tag.contains(store.info().bit()))
            .filter_map(|store| {
                let value = store.get_any(entity.id())?;
                Some((store.info().id(), value))
            })
            .collect();

        Self { entity, components }
    }

    /// Get the matched entity.
    #[must_use]
    pub const fn entity(&self) -> &'s Entity {
        self.entity
    }

    /// Get the matched entity's id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.entity.id()
    }

    /// Get this entity's payload for `component`, if it is attached.
    #[must_use]
    pub fn get<T: 'static>(&self, component: Component<T>) -> Option<&'s T> {
        self.components
            .iter()
            .find(|(id, _)| *id == component.id())
            .and_then(|&(_, value)| value.downcast_ref::<T>())
    }

    /// Check if the result carries a payload for this component.
    #[must_use]
    pub fn has(&self, id: ComponentId) -> bool {
        self.components.iter().any(|(c, _)| *c == id)
    }

    /// Iterate over the components present in this result, in bit order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.iter().map(|(id, _)| *id)
    }

    /// Get the number of payloads in this result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the entity had no components attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for QueryResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("entity", self.entity)
            .field("components", &self.component_ids().collect::<Vec<_>>())
            .finish()
    }
}

/// Run `selector` against the registry.
///
/// The component mapping of each result is driven by the entity's own tag,
/// not the selector: a query for `drawable` still reports every other
/// payload the entity carries.
pub(crate) fn run<'s>(
    selector: Selector,
    entities: &'s EntityRegistry,
    stores: &'s [Box<dyn ErasedStore>],
) -> Vec<QueryResult<'s>> {
    match selector {
        Selector::Entity(id) => entities
            .get(id)
            .map(|entity| QueryResult::collect(entity, stores))
            .into_iter()
            .collect(),
        Selector::Tag(bits) => entities
            .iter()
            .filter(|entity| entity.tag().contains(bits))
            .map(|entity| QueryResult::collect(entity, stores))
            .collect(),
    }
}

/// Ids matched by `selector`, in registry order.
pub(crate) fn run_ids(selector: Selector, entities: &EntityRegistry) -> Vec<EntityId> {
    match selector {
        Selector::Entity(id) => entities.get(id).map(Entity::id).into_iter().collect(),
        Selector::Tag(_) => entities
            .iter()
            .filter(|entity| selector.matches(entity))
            .map(Entity::id)
            .collect(),
    }
}
