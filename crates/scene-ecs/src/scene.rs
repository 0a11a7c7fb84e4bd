//! Scene - the container for all entity, component, tag and system state.
//!
//! A scene owns the entity registry, the component stores, the named tag
//! cache and the system list. It is the only handle systems get: every query
//! and every structural change goes through it, so there is no ambient
//! "current scene".
//!
//! One scene lives per document or UI root and is dropped with it.

use std::{any::type_name, fmt};

use crate::{
    command::{Command, CommandBuffer},
    component::{Component, ComponentId, ComponentInfo, ComponentRegistry},
    config::SceneConfig,
    entity::{Entity, EntityId, EntityRegistry},
    error::{SceneError, SceneResult},
    query::{self, QueryResult, Selector},
    store::{ComponentStore, ErasedStore},
    system::{Scheduler, System},
    tag::{Tag, TagBits, TagInput, TagRegistry},
};

/// The entity-component runtime for one document or UI root.
pub struct Scene {
    /// Entity ids and tags.
    entities: EntityRegistry,
    /// Component names, bits and payload types.
    components: ComponentRegistry,
    /// Payload stores, indexed by ComponentId.
    stores: Vec<Box<dyn ErasedStore>>,
    /// Named query tags.
    tags: TagRegistry,
    /// Systems in run order.
    scheduler: Scheduler,
    /// Structural changes queued by systems.
    commands: CommandBuffer,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create an empty scene with the given options.
    #[must_use]
    pub fn with_config(config: SceneConfig) -> Self {
        let components = ComponentRegistry::with_capacity(config.component_capacity);
        Self {
            entities: EntityRegistry::with_capacity(
                config.entity_capacity,
                config.first_entity_id,
            ),
            stores: Vec::with_capacity(components.capacity()),
            components,
            tags: TagRegistry::new(),
            scheduler: Scheduler::new(),
            commands: CommandBuffer::new(),
        }
    }

    /// Remove every entity, running destructors, then drop the scene.
    pub fn destroy(mut self) {
        let removed = self.clear();
        tracing::debug!("Destroyed scene ({removed} entities removed)");
    }

    /// Remove every entity, running destructors. Components, tags and
    /// systems stay registered.
    ///
    /// Returns the number of entities removed.
    pub fn clear(&mut self) -> usize {
        let ids = self.entities.ids();
        for &id in &ids {
            self.despawn(id);
        }
        ids.len()
    }

    // ==================== Component Operations ====================

    /// Register a component store for payloads of type `T`.
    ///
    /// # Panics
    ///
    /// Panics if the scene is out of capability bits or `name` is taken.
    /// Both are setup bugs; use [`try_register`](Self::try_register) to
    /// handle them.
    pub fn register<T: 'static>(&mut self, name: &str) -> Component<T> {
        match self.try_register(name) {
            Ok(component) => component,
            Err(err) => panic!("{err}"),
        }
    }

    /// Register a component store, reporting configuration errors.
    pub fn try_register<T: 'static>(&mut self, name: &str) -> SceneResult<Component<T>> {
        let id = self.components.register::<T>(name)?;
        let info = self
            .components
            .get_info(id)
            .cloned()
            .ok_or(SceneError::UnknownComponent(id))?;

        debug_assert_eq!(self.stores.len(), id.index());
        self.stores.push(Box::new(ComponentStore::<T>::new(info)));

        tracing::debug!("Registered component '{name}' as bit {}", id.as_raw());
        Ok(Component::new(id))
    }

    /// Look up a component handle by name.
    ///
    /// Returns `None` if no store has this name or it holds another type.
    #[must_use]
    pub fn component<T: 'static>(&self, name: &str) -> Option<Component<T>> {
        let id = self.components.get_id(name)?;
        let info = self.components.get_info(id)?;
        info.is::<T>().then(|| Component::new(id))
    }

    /// Look up a component id by name.
    #[must_use]
    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.components.get_id(name)
    }

    /// Get the component registry.
    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Set the cleanup hook run when a payload of `component` is detached,
    /// either directly or because its entity was removed.
    pub fn set_destructor<T: 'static>(
        &mut self,
        component: Component<T>,
        destructor: impl FnMut(EntityId, T) + 'static,
    ) -> SceneResult<()> {
        let store = typed_store_mut(&mut self.stores, component)?;
        store.set_destructor(Box::new(destructor));
        Ok(())
    }

    /// Number of entities with a payload in `component`.
    #[must_use]
    pub fn component_len(&self, component: impl Into<ComponentId>) -> usize {
        self.stores
            .get(component.into().index())
            .map_or(0, |store| store.len())
    }

    // ==================== Tag Operations ====================

    /// Build a tag from components, tags and names, and cache it by name.
    ///
    /// # Panics
    ///
    /// Panics if any input is not a component or tag of this scene. Use
    /// [`try_build_tag`](Self::try_build_tag) to handle the error.
    pub fn build_tag(&mut self, name: &str, inputs: &[TagInput<'_>]) -> Tag {
        match self.try_build_tag(name, inputs) {
            Ok(tag) => tag,
            Err(err) => panic!("{err}"),
        }
    }

    /// Build a tag, reporting invalid inputs.
    ///
    /// Every input is resolved before the cache is touched, so a failed
    /// build leaves any previous tag of the same name in place.
    pub fn try_build_tag(&mut self, name: &str, inputs: &[TagInput<'_>]) -> SceneResult<Tag> {
        let registered = self.components.registered_bits();
        let mut bits = TagBits::EMPTY;
        for &input in inputs {
            bits |= self.resolve_tag_input(name, input, registered)?;
        }

        let tag = Tag::new(name, bits);
        if self.tags.insert(tag.clone()).is_some() {
            tracing::debug!("Rebuilt tag '{name}' as {bits:?}");
        } else {
            tracing::debug!("Built tag '{name}' as {bits:?}");
        }
        Ok(tag)
    }

    fn resolve_tag_input(
        &self,
        tag: &str,
        input: TagInput<'_>,
        registered: TagBits,
    ) -> SceneResult<TagBits> {
        let invalid = |reason: String| SceneError::InvalidTagInput {
            tag: tag.to_string(),
            reason,
        };

        match input {
            TagInput::Component(id) => self
                .components
                .get_info(id)
                .map(ComponentInfo::bit)
                .ok_or_else(|| invalid(format!("{id:?} is not registered"))),
            TagInput::Tag(bits) => {
                if registered.contains(bits) {
                    Ok(bits)
                } else {
                    Err(invalid(format!(
                        "bits {bits:#b} include unregistered components"
                    )))
                }
            }
            TagInput::Name(name) => self
                .tags
                .get(name)
                .map(Tag::bits)
                .or_else(|| self.components.get_id(name).map(ComponentId::bit))
                .ok_or_else(|| invalid(format!("unknown name '{name}'"))),
        }
    }

    /// Look up a cached tag by name.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<Tag> {
        self.tags.get(name).cloned()
    }

    /// Drop a cached tag.
    pub fn remove_tag(&mut self, name: &str) -> Option<Tag> {
        self.tags.remove(name)
    }

    /// Get the tag cache.
    #[must_use]
    pub const fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    // ==================== Entity Operations ====================

    /// Create an entity under the next automatic id.
    ///
    /// # Panics
    ///
    /// Panics once automatic ids are exhausted, which only happens after an
    /// explicit id or `first_entity_id` near `u64::MAX`. Use
    /// [`try_spawn`](Self::try_spawn) to handle it.
    pub fn spawn(&mut self) -> EntityId {
        match self.try_spawn() {
            Ok(id) => id,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create an entity under the next automatic id, reporting exhaustion.
    pub fn try_spawn(&mut self) -> SceneResult<EntityId> {
        let id = self
            .entities
            .allocate()
            .ok_or(SceneError::EntityIdsExhausted { last: u64::MAX })?;
        tracing::trace!("Spawned entity {id}");
        Ok(id)
    }

    /// Create an entity under an explicit id.
    ///
    /// If the id is in use, the existing entity is removed first, running
    /// the destructors of all its payloads. Automatic ids handed out later
    /// will be greater than `id`; after `u64::MAX` there are none left and
    /// [`try_spawn`](Self::try_spawn) fails.
    pub fn spawn_with_id(&mut self, id: EntityId) -> EntityId {
        if self.despawn(id) {
            tracing::debug!("Replaced existing entity {id}");
        }
        let inserted = self.entities.insert(id);
        debug_assert!(inserted, "id was just freed");
        tracing::trace!("Spawned entity {id} with explicit id");
        id
    }

    /// Remove an entity, detaching it from every component store.
    ///
    /// Returns `false` if the entity did not exist.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };

        for store in &mut self.stores {
            if store.detach(id) {
                entity.clear_bits(store.info().bit());
            }
        }
        debug_assert!(entity.tag().is_empty(), "tag out of sync with stores");

        self.entities.remove(id);
        tracing::trace!("Despawned entity {id}");
        true
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Get the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over entities in registry order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    // ==================== Payload Operations ====================

    /// Attach (or overwrite) a payload and set the component's bit on the
    /// entity.
    ///
    /// Returns `false` if the entity does not exist or the handle does not
    /// belong to this scene. An overwritten payload is dropped without
    /// running the destructor.
    pub fn attach<T: 'static>(&mut self, id: EntityId, component: Component<T>, value: T) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            tracing::warn!("Cannot attach {component:?} to missing entity {id}");
            return false;
        };
        let store = match typed_store_mut(&mut self.stores, component) {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!("Cannot attach to entity {id}: {err}");
                return false;
            }
        };

        store.insert(id, value);
        entity.set_bits(component.bit());
        tracing::trace!("Attached {component:?} to entity {id}");
        true
    }

    /// Detach a payload, running the destructor and clearing the bit.
    ///
    /// Returns `false` if there was nothing to detach. Other bits of the
    /// entity's tag are never touched.
    pub fn detach<T: 'static>(&mut self, id: EntityId, component: Component<T>) -> bool {
        self.detach_id(id, component.id())
    }

    /// Detach by component id, for callers without a typed handle.
    pub fn detach_id(&mut self, id: EntityId, component: ComponentId) -> bool {
        let Some(store) = self.stores.get_mut(component.index()) else {
            return false;
        };
        if !store.detach(id) {
            return false;
        }
        if let Some(entity) = self.entities.get_mut(id) {
            entity.clear_bits(component.bit());
        }
        tracing::trace!("Detached {component:?} from entity {id}");
        true
    }

    /// Get an entity's payload.
    #[must_use]
    pub fn get<T: 'static>(&self, id: EntityId, component: Component<T>) -> Option<&T> {
        typed_store(&self.stores, component).ok()?.get(id)
    }

    /// Get a mutable reference to an entity's payload.
    #[must_use]
    pub fn get_mut<T: 'static>(&mut self, id: EntityId, component: Component<T>) -> Option<&mut T> {
        typed_store_mut(&mut self.stores, component)
            .ok()?
            .get_mut(id)
    }

    /// Check if an entity has a payload in `component`.
    #[must_use]
    pub fn has(&self, id: EntityId, component: impl Into<ComponentId>) -> bool {
        self.stores
            .get(component.into().index())
            .is_some_and(|store| store.contains(id))
    }

    // ==================== Query ====================

    /// Run a query by entity id or by tag.
    ///
    /// The results borrow the scene; collect ids with
    /// [`query_ids`](Self::query_ids) or queue changes on
    /// [`commands`](Self::commands) to modify what a query returned.
    #[must_use]
    pub fn query(&self, selector: impl Into<Selector>) -> Vec<QueryResult<'_>> {
        query::run(selector.into(), &self.entities, &self.stores)
    }

    /// Query entities having every capability of every given tag.
    #[must_use]
    pub fn query_tags(&self, tags: &[&Tag]) -> Vec<QueryResult<'_>> {
        self.query(Selector::all_of(tags.iter().copied()))
    }

    /// Query by the name of a cached tag.
    ///
    /// Returns `None` if no tag has this name.
    #[must_use]
    pub fn query_named(&self, name: &str) -> Option<Vec<QueryResult<'_>>> {
        let bits = self.tags.get(name)?.bits();
        Some(self.query(bits))
    }

    /// Ids of the entities a query would return, as an owned snapshot.
    #[must_use]
    pub fn query_ids(&self, selector: impl Into<Selector>) -> Vec<EntityId> {
        query::run_ids(selector.into(), &self.entities)
    }

    // ==================== Commands ====================

    /// Queue structural changes to apply after the current system.
    pub fn commands(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    /// Apply every queued command in order.
    ///
    /// Commands aimed at entities that no longer exist are skipped. Returns
    /// the number of commands that changed something.
    pub fn flush_commands(&mut self) -> usize {
        let commands = self.commands.take();
        if commands.is_empty() {
            return 0;
        }

        let queued = commands.len();
        let applied = commands
            .into_iter()
            .filter(|&command| match command {
                Command::Despawn(id) => self.despawn(id),
                Command::Detach(id, component) => self.detach_id(id, component),
            })
            .count();

        tracing::trace!("Applied {applied} of {queued} queued commands");
        applied
    }

    // ==================== Systems ====================

    /// Add a system to the end of the run order.
    ///
    /// [`System::added`] runs immediately, so the system can resolve tags
    /// and components before its first update.
    pub fn add_system<S: System + 'static>(&mut self, mut system: S) {
        system.added(self);
        tracing::debug!("Added system '{}'", system.name());
        self.scheduler.push(Box::new(system));
    }

    /// Get the number of systems, counting those running in the current
    /// frame.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Get the scheduler, for inspecting the run order.
    ///
    /// During [`update`](Self::update) the running systems are out of the
    /// scheduler; [`Scheduler::names`] only lists them between frames.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run one frame: update every system once, in registration order.
    ///
    /// Commands a system queues are applied as soon as that system returns,
    /// before the next one runs.
    pub fn update(&mut self, dt: f32) {
        let mut systems = self.scheduler.take();
        for system in &mut systems {
            system.update(self, dt);
            self.flush_commands();
        }
        self.scheduler.restore(systems);
    }
}

fn typed_store<T: 'static>(
    stores: &[Box<dyn ErasedStore>],
    component: Component<T>,
) -> SceneResult<&ComponentStore<T>> {
    stores
        .get(component.id().index())
        .ok_or(SceneError::UnknownComponent(component.id()))?
        .as_any()
        .downcast_ref()
        .ok_or(SceneError::PayloadType {
            id: component.id(),
            expected: type_name::<T>(),
        })
}

fn typed_store_mut<T: 'static>(
    stores: &mut [Box<dyn ErasedStore>],
    component: Component<T>,
) -> SceneResult<&mut ComponentStore<T>> {
    stores
        .get_mut(component.id().index())
        .ok_or(SceneError::UnknownComponent(component.id()))?
        .as_any_mut()
        .downcast_mut()
        .ok_or(SceneError::PayloadType {
            id: component.id(),
            expected: type_name::<T>(),
        })
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("entity_count", &self.entities.len())
            .field("component_types", &self.components.len())
            .field("tag_count", &self.tags.len())
            .field("systems", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{component::MAX_COMPONENTS, system::FnSystem};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Label(String);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Hovered;

    fn ids(results: &[QueryResult<'_>]) -> Vec<EntityId> {
        results.iter().map(QueryResult::id).collect()
    }

    #[test]
    fn test_attach_and_get() {
        let mut scene = Scene::new();
        let position = scene.register::<Position>("position");

        let e = scene.spawn();
        assert!(scene.attach(e, position, Position { x: 1.0, y: 2.0 }));

        assert_eq!(scene.get(e, position), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(scene.entity(e).map(Entity::tag), Some(position.bit()));
        assert!(scene.has(e, position));
        assert_eq!(scene.component_len(position), 1);
    }

    #[test]
    fn test_get_mut_and_overwrite() {
        let mut scene = Scene::new();
        let position = scene.register::<Position>("position");
        let e = scene.spawn();
        scene.attach(e, position, Position { x: 1.0, y: 2.0 });

        scene.get_mut(e, position).unwrap().x += 10.0;
        assert_eq!(scene.get(e, position).map(|p| p.x), Some(11.0));

        scene.attach(e, position, Position { x: 0.0, y: 0.0 });
        assert_eq!(scene.get(e, position), Some(&Position { x: 0.0, y: 0.0 }));
        assert_eq!(scene.component_len(position), 1);
    }

    #[test]
    fn test_attach_to_missing_entity_is_refused() {
        let mut scene = Scene::new();
        let position = scene.register::<Position>("position");

        let ghost = EntityId::from_raw(404);
        assert!(!scene.attach(ghost, position, Position { x: 0.0, y: 0.0 }));
        assert_eq!(scene.component_len(position), 0);
    }

    #[test]
    fn test_foreign_handle_is_refused() {
        let mut other = Scene::new();
        other.register::<u8>("a");
        let foreign = other.register::<Label>("b");

        let mut scene = Scene::new();
        scene.register::<Position>("position");
        let e = scene.spawn();

        // Index 1 does not exist here.
        assert!(!scene.attach(e, foreign, Label("x".into())));
        assert_eq!(
            scene.set_destructor(foreign, |_, _| {}),
            Err(SceneError::UnknownComponent(foreign.id()))
        );

        // Index 0 exists but stores another type.
        let mismatched = other.component::<u8>("a").unwrap();
        assert!(!scene.attach(e, mismatched, 3));
        assert!(scene.get(e, mismatched).is_none());
        assert_eq!(scene.entity(e).unwrap().tag(), TagBits::EMPTY);
    }

    #[test]
    fn test_component_lookup_by_name() {
        let mut scene = Scene::new();
        let label = scene.register::<Label>("label");

        assert_eq!(scene.component::<Label>("label"), Some(label));
        assert_eq!(scene.component::<Position>("label"), None);
        assert_eq!(scene.component::<Label>("missing"), None);
        assert_eq!(scene.component_id("label"), Some(label.id()));
    }

    #[test]
    fn test_component_bits_unique_and_capacity() {
        let mut scene = Scene::new();
        let mut seen = TagBits::EMPTY;
        for i in 0..MAX_COMPONENTS {
            let c = scene.register::<u32>(&format!("c{i}"));
            assert!(!seen.intersects(c.bit()));
            seen |= c.bit();
        }

        let err = scene.try_register::<u32>("overflow").unwrap_err();
        assert!(matches!(err, SceneError::ComponentCapacity { max: 64, .. }));
        assert_eq!(scene.components().len(), MAX_COMPONENTS);
    }

    #[test]
    #[should_panic(expected = "scene already holds 2 components")]
    fn test_register_panics_past_capacity() {
        let mut scene = Scene::with_config(SceneConfig::default().component_capacity(2));
        scene.register::<u8>("a");
        scene.register::<u8>("b");
        scene.register::<u8>("c");
    }

    #[test]
    fn test_duplicate_component_name() {
        let mut scene = Scene::new();
        scene.register::<Label>("label");
        assert_eq!(
            scene.try_register::<Position>("label"),
            Err(SceneError::DuplicateComponent("label".to_string()))
        );
        assert_eq!(scene.components().len(), 1);
    }

    #[test]
    fn test_query_superset_matching() {
        let mut scene = Scene::new();
        let c1 = scene.register::<u8>("c1");
        let c2 = scene.register::<u8>("c2");
        let c3 = scene.register::<u8>("c3");

        let e = scene.spawn();
        scene.attach(e, c1, 1);
        scene.attach(e, c2, 2);

        let t1 = scene.build_tag("t1", &[c1.into()]);
        let t2 = scene.build_tag("t2", &[c2.into()]);
        let t12 = scene.build_tag("t12", &[c1.into(), c2.into()]);
        let t3 = scene.build_tag("t3", &[c3.into()]);

        assert_eq!(ids(&scene.query(&t1)), vec![e]);
        assert_eq!(ids(&scene.query(&t2)), vec![e]);
        assert_eq!(ids(&scene.query(&t12)), vec![e]);
        assert!(scene.query(&t3).is_empty());
    }

    #[test]
    fn test_query_reports_all_attached_components() {
        let mut scene = Scene::new();
        let position = scene.register::<Position>("position");
        let label = scene.register::<Label>("label");
        let positioned = scene.build_tag("positioned", &[position.into()]);

        let e = scene.spawn();
        scene.attach(e, position, Position { x: 3.0, y: 4.0 });
        scene.attach(e, label, Label("title".into()));

        let results = scene.query(&positioned);
        assert_eq!(results.len(), 1);
        let row = &results[0];
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(position), Some(&Position { x: 3.0, y: 4.0 }));
        assert_eq!(row.get(label), Some(&Label("title".into())));
        assert_eq!(
            row.component_ids().collect::<Vec<_>>(),
            vec![position.id(), label.id()]
        );
    }

    #[test]
    fn test_query_by_missing_id_is_empty() {
        let scene = Scene::new();
        assert!(scene.query(EntityId::from_raw(1)).is_empty());
        assert!(scene.query_named("nothing").is_none());
    }

    #[test]
    fn test_query_tags_unions_masks() {
        let mut scene = Scene::new();
        let a = scene.register::<u8>("a");
        let b = scene.register::<u8>("b");
        let ta = scene.build_tag("ta", &[a.into()]);
        let tb = scene.build_tag("tb", &[b.into()]);

        let only_a = scene.spawn();
        scene.attach(only_a, a, 0);
        let both = scene.spawn();
        scene.attach(both, a, 0);
        scene.attach(both, b, 0);

        assert_eq!(ids(&scene.query_tags(&[&ta, &tb])), vec![both]);
        assert_eq!(ids(&scene.query_tags(&[&ta])), vec![only_a, both]);
    }

    #[test]
    fn test_detach_clears_one_bit_and_runs_destructor_once() {
        let mut scene = Scene::new();
        let label = scene.register::<Label>("label");
        let hovered = scene.register::<Hovered>("hovered");

        let dropped = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&dropped);
        scene
            .set_destructor(label, move |id, Label(text)| log.borrow_mut().push((id, text)))
            .unwrap();

        let e = scene.spawn();
        scene.attach(e, label, Label("bye".into()));
        scene.attach(e, hovered, Hovered);

        assert!(scene.detach(e, label));
        assert!(!scene.detach(e, label));

        assert_eq!(scene.entity(e).unwrap().tag(), hovered.bit());
        assert_eq!(*dropped.borrow(), vec![(e, "bye".to_string())]);
    }

    #[test]
    fn test_detach_without_payload_keeps_other_bits() {
        let mut scene = Scene::new();
        let a = scene.register::<u8>("a");
        let b = scene.register::<u8>("b");
        let e = scene.spawn();
        scene.attach(e, b, 1);

        assert!(!scene.detach(e, a));
        assert_eq!(scene.entity(e).unwrap().tag(), b.bit());
    }

    #[test]
    fn test_despawn_cascades() {
        let mut scene = Scene::new();
        let position = scene.register::<Position>("position");
        let label = scene.register::<Label>("label");

        let dropped = Rc::new(RefCell::new(0));
        let count = Rc::clone(&dropped);
        scene
            .set_destructor(label, move |_, _| *count.borrow_mut() += 1)
            .unwrap();

        let e = scene.spawn();
        let keep = scene.spawn();
        scene.attach(e, position, Position { x: 0.0, y: 0.0 });
        scene.attach(e, label, Label("a".into()));
        scene.attach(keep, label, Label("b".into()));

        assert!(scene.despawn(e));
        assert!(!scene.despawn(e));

        assert!(scene.query(e).is_empty());
        assert!(!scene.has(e, position));
        assert!(!scene.has(e, label));
        assert_eq!(*dropped.borrow(), 1);
        assert_eq!(scene.get(keep, label), Some(&Label("b".into())));
        assert_eq!(scene.entity_count(), 1);
    }

    #[test]
    fn test_build_tag_representation_independent() {
        let mut scene = Scene::new();
        let c1 = scene.register::<u8>("c1");
        let c2 = scene.register::<u8>("c2");

        let from_components = scene.build_tag("both", &[c1.into(), c2.into()]);
        let t1 = scene.build_tag("t1", &[c1.into()]);
        let from_tag = scene.build_tag("both", &[(&t1).into(), c2.into()]);
        let from_names = scene.build_tag("both", &["t1".into(), "c2".into()]);

        assert_eq!(from_components, from_tag);
        assert_eq!(from_tag, from_names);
        assert_eq!(from_tag.bits(), TagBits::from_raw(0b11));
    }

    #[test]
    fn test_rebuilding_tag_replaces_cache() {
        let mut scene = Scene::new();
        let c1 = scene.register::<u8>("c1");
        let c2 = scene.register::<u8>("c2");

        scene.build_tag("t", &[c1.into()]);
        scene.build_tag("t", &[c2.into()]);

        assert_eq!(scene.tag("t").map(|t| t.bits()), Some(c2.bit()));
        assert_eq!(scene.tags().len(), 1);
    }

    #[test]
    fn test_invalid_tag_input_leaves_cache_untouched() {
        let mut scene = Scene::new();
        let c1 = scene.register::<u8>("c1");
        scene.build_tag("t", &[c1.into()]);

        let err = scene
            .try_build_tag("t", &[c1.into(), "nope".into()])
            .unwrap_err();
        assert_eq!(
            err,
            SceneError::InvalidTagInput {
                tag: "t".to_string(),
                reason: "unknown name 'nope'".to_string(),
            }
        );

        let stray = Tag::new("stray", TagBits::from_raw(0b100));
        assert!(scene.try_build_tag("t", &[(&stray).into()]).is_err());
        assert!(scene.try_build_tag("u", &[]).is_ok());

        assert_eq!(scene.tag("t").map(|t| t.bits()), Some(c1.bit()));
    }

    #[test]
    #[should_panic(expected = "invalid input for tag 'moveable'")]
    fn test_build_tag_panics_on_unknown_name() {
        let mut scene = Scene::new();
        scene.build_tag("moveable", &["velocity".into()]);
    }

    #[test]
    fn test_remove_tag() {
        let mut scene = Scene::new();
        let c = scene.register::<u8>("c");
        scene.build_tag("t", &[c.into()]);

        assert!(scene.remove_tag("t").is_some());
        assert!(scene.tag("t").is_none());
        assert!(scene.query_named("t").is_none());
    }

    #[test]
    fn test_spawn_with_id_replaces_existing() {
        let mut scene = Scene::new();
        let label = scene.register::<Label>("label");
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&dropped);
        scene
            .set_destructor(label, move |id, Label(text)| log.borrow_mut().push((id, text)))
            .unwrap();

        let id = EntityId::from_raw(42);
        scene.spawn_with_id(id);
        scene.attach(id, label, Label("old".into()));

        assert_eq!(scene.spawn_with_id(id), id);

        assert_eq!(*dropped.borrow(), vec![(id, "old".to_string())]);
        assert_eq!(scene.entity(id).map(Entity::tag), Some(TagBits::EMPTY));
        assert!(scene.get(id, label).is_none());
        assert_eq!(scene.entity_count(), 1);
    }

    #[test]
    fn test_auto_ids_never_collide_with_explicit_ids() {
        let mut scene = Scene::new();

        let auto1 = scene.spawn();
        scene.spawn_with_id(EntityId::from_raw(auto1.as_raw() + 1));
        scene.spawn_with_id(EntityId::from_raw(10));

        let auto2 = scene.spawn();
        assert_eq!(auto2.as_raw(), 11);
        assert_eq!(scene.entity_count(), 4);
    }

    #[test]
    fn test_first_entity_id_config() {
        let mut scene = Scene::with_config(SceneConfig::default().first_entity_id(100));
        assert_eq!(scene.spawn().as_raw(), 100);
    }

    #[test]
    fn test_max_explicit_id_exhausts_auto_ids() {
        let mut scene = Scene::new();
        let label = scene.register::<Label>("label");
        let first = scene.spawn();

        let last = scene.spawn_with_id(EntityId::from_raw(u64::MAX));
        assert!(scene.attach(last, label, Label("end".into())));

        assert_eq!(
            scene.try_spawn(),
            Err(SceneError::EntityIdsExhausted { last: u64::MAX })
        );
        assert_eq!(scene.entity_count(), 2);
        assert!(scene.contains(first));

        // Explicit ids keep working.
        scene.spawn_with_id(EntityId::from_raw(5));
        assert_eq!(scene.entity_count(), 3);
    }

    #[test]
    fn test_first_entity_id_at_ceiling() {
        let mut scene =
            Scene::with_config(SceneConfig::default().first_entity_id(u64::MAX));

        assert_eq!(scene.try_spawn(), Ok(EntityId::from_raw(u64::MAX)));
        assert!(scene.try_spawn().is_err());
    }

    #[test]
    #[should_panic(expected = "no automatic entity ids left")]
    fn test_spawn_panics_when_ids_exhausted() {
        let mut scene = Scene::new();
        scene.spawn_with_id(EntityId::from_raw(u64::MAX));
        scene.spawn();
    }

    #[test]
    fn test_query_ids_snapshot_allows_mutation() {
        let mut scene = Scene::new();
        let hovered = scene.register::<Hovered>("hovered");
        for _ in 0..4 {
            let e = scene.spawn();
            scene.attach(e, hovered, Hovered);
        }
        let extra = scene.spawn();

        for id in scene.query_ids(hovered) {
            scene.despawn(id);
        }

        assert_eq!(scene.entity_count(), 1);
        assert!(scene.contains(extra));
    }

    #[test]
    fn test_flush_commands() {
        let mut scene = Scene::new();
        let label = scene.register::<Label>("label");
        let a = scene.spawn();
        let b = scene.spawn();
        scene.attach(b, label, Label("x".into()));

        scene
            .commands()
            .despawn(a)
            .detach(b, label)
            .despawn(a);

        assert_eq!(scene.flush_commands(), 2);
        assert!(!scene.contains(a));
        assert!(!scene.has(b, label));
        assert_eq!(scene.flush_commands(), 0);
    }

    #[test]
    fn test_systems_run_in_order() {
        let mut scene = Scene::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["input", "layout", "render"] {
            let log = Rc::clone(&order);
            scene.add_system(FnSystem::new(name, move |_scene: &mut Scene, _dt| {
                log.borrow_mut().push(name);
            }));
        }

        scene.update(0.016);
        scene.update(0.016);

        assert_eq!(
            *order.borrow(),
            vec!["input", "layout", "render", "input", "layout", "render"]
        );
        assert_eq!(scene.system_count(), 3);
    }

    #[test]
    fn test_system_count_during_update() {
        let mut scene = Scene::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second"] {
            let log = Rc::clone(&seen);
            scene.add_system(FnSystem::new(name, move |scene: &mut Scene, _dt| {
                log.borrow_mut()
                    .push((scene.system_count(), scene.scheduler().is_running()));
            }));
        }

        scene.update(0.0);

        assert_eq!(*seen.borrow(), vec![(2, true), (2, true)]);
        assert!(!scene.scheduler().is_running());
    }

    #[test]
    fn test_system_added_hook_sees_scene() {
        struct Resolver {
            drawable: Option<Tag>,
            seen: Rc<RefCell<usize>>,
        }

        impl System for Resolver {
            fn added(&mut self, scene: &mut Scene) {
                self.drawable = scene.tag("drawable");
            }

            fn update(&mut self, scene: &mut Scene, _dt: f32) {
                if let Some(tag) = &self.drawable {
                    *self.seen.borrow_mut() = scene.query(tag).len();
                }
            }
        }

        let mut scene = Scene::new();
        let shape = scene.register::<u8>("shape");
        scene.build_tag("drawable", &[shape.into()]);
        let e = scene.spawn();
        scene.attach(e, shape, 0);

        let seen = Rc::new(RefCell::new(0));
        scene.add_system(Resolver {
            drawable: None,
            seen: Rc::clone(&seen),
        });
        scene.update(0.0);

        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_commands_apply_before_next_system() {
        let mut scene = Scene::new();
        let hovered = scene.register::<Hovered>("hovered");
        let e = scene.spawn();
        scene.attach(e, hovered, Hovered);

        scene.add_system(FnSystem::new("reaper", move |scene: &mut Scene, _dt| {
            for id in scene.query_ids(hovered) {
                scene.commands().despawn(id);
            }
            // Still present until this system returns.
            assert!(scene.contains(e));
        }));

        let seen = Rc::new(RefCell::new(None));
        let log = Rc::clone(&seen);
        scene.add_system(FnSystem::new("observer", move |scene: &mut Scene, _dt| {
            *log.borrow_mut() = Some(scene.contains(e));
        }));

        scene.update(0.0);
        assert_eq!(*seen.borrow(), Some(false));
    }

    #[test]
    fn test_system_added_during_update_runs_next_frame() {
        let mut scene = Scene::new();
        let runs = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&runs);
        let mut spawned = false;
        scene.add_system(FnSystem::new("spawner", move |scene: &mut Scene, _dt| {
            if !spawned {
                spawned = true;
                let counter = Rc::clone(&counter);
                scene.add_system(FnSystem::new("late", move |_: &mut Scene, _| {
                    *counter.borrow_mut() += 1;
                }));
            }
        }));

        scene.update(0.0);
        assert_eq!(*runs.borrow(), 0);
        assert_eq!(scene.system_count(), 2);

        scene.update(0.0);
        assert_eq!(*runs.borrow(), 1);
        assert_eq!(
            scene.scheduler().names().collect::<Vec<_>>(),
            vec!["spawner", "late"]
        );
    }

    #[test]
    fn test_clear_and_destroy_run_destructors() {
        let mut scene = Scene::new();
        let label = scene.register::<Label>("label");
        let dropped = Rc::new(RefCell::new(0));
        let count = Rc::clone(&dropped);
        scene
            .set_destructor(label, move |_, _| *count.borrow_mut() += 1)
            .unwrap();

        for i in 0..3 {
            let e = scene.spawn();
            scene.attach(e, label, Label(i.to_string()));
        }
        scene.spawn();

        scene.destroy();
        assert_eq!(*dropped.borrow(), 3);
    }
}
