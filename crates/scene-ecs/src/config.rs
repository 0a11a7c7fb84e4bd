//! Scene construction options.

use crate::component::MAX_COMPONENTS;

/// Options for [`crate::Scene::with_config`].
///
/// ```ignore
/// let scene = Scene::with_config(
///     SceneConfig::default()
///         .entity_capacity(1024)
///         .first_entity_id(100),
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneConfig {
    /// Entities to pre-allocate room for.
    pub entity_capacity: usize,
    /// Maximum number of component stores. Clamped to [`MAX_COMPONENTS`].
    pub component_capacity: usize,
    /// First automatically assigned entity id.
    pub first_entity_id: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 0,
            component_capacity: MAX_COMPONENTS,
            first_entity_id: 1,
        }
    }
}

impl SceneConfig {
    /// Set the entity pre-allocation hint.
    #[must_use]
    pub const fn entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Cap the number of component stores below [`MAX_COMPONENTS`].
    #[must_use]
    pub const fn component_capacity(mut self, capacity: usize) -> Self {
        self.component_capacity = if capacity < MAX_COMPONENTS {
            capacity
        } else {
            MAX_COMPONENTS
        };
        self
    }

    /// Set the first automatically assigned entity id.
    #[must_use]
    pub const fn first_entity_id(mut self, id: u64) -> Self {
        self.first_entity_id = id;
        self
    }
}
