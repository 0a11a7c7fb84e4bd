//! Scene error types.

use thiserror::Error;

use crate::component::ComponentId;

/// Configuration errors raised while setting up a scene.
///
/// Every variant is a programming error at setup time. They are reported
/// before any scene state is written, so a failed call leaves the scene
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// All capability bits of the scene are taken.
    #[error("cannot register component '{name}': scene already holds {max} components")]
    ComponentCapacity { name: String, max: usize },

    /// A component store with this name already exists.
    #[error("component '{0}' is already registered")]
    DuplicateComponent(String),

    /// An input to a tag is neither a component nor a tag of this scene.
    #[error("invalid input for tag '{tag}': {reason}")]
    InvalidTagInput { tag: String, reason: String },

    /// A component handle does not belong to this scene.
    #[error("component {0:?} is not registered in this scene")]
    UnknownComponent(ComponentId),

    /// A component handle was used with a payload type it was not created for.
    #[error("component {id:?} does not store payloads of type {expected}")]
    PayloadType {
        id: ComponentId,
        expected: &'static str,
    },

    /// Every automatic entity id up to `u64::MAX` has been handed out.
    #[error("no automatic entity ids left after {last}")]
    EntityIdsExhausted { last: u64 },
}

/// Result type for scene setup operations.
pub type SceneResult<T> = Result<T, SceneError>;
