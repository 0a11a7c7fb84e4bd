#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::float_cmp)]

//! Scene ECS - Bitmask-tagged Entity Component runtime
//!
//! Built for retained UI and document scenes: one scene per root, a handful
//! of systems updated once per frame, and queries by capability rather than
//! by concrete type.
//!
//! # Key Concepts
//!
//! - **Entity**: A numeric id plus a 64-bit tag of the components it carries
//! - **Component**: A named store of payloads of one type, identified by a
//!   single capability bit
//! - **Tag**: A named capability mask built from components and other tags
//! - **Query**: Every entity whose tag is a superset of the query mask, with
//!   all of its payloads
//! - **System**: Something updated once per frame with the owning scene
//!
//! # Example
//!
//! ```ignore
//! let mut scene = Scene::new();
//! let position = scene.register::<Position>("position");
//! let shape = scene.register::<Shape>("shape");
//! let drawable = scene.build_tag("drawable", &[position.into(), shape.into()]);
//!
//! let e = scene.spawn();
//! scene.attach(e, position, Position { x: 0.0, y: 0.0 });
//! scene.attach(e, shape, Shape::Circle(4.0));
//!
//! for row in scene.query(&drawable) {
//!     let pos = row.get(position);
//! }
//! ```
//!
//! # Structural changes
//!
//! Query results borrow the scene, so entities cannot be removed while a
//! result set is alive. Either collect ids first with `Scene::query_ids` or
//! queue changes on `Scene::commands`; queued commands are applied after
//! each system returns.

mod command;
mod component;
mod config;
mod entity;
mod error;
mod query;
mod scene;
mod store;
mod system;
mod tag;

pub use command::{Command, CommandBuffer};
pub use component::{Component, ComponentId, ComponentInfo, ComponentRegistry, MAX_COMPONENTS};
pub use config::SceneConfig;
pub use entity::{Entity, EntityId, EntityRegistry};
pub use error::{SceneError, SceneResult};
pub use query::{QueryResult, Selector};
pub use scene::Scene;
pub use store::{ComponentStore, Destructor, ErasedStore};
pub use system::{FnSystem, Scheduler, System};
pub use tag::{Tag, TagBits, TagInput, TagRegistry};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Component, EntityId, FnSystem, QueryResult, Scene, SceneError, Selector, System, Tag,
        TagInput,
    };
}
