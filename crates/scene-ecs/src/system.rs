//! Systems and the per-frame scheduler.
//!
//! A system is anything that can be updated once per frame with the owning
//! scene. Systems run strictly in registration order, one at a time; none of
//! them runs concurrently with another inside the same frame.
//!
//! # Example
//!
//! ```ignore
//! struct Blink {
//!     drawable: Option<Tag>,
//! }
//!
//! impl System for Blink {
//!     fn added(&mut self, scene: &mut Scene) {
//!         self.drawable = scene.tag("drawable");
//!     }
//!
//!     fn update(&mut self, scene: &mut Scene, dt: f32) {
//!         let Some(drawable) = &self.drawable else { return };
//!         for row in scene.query(drawable) {
//!             // ...
//!         }
//!     }
//! }
//!
//! scene.add_system(Blink { drawable: None });
//! scene.update(1.0 / 60.0);
//! ```

use std::{any::type_name, fmt};

use crate::scene::Scene;

/// An update-driven consumer of the scene.
pub trait System {
    /// Name used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Called once when the system is added, before its first update.
    ///
    /// Systems typically resolve the tags and component handles they need
    /// here.
    fn added(&mut self, _scene: &mut Scene) {}

    /// Run one frame. `dt` is the frame time in seconds.
    fn update(&mut self, scene: &mut Scene, dt: f32);
}

/// A system built from a closure.
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut Scene, f32),
{
    /// Wrap a closure as a named system.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut Scene, f32),
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, scene: &mut Scene, dt: f32) {
        (self.func)(scene, dt);
    }
}

/// Ordered list of systems.
#[derive(Default)]
pub struct Scheduler {
    systems: Vec<Box<dyn System>>,
    /// Systems taken out for the current frame.
    running: usize,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system.
    pub fn push(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Get the number of systems, including those running this frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len() + self.running
    }

    /// Check if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if systems are out running a frame.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running > 0
    }

    /// Names of the registered systems, in run order.
    ///
    /// While a frame runs only systems added during that frame are listed;
    /// the running ones are back in place once it ends.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|system| system.name())
    }

    /// Take the systems out for a frame so they can borrow the scene.
    pub(crate) fn take(&mut self) -> Vec<Box<dyn System>> {
        let systems = std::mem::take(&mut self.systems);
        self.running += systems.len();
        systems
    }

    /// Put systems back after a frame.
    ///
    /// Systems added while the frame ran are kept after the existing ones.
    pub(crate) fn restore(&mut self, mut systems: Vec<Box<dyn System>>) {
        self.running -= systems.len();
        systems.append(&mut self.systems);
        self.systems = systems;
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
