//! Capability tags.
//!
//! A [`TagBits`] is a 64-bit set of capability bits, one bit per component
//! store. Entities carry one as their current capability set; queries use one
//! as the set of capabilities a match must have.
//!
//! A [`Tag`] pairs a mask with a name. Named tags are cached in the
//! [`TagRegistry`] so call sites can ask for "everything `interactable`"
//! without holding references to the individual component stores.

use std::{fmt, ops, sync::Arc};

use rustc_hash::FxHashMap;

use crate::component::{Component, ComponentId};

/// A 64-bit capability mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TagBits(u64);

impl TagBits {
    /// The empty mask. Matches every entity when used as a query.
    pub const EMPTY: Self = Self(0);

    /// Create a mask from raw bits.
    #[must_use]
    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    /// Get the raw bits.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Check if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of capabilities in the mask.
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// `self` is a superset of `required`.
    ///
    /// This is the query predicate: an entity tagged `self` matches a query
    /// for `required` iff every required bit is present.
    #[must_use]
    pub const fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Check if the two masks share at least one bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Set every bit of `other`.
    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear every bit of `other`, leaving all other bits untouched.
    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl ops::BitOr for TagBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for TagBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for TagBits {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for TagBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagBits({:#b})", self.0)
    }
}

impl fmt::Binary for TagBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.0, f)
    }
}

/// A named capability mask.
///
/// Cloning is cheap; the name is shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    name: Arc<str>,
    bits: TagBits,
}

impl Tag {
    /// Create a tag. Prefer [`crate::Scene::build_tag`], which validates the
    /// bits against the scene and caches the result.
    #[must_use]
    pub fn new(name: &str, bits: TagBits) -> Self {
        Self {
            name: Arc::from(name),
            bits,
        }
    }

    /// Get the tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the capability mask.
    #[must_use]
    pub const fn bits(&self) -> TagBits {
        self.bits
    }

    /// Check if an entity tagged `candidate` satisfies this tag.
    #[must_use]
    pub const fn matches(&self, candidate: TagBits) -> bool {
        candidate.contains(self.bits)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?}, {:#b})", self.name, self.bits.0)
    }
}

/// One input to a tag being built.
///
/// The closed set of variants keeps anything that is not a component or a tag
/// out at compile time. Names are resolved at build time, first against the
/// tag cache and then against the component names; an unknown name is an
/// invalid input.
#[derive(Clone, Copy, Debug)]
pub enum TagInput<'a> {
    /// A single component's capability bit.
    Component(ComponentId),
    /// All bits of an existing tag.
    Tag(TagBits),
    /// A tag or component looked up by name.
    Name(&'a str),
}

impl<T> From<Component<T>> for TagInput<'_> {
    fn from(component: Component<T>) -> Self {
        Self::Component(component.id())
    }
}

impl<T> From<&Component<T>> for TagInput<'_> {
    fn from(component: &Component<T>) -> Self {
        Self::Component(component.id())
    }
}

impl From<&Tag> for TagInput<'_> {
    fn from(tag: &Tag) -> Self {
        Self::Tag(tag.bits())
    }
}

impl<'a> From<&'a str> for TagInput<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

/// Cache of named tags.
#[derive(Default)]
pub struct TagRegistry {
    tags: FxHashMap<Arc<str>, Tag>,
}

impl TagRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a tag under its name, returning the tag it replaced.
    pub fn insert(&mut self, tag: Tag) -> Option<Tag> {
        self.tags.insert(Arc::clone(&tag.name), tag)
    }

    /// Look up a tag by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.tags.get(name)
    }

    /// Drop a cached tag.
    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        self.tags.remove(name)
    }

    /// Get the number of cached tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate over all cached tags, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("count", &self.len())
            .finish()
    }
}
