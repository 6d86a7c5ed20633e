//! Owner classes and owner identity.
//!
//! Components attach to *owners*. Every owner belongs to an [`OwnerClass`],
//! and classes form a single-inheritance hierarchy declared statically:
//!
//! ```rust
//! use graft_component::OwnerClass;
//!
//! static ENTITY: OwnerClass = OwnerClass::root("entity");
//! static PLAYER: OwnerClass = OwnerClass::extends("player", &ENTITY);
//!
//! assert!(PLAYER.is_subclass_of(&ENTITY));
//! ```
//!
//! Factory composition walks this hierarchy from the most specific class to
//! the root.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an owner class, derived from its name with FNV-1a 64-bit.
///
/// Deterministic across runs and processes, so it can key caches and appear
/// in logs or on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerClassId(pub u64);

impl OwnerClassId {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Hashes `name` with FNV-1a 64-bit.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }
}

/// A statically declared owner class.
///
/// Class names must be unique within a program; equality and hashing use
/// the derived [`OwnerClassId`].
pub struct OwnerClass {
    id: OwnerClassId,
    name: &'static str,
    parent: Option<&'static OwnerClass>,
}

impl OwnerClass {
    /// A class with no parent.
    #[must_use]
    pub const fn root(name: &'static str) -> Self {
        Self {
            id: OwnerClassId::from_name(name),
            name,
            parent: None,
        }
    }

    /// A class deriving from `parent`.
    #[must_use]
    pub const fn extends(name: &'static str, parent: &'static OwnerClass) -> Self {
        Self {
            id: OwnerClassId::from_name(name),
            name,
            parent: Some(parent),
        }
    }

    #[must_use]
    pub const fn id(&self) -> OwnerClassId {
        self.id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn parent(&self) -> Option<&'static OwnerClass> {
        self.parent
    }

    /// Iterates this class, then its parent, up to the root.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Returns `true` if `other` is this class or one of its ancestors.
    #[must_use]
    pub fn is_subclass_of(&self, other: &OwnerClass) -> bool {
        self.ancestors().any(|class| class == other)
    }

    /// Number of ancestors above this class.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }
}

impl PartialEq for OwnerClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OwnerClass {}

impl Hash for OwnerClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for OwnerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerClass")
            .field("name", &self.name)
            .field("parent", &self.parent.map(OwnerClass::name))
            .finish()
    }
}

impl fmt::Display for OwnerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a class and its ancestors, most specific first.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a OwnerClass>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a OwnerClass;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

/// An owner instance that components can attach to.
pub trait Owner: Send + Sync {
    /// The concrete class of this instance.
    fn owner_class(&self) -> &'static OwnerClass;
}

/// Stable identity of an owner instance, used to address it across peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef(pub Uuid);

impl OwnerRef {
    /// Generates a fresh random owner reference.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({})", self.0)
    }
}
