//! Component identifiers and keys.
//!
//! A [`ComponentId`] is the stable, human-readable name of a component kind
//! (`"arcana:mana"`). Registering it in a
//! [`ComponentRegistry`](crate::ComponentRegistry) yields a key that also
//! carries the component's concrete Rust type and a dense integer index used
//! for O(1) container lookups.

use std::any::TypeId;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::error::RegistryError;

/// Stable string identifier of a component kind.
///
/// Valid ids are non-empty and use lowercase ASCII letters, digits and
/// `_ - . / :`, with at most one `:` separating an optional namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Parses and validates an id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidId`] if `raw` is not a valid id.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(RegistryError::InvalidId(raw.to_owned()))
        }
    }

    /// Returns `true` if `raw` satisfies the id syntax.
    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        if raw.is_empty() || raw.starts_with(':') || raw.ends_with(':') {
            return false;
        }
        let mut separators = 0;
        for c in raw.chars() {
            match c {
                'a'..='z' | '0'..='9' | '_' | '-' | '.' | '/' => {}
                ':' => separators += 1,
                _ => return false,
            }
        }
        separators <= 1
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before `:`, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.split_once(':').map(|(ns, _)| ns)
    }

    /// The part after `:`, or the whole id.
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, path)| path)
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct KeyInfo {
    id: ComponentId,
    index: u32,
    type_id: TypeId,
    type_name: &'static str,
}

/// Type-erased component key.
///
/// Cheap to clone. Two keys are equal when they share index and component
/// type, which within one registry means they are the same key.
#[derive(Clone)]
pub struct RawComponentKey(Arc<KeyInfo>);

impl RawComponentKey {
    pub(crate) fn new(id: ComponentId, index: u32, type_id: TypeId, type_name: &'static str) -> Self {
        Self(Arc::new(KeyInfo {
            id,
            index,
            type_id,
            type_name,
        }))
    }

    #[must_use]
    pub fn id(&self) -> &ComponentId {
        &self.0.id
    }

    /// Dense index, assigned in registration order.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.0.index
    }

    /// `TypeId` of the component type this key accepts.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0.type_id
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name
    }

    /// Returns `true` if `value` is an instance of this key's component type.
    #[must_use]
    pub fn accepts(&self, value: &dyn Component) -> bool {
        value.component_type_id() == self.0.type_id
    }

    /// Recovers the typed key, if `C` is this key's component type.
    #[must_use]
    pub fn typed<C: Component>(&self) -> Option<ComponentKey<C>> {
        (self.0.type_id == TypeId::of::<C>()).then(|| ComponentKey {
            raw: self.clone(),
            _marker: PhantomData,
        })
    }
}

impl PartialEq for RawComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.index == other.0.index && self.0.type_id == other.0.type_id
    }
}

impl Eq for RawComponentKey {}

impl Hash for RawComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.index.hash(state);
    }
}

impl fmt::Debug for RawComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKey[\"{}\"]", self.0.id)
    }
}

impl fmt::Display for RawComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.id, f)
    }
}

/// Typed component key for component type `C`.
pub struct ComponentKey<C> {
    raw: RawComponentKey,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> ComponentKey<C> {
    #[must_use]
    pub fn raw(&self) -> &RawComponentKey {
        &self.raw
    }

    #[must_use]
    pub fn id(&self) -> &ComponentId {
        self.raw.id()
    }

    #[must_use]
    pub fn index(&self) -> u32 {
        self.raw.index()
    }
}

impl<C> Clone for ComponentKey<C> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<C> PartialEq for ComponentKey<C> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<C> Eq for ComponentKey<C> {}

impl<C> fmt::Debug for ComponentKey<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.raw, f)
    }
}

impl<C> AsRef<RawComponentKey> for ComponentKey<C> {
    fn as_ref(&self) -> &RawComponentKey {
        &self.raw
    }
}

impl<C> From<ComponentKey<C>> for RawComponentKey {
    fn from(key: ComponentKey<C>) -> Self {
        key.raw
    }
}
