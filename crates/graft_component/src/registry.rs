//! The component registry.
//!
//! Maps stable string ids to [`RawComponentKey`]s. Indices come from a
//! counter owned by the registry: they increase in registration order and
//! are never reused, so a sorted set of keys is also a contiguous-ish range
//! that dense containers can index directly.
//!
//! The registry is open until [`ComponentRegistry::seal`]. After that, new
//! ids are rejected while lookups and idempotent re-registrations keep
//! working.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::debug;

use crate::component::Component;
use crate::error::RegistryError;
use crate::key::{ComponentId, ComponentKey, RawComponentKey};

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_id: HashMap<ComponentId, RawComponentKey>,
    /// Keys in registration order; position equals index.
    ordered: Vec<RawComponentKey>,
    sealed: bool,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or fetches) the key for `id` with component type `C`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidId`] if `id` is malformed.
    /// - [`RegistryError::CapabilityMismatch`] if `id` is already registered
    ///   with another component type.
    /// - [`RegistryError::Sealed`] if `id` is new and the registry is sealed.
    pub fn register<C: Component>(&mut self, id: &str) -> Result<ComponentKey<C>, RegistryError> {
        let raw = self.register_raw(id, TypeId::of::<C>(), std::any::type_name::<C>())?;
        raw.typed::<C>().ok_or_else(|| RegistryError::CapabilityMismatch {
            id: id.to_owned(),
            existing: raw.type_name(),
            requested: std::any::type_name::<C>(),
        })
    }

    /// Type-erased form of [`ComponentRegistry::register`].
    ///
    /// # Errors
    ///
    /// See [`ComponentRegistry::register`].
    pub fn register_raw(
        &mut self,
        id: &str,
        type_id: TypeId,
        type_name: &'static str,
    ) -> Result<RawComponentKey, RegistryError> {
        let id = ComponentId::parse(id)?;

        if let Some(existing) = self.by_id.get(&id) {
            if existing.type_id() != type_id {
                return Err(RegistryError::CapabilityMismatch {
                    id: id.to_string(),
                    existing: existing.type_name(),
                    requested: type_name,
                });
            }
            return Ok(existing.clone());
        }

        if self.sealed {
            return Err(RegistryError::Sealed { id: id.to_string() });
        }

        let index = u32::try_from(self.ordered.len()).map_err(|_| RegistryError::IndexOverflow)?;
        let key = RawComponentKey::new(id.clone(), index, type_id, type_name);
        debug!(id = %id, index, component = type_name, "registered component key");

        self.by_id.insert(id, key.clone());
        self.ordered.push(key.clone());
        Ok(key)
    }

    /// Looks up a key by string id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&RawComponentKey> {
        self.by_id.get(id)
    }

    /// Looks up a key by string id, requiring component type `C`.
    #[must_use]
    pub fn lookup_typed<C: Component>(&self, id: &str) -> Option<ComponentKey<C>> {
        self.lookup(id).and_then(RawComponentKey::typed::<C>)
    }

    /// Returns the key with dense index `index`.
    #[must_use]
    pub fn key_at(&self, index: u32) -> Option<&RawComponentKey> {
        self.ordered.get(index as usize)
    }

    /// Iterates keys in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RawComponentKey> {
        self.ordered.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Closes the registry to new ids.
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!(keys = self.ordered.len(), "component registry sealed");
        }
        self.sealed = true;
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
