//! Per-owner-class recipe composition with a memoized cache.
//!
//! The cache is read without a global lock. A miss takes the synthesis
//! lock, re-checks the cache and synthesizes, so each class is composed at
//! most once however many threads race on it.
//!
//! A class without declarations of its own reuses its parent's recipe: the
//! cache entry for the subclass points at the very same `Arc`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use graft_component::{DenseContainer, Owner, OwnerClass, OwnerClassId};
use tracing::debug;

use crate::error::CompositionError;
use crate::recipe::ContainerRecipe;
use crate::registry::FactoryRegistry;
use crate::sort::sort_by_dependencies;

/// Composes and caches container recipes for owner classes.
pub struct Composer<O> {
    factories: FactoryRegistry<O>,
    cache: DashMap<OwnerClassId, Arc<ContainerRecipe<O>>>,
    synthesis: Mutex<()>,
    synthesized: AtomicUsize,
}

impl<O: Owner + 'static> Composer<O> {
    /// Freezes `factories` into a composer.
    #[must_use]
    pub fn new(factories: FactoryRegistry<O>) -> Self {
        Self {
            factories,
            cache: DashMap::new(),
            synthesis: Mutex::new(()),
            synthesized: AtomicUsize::new(0),
        }
    }

    /// Returns the recipe for `class`, composing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError`] if the merged declarations of `class`
    /// collide, form a cycle, or depend on absent keys.
    pub fn recipe_for(&self, class: &'static OwnerClass) -> Result<Arc<ContainerRecipe<O>>, CompositionError> {
        if let Some(recipe) = self.cached(class) {
            return Ok(recipe);
        }
        let _guard = self.synthesis.lock().unwrap_or_else(PoisonError::into_inner);
        self.resolve_locked(class)
    }

    /// Creates the populated container for `owner`.
    ///
    /// # Errors
    ///
    /// See [`Composer::recipe_for`].
    pub fn create_container(&self, owner: &O) -> Result<DenseContainer, CompositionError> {
        Ok(self.recipe_for(owner.owner_class())?.create(owner))
    }

    /// Number of recipes synthesized so far (reused parent recipes excluded).
    #[must_use]
    pub fn synthesized_count(&self) -> usize {
        self.synthesized.load(Ordering::Acquire)
    }

    /// Number of classes with a cached recipe.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn factories(&self) -> &FactoryRegistry<O> {
        &self.factories
    }

    fn cached(&self, class: &OwnerClass) -> Option<Arc<ContainerRecipe<O>>> {
        self.cache.get(&class.id()).map(|entry| Arc::clone(entry.value()))
    }

    /// Caller holds the synthesis lock.
    fn resolve_locked(&self, class: &'static OwnerClass) -> Result<Arc<ContainerRecipe<O>>, CompositionError> {
        if let Some(recipe) = self.cached(class) {
            return Ok(recipe);
        }

        let recipe = match class.parent() {
            Some(parent) if !self.factories.declares(class) => {
                let inherited = self.resolve_locked(parent)?;
                debug!(class = class.name(), parent = parent.name(), "reusing parent recipe");
                inherited
            }
            _ => self.synthesize(class)?,
        };

        self.cache.insert(class.id(), Arc::clone(&recipe));
        Ok(recipe)
    }

    fn synthesize(&self, class: &'static OwnerClass) -> Result<Arc<ContainerRecipe<O>>, CompositionError> {
        let merged = self.factories.merged_for(class)?;
        let ordered = sort_by_dependencies(class, merged)?;
        let recipe = Arc::new(ContainerRecipe::new(class, ordered));
        self.synthesized.fetch_add(1, Ordering::AcqRel);

        let keys: Vec<&str> = recipe.keys().map(|k| k.id().as_str()).collect();
        debug!(class = class.name(), ?keys, "synthesized container recipe");
        Ok(recipe)
    }
}
