//! Container recipes.
//!
//! A recipe is the composed result for one owner class: a dense layout
//! shared by all of the class's containers and its builders in dependency
//! order. Running it fills each slot directly, without the per-put type
//! and occupancy checks of [`ComponentContainer::put_raw`].
//!
//! [`ComponentContainer::put_raw`]: graft_component::ComponentContainer::put_raw

use std::fmt;
use std::sync::Arc;

use graft_component::{Component, DenseContainer, DenseLayout, OwnerClass, RawComponentKey};

use crate::declaration::{ComponentBuilder, FactoryDeclaration};

struct BuildStep<O> {
    key: RawComponentKey,
    slot: usize,
    builder: ComponentBuilder<O>,
    impl_name: &'static str,
}

/// Composed container builder for one owner class.
pub struct ContainerRecipe<O> {
    class: &'static OwnerClass,
    layout: Arc<DenseLayout>,
    steps: Vec<BuildStep<O>>,
}

impl<O> ContainerRecipe<O> {
    /// Builds a recipe from declarations already in dependency order.
    pub(crate) fn new(class: &'static OwnerClass, ordered: Vec<FactoryDeclaration<O>>) -> Self {
        let layout = Arc::new(DenseLayout::new(ordered.iter().map(|d| d.key.clone()).collect()));
        let min_index = layout.min_index();
        let steps = ordered
            .into_iter()
            .map(|declaration| BuildStep {
                slot: (declaration.key.index() - min_index) as usize,
                key: declaration.key,
                builder: declaration.builder,
                impl_name: declaration.impl_name,
            })
            .collect();

        Self { class, layout, steps }
    }

    /// Creates a populated container for `owner`.
    ///
    /// Builders run in dependency order.
    #[must_use]
    pub fn create(&self, owner: &O) -> DenseContainer {
        let mut slots: Vec<Option<Box<dyn Component>>> = (0..self.layout.span()).map(|_| None).collect();
        for step in &self.steps {
            slots[step.slot] = Some((step.builder)(owner));
        }
        DenseContainer::from_slots_unchecked(Arc::clone(&self.layout), slots)
    }

    /// The class this recipe was synthesized for.
    #[must_use]
    pub fn class(&self) -> &'static OwnerClass {
        self.class
    }

    #[must_use]
    pub fn layout(&self) -> &Arc<DenseLayout> {
        &self.layout
    }

    /// Keys in build order.
    pub fn keys(&self) -> impl Iterator<Item = &RawComponentKey> {
        self.steps.iter().map(|step| &step.key)
    }

    /// Implementation names in build order.
    pub fn impl_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|step| step.impl_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<O> fmt::Debug for ContainerRecipe<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRecipe")
            .field("class", &self.class.name())
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}
