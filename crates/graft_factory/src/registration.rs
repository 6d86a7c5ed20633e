//! Fluent factory registration.

use std::sync::Arc;

use graft_component::{Component, ComponentKey, Owner, OwnerClass, RawComponentKey};

use crate::copy::CopyStrategy;
use crate::declaration::FactoryDeclaration;
use crate::error::CompositionError;
use crate::registry::FactoryRegistry;

/// A factory declaration under construction.
///
/// ```rust,ignore
/// factories
///     .begin(&PLAYER, &stamina)
///     .after(&mana)
///     .copy_strategy(CopyPolicy::Always)
///     .end(|player| Stamina::for_player(player))?;
/// ```
#[must_use = "a registration does nothing until `end` is called"]
pub struct Registration<'a, O, C> {
    registry: &'a mut FactoryRegistry<O>,
    class: &'static OwnerClass,
    key: ComponentKey<C>,
    after: Vec<RawComponentKey>,
    filter: Option<Arc<dyn Fn(&OwnerClass) -> bool + Send + Sync>>,
    impl_name: Option<&'static str>,
    copy: Option<Arc<dyn CopyStrategy>>,
}

impl<'a, O: Owner + 'static, C: Component> Registration<'a, O, C> {
    pub(crate) fn new(registry: &'a mut FactoryRegistry<O>, class: &'static OwnerClass, key: ComponentKey<C>) -> Self {
        Self {
            registry,
            class,
            key,
            after: Vec::new(),
            filter: None,
            impl_name: None,
            copy: None,
        }
    }

    /// Builds this component after `dependency`.
    pub fn after<D: Component>(self, dependency: &ComponentKey<D>) -> Self {
        self.after_raw(dependency.raw())
    }

    pub fn after_raw(mut self, dependency: &RawComponentKey) -> Self {
        self.after.push(dependency.clone());
        self
    }

    /// Restricts the declaration to subclasses of the target class that
    /// satisfy `predicate`. The target class itself is included if it
    /// satisfies `predicate`.
    pub fn filter<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&OwnerClass) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(predicate));
        self
    }

    /// Overrides the implementation name shown in diagnostics.
    pub fn impl_name(mut self, name: &'static str) -> Self {
        self.impl_name = Some(name);
        self
    }

    /// Binds a copy strategy to (key, target class).
    pub fn copy_strategy<S: CopyStrategy + 'static>(mut self, strategy: S) -> Self {
        self.copy = Some(Arc::new(strategy));
        self
    }

    /// Completes the declaration with `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::DuplicateFactory`] if the target class
    /// already declares this key.
    pub fn end<F>(self, builder: F) -> Result<(), CompositionError>
    where
        F: Fn(&O) -> C + Send + Sync + 'static,
    {
        let Self {
            registry,
            class,
            key,
            after,
            filter,
            impl_name,
            copy,
        } = self;

        let mut declaration = FactoryDeclaration::new(&key, builder);
        for dependency in &after {
            declaration = declaration.after(dependency);
        }
        if let Some(name) = impl_name {
            declaration = declaration.with_impl_name(name);
        }

        match filter {
            Some(filter) => {
                registry.register_class(class);
                registry.declare_matching(
                    Arc::new(move |candidate: &OwnerClass| candidate.is_subclass_of(class) && filter(candidate)),
                    declaration,
                );
            }
            None => registry.declare(class, declaration)?,
        }

        if let Some(strategy) = copy {
            registry.copy_strategies_mut().bind(key.raw(), class, strategy);
        }
        Ok(())
    }
}
