//! Factory declarations.

use std::fmt;
use std::sync::Arc;

use graft_component::{Component, ComponentKey, OwnerClass, RawComponentKey};

/// Builds one component for an owner.
pub type ComponentBuilder<O> = Arc<dyn Fn(&O) -> Box<dyn Component> + Send + Sync>;

/// Selects the owner classes a predicate declaration applies to.
pub type ClassPredicate = Arc<dyn Fn(&OwnerClass) -> bool + Send + Sync>;

/// One extension's request to attach a component to an owner class.
pub struct FactoryDeclaration<O> {
    pub(crate) key: RawComponentKey,
    pub(crate) builder: ComponentBuilder<O>,
    pub(crate) impl_name: &'static str,
    pub(crate) after: Vec<RawComponentKey>,
    pub(crate) origin: Arc<str>,
}

impl<O: 'static> FactoryDeclaration<O> {
    /// Declares `builder` as the factory for `key`.
    ///
    /// The implementation name defaults to the Rust type name of `C`.
    pub fn new<C, F>(key: &ComponentKey<C>, builder: F) -> Self
    where
        C: Component,
        F: Fn(&O) -> C + Send + Sync + 'static,
    {
        let builder: ComponentBuilder<O> =
            Arc::new(move |owner: &O| -> Box<dyn Component> { Box::new(builder(owner)) });
        Self {
            key: key.raw().clone(),
            builder,
            impl_name: std::any::type_name::<C>(),
            after: Vec::new(),
            origin: Arc::from(""),
        }
    }
}

impl<O> FactoryDeclaration<O> {
    /// Requires `dependency` to be built before this component.
    #[must_use]
    pub fn after(mut self, dependency: &RawComponentKey) -> Self {
        if !self.after.contains(dependency) {
            self.after.push(dependency.clone());
        }
        self
    }

    #[must_use]
    pub fn with_impl_name(mut self, impl_name: &'static str) -> Self {
        self.impl_name = impl_name;
        self
    }

    #[must_use]
    pub fn key(&self) -> &RawComponentKey {
        &self.key
    }

    #[must_use]
    pub fn impl_name(&self) -> &'static str {
        self.impl_name
    }

    #[must_use]
    pub fn dependencies(&self) -> &[RawComponentKey] {
        &self.after
    }

    /// Name of the extension that made this declaration.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Runs the builder for `owner`.
    #[must_use]
    pub fn build(&self, owner: &O) -> Box<dyn Component> {
        (self.builder)(owner)
    }

    pub(crate) fn describe(&self) -> String {
        if self.origin.is_empty() {
            self.impl_name.to_owned()
        } else {
            format!("{} (from `{}`)", self.impl_name, self.origin)
        }
    }
}

impl<O> Clone for FactoryDeclaration<O> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            builder: Arc::clone(&self.builder),
            impl_name: self.impl_name,
            after: self.after.clone(),
            origin: Arc::clone(&self.origin),
        }
    }
}

impl<O> fmt::Debug for FactoryDeclaration<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryDeclaration")
            .field("key", &self.key)
            .field("impl_name", &self.impl_name)
            .field("after", &self.after)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// A declaration bound to every class matching a predicate.
pub(crate) struct PredicateDeclaration<O> {
    pub(crate) predicate: ClassPredicate,
    pub(crate) declaration: FactoryDeclaration<O>,
}

impl<O> PredicateDeclaration<O> {
    pub(crate) fn matches(&self, class: &OwnerClass) -> bool {
        (self.predicate)(class)
    }
}

#[cfg(test)]
mod tests {
    use graft_component::{ComponentRegistry, Owner};

    use super::*;

    static ENTITY: OwnerClass = OwnerClass::root("entity");

    struct Dummy;
    impl Owner for Dummy {
        fn owner_class(&self) -> &'static OwnerClass {
            &ENTITY
        }
    }

    #[derive(Debug, PartialEq)]
    struct Mana(u32);
    impl Component for Mana {}

    #[derive(Debug)]
    struct Stamina;
    impl Component for Stamina {}

    #[test]
    fn test_declaration_builds_component() {
        let mut registry = ComponentRegistry::new();
        let mana = registry.register::<Mana>("mana").unwrap();
        let decl = FactoryDeclaration::<Dummy>::new(&mana, |_| Mana(3));

        let built = decl.build(&Dummy);
        assert_eq!(built.downcast_ref::<Mana>(), Some(&Mana(3)));
        assert!(decl.impl_name().ends_with("Mana"));
        assert_eq!(decl.describe(), decl.impl_name());
    }

    #[test]
    fn test_after_deduplicates() {
        let mut registry = ComponentRegistry::new();
        let mana = registry.register::<Mana>("mana").unwrap();
        let stamina = registry.register::<Stamina>("stamina").unwrap();
        let decl = FactoryDeclaration::<Dummy>::new(&stamina, |_| Stamina)
            .after(mana.raw())
            .after(mana.raw())
            .with_impl_name("StaminaImpl");

        assert_eq!(decl.dependencies(), std::slice::from_ref(mana.raw()));
        assert_eq!(decl.impl_name(), "StaminaImpl");
    }
}
