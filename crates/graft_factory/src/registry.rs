//! Factory registry: collects declarations during bootstrap.
//!
//! Declarations are grouped per owner class and kept in declaration order.
//! A class may declare each key at most once; a second declaration for the
//! same (class, key) is rejected immediately, naming both declarations.
//!
//! [`FactoryRegistry::merged_for`] produces the effective declaration list
//! of a concrete class: its own entries first, then those of each ancestor
//! for keys not seen yet, so the most specific class wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use graft_component::{Component, ComponentKey, Owner, OwnerClass, OwnerClassId};
use tracing::debug;

use crate::copy::CopyStrategies;
use crate::declaration::{ClassPredicate, FactoryDeclaration, PredicateDeclaration};
use crate::error::CompositionError;
use crate::registration::Registration;

struct ClassFactories<O> {
    class: &'static OwnerClass,
    declarations: Vec<FactoryDeclaration<O>>,
}

/// Registry of factory declarations and copy strategies.
pub struct FactoryRegistry<O> {
    classes: Vec<ClassFactories<O>>,
    by_class: HashMap<OwnerClassId, usize>,
    predicated: Vec<PredicateDeclaration<O>>,
    known: Vec<&'static OwnerClass>,
    copy: CopyStrategies,
    origin: Arc<str>,
}

impl<O: Owner + 'static> FactoryRegistry<O> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            by_class: HashMap::new(),
            predicated: Vec::new(),
            known: Vec::new(),
            copy: CopyStrategies::new(),
            origin: Arc::from(""),
        }
    }

    /// Sets the extension name recorded on subsequent declarations.
    pub fn set_origin(&mut self, origin: &str) {
        self.origin = Arc::from(origin);
    }

    /// Declares `builder` as the factory for `key` on `class`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::DuplicateFactory`] if `class` already
    /// declares `key`.
    pub fn register_for<C, F>(
        &mut self,
        class: &'static OwnerClass,
        key: &ComponentKey<C>,
        builder: F,
    ) -> Result<(), CompositionError>
    where
        C: Component,
        F: Fn(&O) -> C + Send + Sync + 'static,
    {
        self.begin(class, key).end(builder)
    }

    /// Starts a declaration with options (dependencies, filter, copy
    /// strategy). Finish it with [`Registration::end`].
    pub fn begin<C: Component>(&mut self, class: &'static OwnerClass, key: &ComponentKey<C>) -> Registration<'_, O, C> {
        Registration::new(self, class, key.clone())
    }

    /// Declares a factory for every class matching `predicate`.
    ///
    /// Matching is evaluated when a class is composed. A predicate entry
    /// colliding with another declaration on the same class is reported then.
    pub fn register_matching<C, P, F>(&mut self, predicate: P, key: &ComponentKey<C>, builder: F)
    where
        C: Component,
        P: Fn(&OwnerClass) -> bool + Send + Sync + 'static,
        F: Fn(&O) -> C + Send + Sync + 'static,
    {
        self.declare_matching(Arc::new(predicate), FactoryDeclaration::new(key, builder));
    }

    /// Adds a prepared declaration to `class`.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::DuplicateFactory`] if `class` already
    /// declares the same key.
    pub fn declare(
        &mut self,
        class: &'static OwnerClass,
        mut declaration: FactoryDeclaration<O>,
    ) -> Result<(), CompositionError> {
        declaration.origin = Arc::clone(&self.origin);

        let slot = match self.by_class.get(&class.id()) {
            Some(&slot) => slot,
            None => {
                self.classes.push(ClassFactories {
                    class,
                    declarations: Vec::new(),
                });
                self.by_class.insert(class.id(), self.classes.len() - 1);
                self.classes.len() - 1
            }
        };

        let entries = &mut self.classes[slot].declarations;
        if let Some(existing) = entries.iter().find(|d| d.key == declaration.key) {
            return Err(duplicate(class, existing, &declaration));
        }

        debug!(
            class = class.name(),
            key = %declaration.key,
            implementation = declaration.impl_name,
            origin = %declaration.origin,
            "declared component factory"
        );
        entries.push(declaration);
        Ok(())
    }

    /// Adds a prepared declaration for every class matching `predicate`.
    pub fn declare_matching(&mut self, predicate: ClassPredicate, mut declaration: FactoryDeclaration<O>) {
        declaration.origin = Arc::clone(&self.origin);
        debug!(
            key = %declaration.key,
            implementation = declaration.impl_name,
            origin = %declaration.origin,
            "declared predicate component factory"
        );
        self.predicated.push(PredicateDeclaration {
            predicate,
            declaration,
        });
    }

    /// Declarations made directly on `class`, in declaration order.
    #[must_use]
    pub fn declarations_on(&self, class: &OwnerClass) -> &[FactoryDeclaration<O>] {
        match self.by_class.get(&class.id()) {
            Some(&slot) => &self.classes[slot].declarations,
            None => &[],
        }
    }

    /// Returns `true` if `class` has declarations of its own, static or by
    /// predicate.
    #[must_use]
    pub fn declares(&self, class: &OwnerClass) -> bool {
        !self.declarations_on(class).is_empty() || self.predicated.iter().any(|p| p.matches(class))
    }

    /// Classes with static declarations, in first-declaration order.
    pub fn declared_classes(&self) -> impl Iterator<Item = &'static OwnerClass> + '_ {
        self.classes.iter().map(|c| c.class)
    }

    /// Marks `class` as one that owners will be created for, so bootstrap
    /// composes it even when it only receives predicate declarations.
    pub fn register_class(&mut self, class: &'static OwnerClass) {
        if !self.known.iter().any(|known| known.id() == class.id()) {
            self.known.push(class);
        }
    }

    /// Every class bootstrap must compose: classes with static declarations
    /// first, then registered classes not already listed.
    #[must_use]
    pub fn classes_to_compose(&self) -> Vec<&'static OwnerClass> {
        let mut classes: Vec<&'static OwnerClass> = self.declared_classes().collect();
        for &class in &self.known {
            if !self.by_class.contains_key(&class.id()) {
                classes.push(class);
            }
        }
        classes
    }

    /// Effective declarations for `class`: own entries (static, then
    /// predicate) followed by ancestor entries for keys not yet present.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::DuplicateFactory`] if a predicate
    /// declaration collides with another declaration on the same class.
    pub fn merged_for(&self, class: &OwnerClass) -> Result<Vec<FactoryDeclaration<O>>, CompositionError> {
        let mut merged: Vec<FactoryDeclaration<O>> = Vec::new();

        for ancestor in class.ancestors() {
            let level_start = merged.len();
            let level = self.declarations_on(ancestor).iter().chain(
                self.predicated
                    .iter()
                    .filter(|p| p.matches(ancestor))
                    .map(|p| &p.declaration),
            );

            for declaration in level {
                match merged.iter().position(|m| m.key == declaration.key) {
                    Some(pos) if pos >= level_start => {
                        return Err(duplicate(ancestor, &merged[pos], declaration));
                    }
                    Some(_) => {}
                    None => merged.push(declaration.clone()),
                }
            }
        }

        Ok(merged)
    }

    #[must_use]
    pub fn copy_strategies(&self) -> &CopyStrategies {
        &self.copy
    }

    pub fn copy_strategies_mut(&mut self) -> &mut CopyStrategies {
        &mut self.copy
    }
}

impl<O: Owner + 'static> Default for FactoryRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for FactoryRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes = f.debug_map();
        for entry in &self.classes {
            classes.entry(&entry.class.name(), &entry.declarations);
        }
        classes.finish()
    }
}

fn duplicate<O>(
    class: &OwnerClass,
    existing: &FactoryDeclaration<O>,
    conflicting: &FactoryDeclaration<O>,
) -> CompositionError {
    CompositionError::DuplicateFactory {
        key: conflicting.key.id().to_string(),
        class: class.name(),
        existing: existing.describe(),
        conflicting: conflicting.describe(),
    }
}

#[cfg(test)]
mod tests {
    use graft_component::ComponentRegistry;

    use super::*;

    static ENTITY: OwnerClass = OwnerClass::root("entity");
    static PLAYER: OwnerClass = OwnerClass::extends("player", &ENTITY);
    static WIZARD: OwnerClass = OwnerClass::extends("wizard", &PLAYER);

    struct Actor(&'static OwnerClass);
    impl Owner for Actor {
        fn owner_class(&self) -> &'static OwnerClass {
            self.0
        }
    }

    #[derive(Debug)]
    struct Mana(u32);
    impl Component for Mana {}

    #[derive(Debug)]
    struct Stamina;
    impl Component for Stamina {}

    #[derive(Debug)]
    struct Health;
    impl Component for Health {}

    struct Keys {
        mana: ComponentKey<Mana>,
        stamina: ComponentKey<Stamina>,
        health: ComponentKey<Health>,
    }

    fn keys() -> Keys {
        let mut registry = ComponentRegistry::new();
        Keys {
            mana: registry.register("mana").unwrap(),
            stamina: registry.register("stamina").unwrap(),
            health: registry.register("health").unwrap(),
        }
    }

    fn merged_ids(factories: &FactoryRegistry<Actor>, class: &OwnerClass) -> Vec<String> {
        factories
            .merged_for(class)
            .unwrap()
            .iter()
            .map(|d| d.key().id().to_string())
            .collect()
    }

    #[test]
    fn test_duplicate_declaration_names_both() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.set_origin("arcana");
        factories.register_for(&PLAYER, &keys.mana, |_| Mana(0)).unwrap();
        factories.set_origin("sorcery");
        let err = factories
            .begin(&PLAYER, &keys.mana)
            .impl_name("SorceryMana")
            .end(|_| Mana(1))
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("`mana` on `player`"), "{message}");
        assert!(message.contains("from `arcana`"), "{message}");
        assert!(message.contains("SorceryMana (from `sorcery`)"), "{message}");
    }

    #[test]
    fn test_same_key_on_different_classes_is_allowed() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.register_for(&PLAYER, &keys.mana, |_| Mana(0)).unwrap();
        factories.register_for(&WIZARD, &keys.mana, |_| Mana(100)).unwrap();
        assert_eq!(factories.declarations_on(&PLAYER).len(), 1);
        assert_eq!(factories.declarations_on(&WIZARD).len(), 1);
        assert!(factories.declarations_on(&ENTITY).is_empty());
    }

    #[test]
    fn test_merge_most_specific_first() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.register_for(&ENTITY, &keys.health, |_| Health).unwrap();
        factories.register_for(&PLAYER, &keys.mana, |_| Mana(0)).unwrap();
        factories.register_for(&PLAYER, &keys.stamina, |_| Stamina).unwrap();
        factories.register_for(&WIZARD, &keys.mana, |_| Mana(100)).unwrap();

        assert_eq!(merged_ids(&factories, &WIZARD), ["mana", "stamina", "health"]);
        assert_eq!(merged_ids(&factories, &PLAYER), ["mana", "stamina", "health"]);
        assert_eq!(merged_ids(&factories, &ENTITY), ["health"]);

        let merged = factories.merged_for(&WIZARD).unwrap();
        let mana = merged[0].build(&Actor(&WIZARD));
        assert_eq!(mana.downcast_ref::<Mana>().map(|m| m.0), Some(100));
    }

    #[test]
    fn test_predicate_declarations_apply_to_matching_classes() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.register_matching(|class| class.is_subclass_of(&PLAYER), &keys.stamina, |_| Stamina);

        assert!(factories.declares(&PLAYER));
        assert!(factories.declares(&WIZARD));
        assert!(!factories.declares(&ENTITY));
        assert_eq!(merged_ids(&factories, &WIZARD), ["stamina"]);
        assert!(merged_ids(&factories, &ENTITY).is_empty());
    }

    #[test]
    fn test_predicate_colliding_with_static_declaration() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.register_for(&PLAYER, &keys.stamina, |_| Stamina).unwrap();
        factories.register_matching(|class| class == &PLAYER, &keys.stamina, |_| Stamina);

        assert!(matches!(
            factories.merged_for(&PLAYER),
            Err(CompositionError::DuplicateFactory { class: "player", .. })
        ));
    }

    #[test]
    fn test_declared_classes_in_first_declaration_order() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.register_for(&WIZARD, &keys.mana, |_| Mana(1)).unwrap();
        factories.register_for(&ENTITY, &keys.health, |_| Health).unwrap();
        factories.register_for(&WIZARD, &keys.stamina, |_| Stamina).unwrap();

        let names: Vec<&str> = factories.declared_classes().map(OwnerClass::name).collect();
        assert_eq!(names, ["wizard", "entity"]);
    }

    #[test]
    fn test_registered_classes_join_the_compose_list_once() {
        let keys = keys();
        let mut factories = FactoryRegistry::<Actor>::new();
        factories.register_for(&WIZARD, &keys.mana, |_| Mana(1)).unwrap();
        factories.register_class(&PLAYER);
        factories.register_class(&WIZARD);
        factories.register_class(&PLAYER);

        let names: Vec<&str> = factories
            .classes_to_compose()
            .into_iter()
            .map(OwnerClass::name)
            .collect();
        assert_eq!(names, ["wizard", "player"]);
    }
}
