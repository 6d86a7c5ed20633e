//! Two-phase bootstrap.
//!
//! Extensions register component keys, factories and copy strategies on an
//! open [`Bootstrap`], each through its own [`BootstrapContext`] so every
//! declaration records which extension made it. [`Bootstrap::seal`] then
//! freezes the registry, composes every class that has static declarations
//! or was registered as an owner class, and hands back the read-only
//! [`Runtime`]. Any error aborts bootstrap.
//!
//! Predicate and filtered declarations only reach the classes they match,
//! so register the concrete owner classes up front to have their
//! composition errors reported at seal.

use std::sync::Arc;

use graft_component::{
    Component, ComponentContainer, ComponentKey, ComponentRegistry, DenseContainer, Owner, OwnerClass,
};
use tracing::info;

use crate::composer::Composer;
use crate::copy::{CopyFlags, CopyStrategies, CopyStrategy};
use crate::error::{CompositionError, CopyError};
use crate::registration::Registration;
use crate::registry::FactoryRegistry;

/// An extension's component registration entry point.
pub trait ComponentInitializer<O> {
    /// Extension name, recorded on its declarations and in errors.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Any error aborts bootstrap.
    fn register_components(&self, ctx: &mut BootstrapContext<'_, O>) -> Result<(), CompositionError>;
}

/// Registration access for one extension.
pub struct BootstrapContext<'a, O> {
    registry: &'a mut ComponentRegistry,
    factories: &'a mut FactoryRegistry<O>,
}

impl<O: Owner + 'static> BootstrapContext<'_, O> {
    /// Registers (or fetches) a component key.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::Registry`] on an invalid id or a type
    /// mismatch with an earlier registration.
    pub fn register_key<C: Component>(&mut self, id: &str) -> Result<ComponentKey<C>, CompositionError> {
        Ok(self.registry.register(id)?)
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &*self.registry
    }

    /// # Errors
    ///
    /// See [`FactoryRegistry::register_for`].
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
        self.factories.register_for(class, key, builder)
    }

    pub fn begin<C: Component>(&mut self, class: &'static OwnerClass, key: &ComponentKey<C>) -> Registration<'_, O, C> {
        self.factories.begin(class, key)
    }

    /// See [`Bootstrap::register_classes`].
    pub fn register_class(&mut self, class: &'static OwnerClass) {
        self.factories.register_class(class);
    }

    pub fn register_matching<C, P, F>(&mut self, predicate: P, key: &ComponentKey<C>, builder: F)
    where
        C: Component,
        P: Fn(&OwnerClass) -> bool + Send + Sync + 'static,
        F: Fn(&O) -> C + Send + Sync + 'static,
    {
        self.factories.register_matching(predicate, key, builder);
    }

    /// Sets the copy strategy for `key` when no class binding applies.
    pub fn set_default_copy_strategy<C: Component, S: CopyStrategy + 'static>(&mut self, key: &ComponentKey<C>, strategy: S) {
        self.factories.copy_strategies_mut().set_default(key.raw(), Arc::new(strategy));
    }

    /// Binds a copy strategy to `key` on `class` and its subclasses.
    pub fn bind_copy_strategy<C: Component, S: CopyStrategy + 'static>(
        &mut self,
        key: &ComponentKey<C>,
        class: &'static OwnerClass,
        strategy: S,
    ) {
        self.factories
            .copy_strategies_mut()
            .bind(key.raw(), class, Arc::new(strategy));
    }
}

/// Open bootstrap phase.
pub struct Bootstrap<O> {
    registry: ComponentRegistry,
    factories: FactoryRegistry<O>,
    extensions: Vec<String>,
}

impl<O: Owner + 'static> Bootstrap<O> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(ComponentRegistry::new())
    }

    /// Starts from a registry that already holds keys.
    #[must_use]
    pub fn with_registry(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            factories: FactoryRegistry::new(),
            extensions: Vec::new(),
        }
    }

    /// Registration context for `extension`.
    pub fn context(&mut self, extension: &str) -> BootstrapContext<'_, O> {
        self.factories.set_origin(extension);
        BootstrapContext {
            registry: &mut self.registry,
            factories: &mut self.factories,
        }
    }

    /// Runs `initializers` in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing initializer and returns
    /// [`CompositionError::Initializer`] wrapping its error.
    pub fn run(&mut self, initializers: &[&dyn ComponentInitializer<O>]) -> Result<(), CompositionError> {
        for initializer in initializers {
            let name = initializer.name().to_owned();
            let mut ctx = self.context(&name);
            initializer
                .register_components(&mut ctx)
                .map_err(|source| CompositionError::Initializer {
                    extension: name.clone(),
                    source: Box::new(source),
                })?;
            info!(extension = %name, "registered extension components");
            self.extensions.push(name);
        }
        self.factories.set_origin("");
        Ok(())
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Registers the owner classes containers will be created for. Each is
    /// composed at [`Bootstrap::seal`].
    pub fn register_classes(&mut self, classes: &[&'static OwnerClass]) {
        for &class in classes {
            self.factories.register_class(class);
        }
    }

    /// Extensions run so far, in order.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Closes registration and composes every declared or registered class.
    ///
    /// # Errors
    ///
    /// Returns the first [`CompositionError`] met while composing.
    pub fn seal(mut self) -> Result<Runtime<O>, CompositionError> {
        self.registry.seal();
        let composer = Composer::new(self.factories);

        let classes = composer.factories().classes_to_compose();
        for &class in &classes {
            composer.recipe_for(class)?;
        }

        info!(
            keys = self.registry.len(),
            classes = classes.len(),
            recipes = composer.synthesized_count(),
            extensions = self.extensions.len(),
            "bootstrap sealed"
        );
        Ok(Runtime {
            registry: Arc::new(self.registry),
            composer,
        })
    }
}

impl<O: Owner + 'static> Default for Bootstrap<O> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sealed, shareable component runtime.
pub struct Runtime<O> {
    registry: Arc<ComponentRegistry>,
    composer: Composer<O>,
}

impl<O: Owner + 'static> Runtime<O> {
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn composer(&self) -> &Composer<O> {
        &self.composer
    }

    #[must_use]
    pub fn copy_strategies(&self) -> &CopyStrategies {
        self.composer.factories().copy_strategies()
    }

    /// Creates the populated container for `owner`.
    ///
    /// # Errors
    ///
    /// See [`Composer::recipe_for`].
    pub fn create_container(&self, owner: &O) -> Result<DenseContainer, CompositionError> {
        self.composer.create_container(owner)
    }

    /// Copies components from `from` into `to`, the container of
    /// `to_owner`. Returns the number of keys copied.
    ///
    /// # Errors
    ///
    /// See [`CopyStrategies::copy_container`].
    pub fn copy_components<F, T>(&self, from: &F, to: &mut T, to_owner: &O, flags: CopyFlags) -> Result<usize, CopyError>
    where
        F: ComponentContainer + ?Sized,
        T: ComponentContainer + ?Sized,
    {
        self.copy_strategies()
            .copy_container(from, to, to_owner.owner_class(), flags)
    }
}

#[cfg(test)]
mod tests {
    use graft_component::{ContainerExt, CopyableComponent, capabilities};

    use super::*;
    use crate::copy::CopyPolicy;

    static ENTITY: OwnerClass = OwnerClass::root("entity");
    static PLAYER: OwnerClass = OwnerClass::extends("player", &ENTITY);
    static WIZARD: OwnerClass = OwnerClass::extends("wizard", &PLAYER);
    static ZOMBIE: OwnerClass = OwnerClass::extends("zombie", &ENTITY);

    struct Actor(&'static OwnerClass);
    impl Owner for Actor {
        fn owner_class(&self) -> &'static OwnerClass {
            self.0
        }
    }

    #[derive(Debug, PartialEq)]
    struct Mana {
        amount: u32,
    }
    impl CopyableComponent for Mana {
        fn copy_from(&mut self, other: &Self) {
            self.amount = other.amount;
        }
    }
    impl Component for Mana {
        capabilities!(copyable);
    }

    #[derive(Debug, PartialEq)]
    struct Stamina(u32);
    impl Component for Stamina {}

    struct Arcana;
    impl ComponentInitializer<Actor> for Arcana {
        fn name(&self) -> &str {
            "arcana"
        }

        fn register_components(&self, ctx: &mut BootstrapContext<'_, Actor>) -> Result<(), CompositionError> {
            let mana = ctx.register_key::<Mana>("arcana:mana")?;
            ctx.register_for(&PLAYER, &mana, |_| Mana { amount: 0 })?;
            ctx.begin(&WIZARD, &mana)
                .copy_strategy(CopyPolicy::ExactOnly)
                .end(|_| Mana { amount: 100 })
        }
    }

    struct Vitals;
    impl ComponentInitializer<Actor> for Vitals {
        fn name(&self) -> &str {
            "vitals"
        }

        fn register_components(&self, ctx: &mut BootstrapContext<'_, Actor>) -> Result<(), CompositionError> {
            let mana = ctx.register_key::<Mana>("arcana:mana")?;
            let stamina = ctx.register_key::<Stamina>("vitals:stamina")?;
            ctx.set_default_copy_strategy(&stamina, CopyPolicy::Never);
            ctx.begin(&PLAYER, &stamina)
                .after(&mana)
                .end(|_| Stamina(10))
        }
    }

    struct Clash;
    impl ComponentInitializer<Actor> for Clash {
        fn name(&self) -> &str {
            "clash"
        }

        fn register_components(&self, ctx: &mut BootstrapContext<'_, Actor>) -> Result<(), CompositionError> {
            ctx.register_key::<Stamina>("arcana:mana")?;
            Ok(())
        }
    }

    /// Gives zombies stamina that needs mana, which nothing declares for them.
    struct Hunger;
    impl ComponentInitializer<Actor> for Hunger {
        fn name(&self) -> &str {
            "hunger"
        }

        fn register_components(&self, ctx: &mut BootstrapContext<'_, Actor>) -> Result<(), CompositionError> {
            let mana = ctx.register_key::<Mana>("arcana:mana")?;
            let stamina = ctx.register_key::<Stamina>("vitals:stamina")?;
            ctx.begin(&ENTITY, &stamina)
                .after(&mana)
                .filter(|class| class.name() == "zombie")
                .end(|_| Stamina(1))
        }
    }

    fn sealed() -> Runtime<Actor> {
        let mut bootstrap = Bootstrap::<Actor>::new();
        bootstrap.run(&[&Arcana, &Vitals]).unwrap();
        assert_eq!(bootstrap.extensions(), ["arcana", "vitals"]);
        bootstrap.seal().unwrap()
    }

    #[test]
    fn test_seal_composes_declared_classes() {
        let runtime = sealed();
        assert!(runtime.registry().is_sealed());
        assert_eq!(runtime.registry().len(), 2);
        assert_eq!(runtime.composer().synthesized_count(), 2);

        let mana = runtime.registry().lookup_typed::<Mana>("arcana:mana").unwrap();
        let stamina = runtime.registry().lookup_typed::<Stamina>("vitals:stamina").unwrap();

        let wizard = runtime.create_container(&Actor(&WIZARD)).unwrap();
        assert_eq!(wizard.get(&mana), Some(&Mana { amount: 100 }));
        assert_eq!(wizard.get(&stamina), Some(&Stamina(10)));

        let player = runtime.create_container(&Actor(&PLAYER)).unwrap();
        assert_eq!(player.get(&mana), Some(&Mana { amount: 0 }));
    }

    #[test]
    fn test_declarations_record_their_extension() {
        let runtime = sealed();
        let factories = runtime.composer().factories();
        let origins: Vec<&str> = factories
            .declarations_on(&PLAYER)
            .iter()
            .map(|d| d.origin())
            .collect();
        assert_eq!(origins, ["arcana", "vitals"]);
    }

    #[test]
    fn test_failing_extension_is_named() {
        let mut bootstrap = Bootstrap::<Actor>::new();
        let err = bootstrap.run(&[&Arcana, &Clash, &Vitals]).unwrap_err();

        match &err {
            CompositionError::Initializer { extension, source } => {
                assert_eq!(extension, "clash");
                assert!(matches!(**source, CompositionError::Registry(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(bootstrap.extensions(), ["arcana"]);
    }

    #[test]
    fn test_seal_surfaces_composition_errors() {
        let mut bootstrap = Bootstrap::<Actor>::new();
        bootstrap.run(&[&Vitals]).unwrap();
        assert!(matches!(
            bootstrap.seal(),
            Err(CompositionError::UnsatisfiedDependencies { class: "player", .. })
        ));
    }

    #[test]
    fn test_seal_checks_registered_classes_reached_by_filters() {
        let mut bootstrap = Bootstrap::<Actor>::new();
        bootstrap.register_classes(&[&ENTITY, &ZOMBIE]);
        bootstrap.run(&[&Hunger]).unwrap();

        match bootstrap.seal() {
            Err(CompositionError::UnsatisfiedDependencies { class, .. }) => assert_eq!(class, "zombie"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("seal accepted an unsatisfied filtered declaration"),
        }
    }

    #[test]
    fn test_seal_composes_registered_classes() {
        let mut bootstrap = Bootstrap::<Actor>::new();
        bootstrap.register_classes(&[&WIZARD, &ZOMBIE]);
        bootstrap.run(&[&Arcana]).unwrap();
        let runtime = bootstrap.seal().unwrap();

        // player, wizard, then zombie reusing the empty entity recipe.
        assert_eq!(runtime.composer().cached_count(), 4);
        assert!(runtime.create_container(&Actor(&ZOMBIE)).unwrap().is_empty());
    }

    #[test]
    fn test_copy_uses_bound_policy() {
        let runtime = sealed();
        let mana = runtime.registry().lookup_typed::<Mana>("arcana:mana").unwrap();

        let old = runtime.create_container(&Actor(&WIZARD)).unwrap();
        let mut drained = runtime.create_container(&Actor(&WIZARD)).unwrap();
        drained.get_mut(&mana).unwrap().amount = 3;

        let mut respawned = runtime.create_container(&Actor(&WIZARD)).unwrap();
        runtime
            .copy_components(&drained, &mut respawned, &Actor(&WIZARD), CopyFlags::default())
            .unwrap();
        assert_eq!(respawned.get(&mana), Some(&Mana { amount: 100 }));

        runtime
            .copy_components(&drained, &mut respawned, &Actor(&WIZARD), CopyFlags::exact())
            .unwrap();
        assert_eq!(respawned.get(&mana), Some(&Mana { amount: 3 }));

        // Players have no binding and use the generic copy.
        let mut player = runtime.create_container(&Actor(&PLAYER)).unwrap();
        runtime
            .copy_components(&old, &mut player, &Actor(&PLAYER), CopyFlags::default())
            .unwrap();
        assert_eq!(player.get(&mana), Some(&Mana { amount: 100 }));
    }
}
