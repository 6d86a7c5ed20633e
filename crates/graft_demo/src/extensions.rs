//! The two extensions the demo installs.
//!
//! `arcana` owns mana and spellbooks. `vitals` owns stamina and aggro, and
//! builds stamina after mana so a caster's stamina can depend on it.

use graft_component::{Component, ComponentKey, ComponentRegistry, OwnerClass};
use graft_factory::{BootstrapContext, ComponentInitializer, CompositionError, CopyFlags, CopyPolicy, copy_component, strategy_fn};

use crate::actors::{Actor, Aggro, Mana, PLAYER, Spellbook, Stamina, WIZARD};

pub const MANA: &str = "arcana:mana";
pub const SPELLBOOK: &str = "arcana:spellbook";
pub const STAMINA: &str = "vitals:stamina";
pub const AGGRO: &str = "vitals:aggro";

/// Typed handles to every demo key.
#[derive(Debug, Clone)]
pub struct DemoKeys {
    pub mana: ComponentKey<Mana>,
    pub spellbook: ComponentKey<Spellbook>,
    pub stamina: ComponentKey<Stamina>,
    pub aggro: ComponentKey<Aggro>,
}

impl DemoKeys {
    /// Looks the keys up once the extensions have run.
    #[must_use]
    pub fn resolve(registry: &ComponentRegistry) -> Option<Self> {
        Some(Self {
            mana: registry.lookup_typed(MANA)?,
            spellbook: registry.lookup_typed(SPELLBOOK)?,
            stamina: registry.lookup_typed(STAMINA)?,
            aggro: registry.lookup_typed(AGGRO)?,
        })
    }
}

pub struct Arcana;

impl ComponentInitializer<Actor> for Arcana {
    fn name(&self) -> &str {
        "arcana"
    }

    fn register_components(&self, ctx: &mut BootstrapContext<'_, Actor>) -> Result<(), CompositionError> {
        let mana = ctx.register_key::<Mana>(MANA)?;
        let spellbook = ctx.register_key::<Spellbook>(SPELLBOOK)?;

        ctx.begin(&PLAYER, &mana)
            .copy_strategy(CopyPolicy::Inventory)
            .end(|_| Mana::full(20))?;
        // Wizards keep their own pool only across exact transitions.
        ctx.begin(&WIZARD, &mana)
            .impl_name("WizardMana")
            .copy_strategy(CopyPolicy::ExactOnly)
            .end(|_| Mana::full(100))?;

        ctx.begin(&PLAYER, &spellbook)
            .after(&mana)
            .filter(|class| class.is_subclass_of(&WIZARD))
            .copy_strategy(CopyPolicy::Always)
            .end(|actor| Spellbook {
                spells: vec![format!("{}'s spark", actor.name)],
            })
    }
}

pub struct Vitals;

impl ComponentInitializer<Actor> for Vitals {
    fn name(&self) -> &str {
        "vitals"
    }

    fn register_components(&self, ctx: &mut BootstrapContext<'_, Actor>) -> Result<(), CompositionError> {
        let mana = ctx.register_key::<Mana>(MANA)?;
        let stamina = ctx.register_key::<Stamina>(STAMINA)?;
        let aggro = ctx.register_key::<Aggro>(AGGRO)?;

        ctx.begin(&PLAYER, &stamina)
            .after(&mana)
            .end(|_| Stamina { current: 50, max: 50 })?;
        ctx.set_default_copy_strategy(&stamina, strategy_fn(respawn_stamina));

        ctx.register_matching(is_hostile, &aggro, |_| Aggro::default());
        ctx.set_default_copy_strategy(&aggro, CopyPolicy::Never);
        Ok(())
    }
}

/// Every concrete creature outside the player branch. Predicates also match
/// ancestors during composition, so the root class must not match.
fn is_hostile(class: &OwnerClass) -> bool {
    class.parent().is_some() && !class.is_subclass_of(&PLAYER)
}

/// Exact transitions keep stamina; anything else comes back at half.
fn respawn_stamina(
    from: &dyn Component,
    to: &mut dyn Component,
    flags: CopyFlags,
) -> Result<(), graft_factory::CopyError> {
    if flags.exact {
        return copy_component(from, to);
    }
    if let (Some(from), Some(to)) = (from.downcast_ref::<Stamina>(), to.downcast_mut::<Stamina>()) {
        to.current = from.current / 2;
    }
    Ok(())
}
