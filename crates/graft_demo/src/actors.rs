//! Demo owner classes and components.

use graft_component::{
    AutoSynced, Component, CopyableComponent, Owner, OwnerClass, OwnerRef, Ticking, capabilities, impl_serde_tag,
};
use serde::{Deserialize, Serialize};

pub static ENTITY: OwnerClass = OwnerClass::root("entity");
pub static PLAYER: OwnerClass = OwnerClass::extends("player", &ENTITY);
pub static WIZARD: OwnerClass = OwnerClass::extends("wizard", &PLAYER);
pub static ZOMBIE: OwnerClass = OwnerClass::extends("zombie", &ENTITY);

/// Every class actors are spawned with.
pub static CLASSES: [&OwnerClass; 4] = [&ENTITY, &PLAYER, &WIZARD, &ZOMBIE];

/// A spawned actor.
#[derive(Debug)]
pub struct Actor {
    pub id: OwnerRef,
    pub name: String,
    class: &'static OwnerClass,
}

impl Actor {
    #[must_use]
    pub fn spawn(name: impl Into<String>, class: &'static OwnerClass) -> Self {
        Self {
            id: OwnerRef::new(),
            name: name.into(),
            class,
        }
    }
}

impl Owner for Actor {
    fn owner_class(&self) -> &'static OwnerClass {
        self.class
    }
}

/// Spell energy. Regenerates on the server and is mirrored to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mana {
    pub amount: u32,
    pub max: u32,
}

impl Mana {
    #[must_use]
    pub fn full(max: u32) -> Self {
        Self { amount: max, max }
    }
}

impl_serde_tag!(Mana);
impl AutoSynced for Mana {}

impl Ticking for Mana {
    fn server_tick(&mut self) {
        self.amount = self.amount.saturating_add(1).min(self.max);
    }
}

impl CopyableComponent for Mana {
    fn copy_from(&mut self, other: &Self) {
        self.clone_from(other);
    }
}

impl Component for Mana {
    capabilities!(serializable, synced, ticking, copyable);
}

/// Physical endurance, drained by casting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamina {
    pub current: u32,
    pub max: u32,
}

impl_serde_tag!(Stamina);

impl Ticking for Stamina {
    fn server_tick(&mut self) {
        if self.current < self.max {
            self.current += 1;
        }
    }
}

impl Component for Stamina {
    capabilities!(serializable, ticking);
}

/// Known spells. Only wizards carry one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spellbook {
    pub spells: Vec<String>,
}

impl_serde_tag!(Spellbook);

impl Component for Spellbook {
    capabilities!(serializable);
}

/// Who a non-player actor is chasing. Never persisted.
#[derive(Debug, Default)]
pub struct Aggro {
    pub target: Option<OwnerRef>,
}

impl Component for Aggro {}
