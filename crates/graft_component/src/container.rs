//! Component containers.
//!
//! A container holds the components attached to one owner, at most one per
//! key. Components are never removed once present, so `has(k)` implies
//! `get(k).is_some()` for the container's whole lifetime.
//!
//! Two storage strategies are provided:
//!
//! - [`SparseContainer`]: hash-indexed, accepts any key, replaces on `put`.
//! - [`DenseContainer`]: a pre-sized slot vector indexed by
//!   `key.index() - min_index`. All containers built from the same recipe
//!   share one [`DenseLayout`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::component::{Component, TickSide};
use crate::error::ContainerError;
use crate::key::{ComponentKey, RawComponentKey};

/// Per-owner component storage.
pub trait ComponentContainer: fmt::Debug + Send + Sync {
    /// Returns the component stored under `key`, if any.
    fn get_raw(&self, key: &RawComponentKey) -> Option<&dyn Component>;

    fn get_raw_mut(&mut self, key: &RawComponentKey) -> Option<&mut dyn Component>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::TypeMismatch`] if `value` is not of the key's
    /// component type. Strategies may add their own errors.
    fn put_raw(&mut self, key: &RawComponentKey, value: Box<dyn Component>) -> Result<(), ContainerError>;

    /// Keys with a present component.
    fn keys(&self) -> Box<dyn Iterator<Item = &RawComponentKey> + '_>;

    /// Number of present components.
    fn len(&self) -> usize;

    fn has(&self, key: &RawComponentKey) -> bool {
        self.get_raw(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ticks every component with the ticking capability.
    fn tick_components(&mut self, side: TickSide) {
        let keys: Vec<RawComponentKey> = self.keys().cloned().collect();
        for key in &keys {
            if let Some(ticking) = self.get_raw_mut(key).and_then(|c| c.as_ticking_mut()) {
                ticking.tick(side);
            }
        }
    }
}

/// Typed access on top of [`ComponentContainer`].
pub trait ContainerExt: ComponentContainer {
    fn get<C: Component>(&self, key: &ComponentKey<C>) -> Option<&C> {
        self.get_raw(key.raw()).and_then(|c| c.downcast_ref::<C>())
    }

    fn get_mut<C: Component>(&mut self, key: &ComponentKey<C>) -> Option<&mut C> {
        self.get_raw_mut(key.raw()).and_then(|c| c.downcast_mut::<C>())
    }

    /// # Errors
    ///
    /// See [`ComponentContainer::put_raw`].
    fn put<C: Component>(&mut self, key: &ComponentKey<C>, value: C) -> Result<(), ContainerError> {
        self.put_raw(key.raw(), Box::new(value))
    }

    fn contains<C: Component>(&self, key: &ComponentKey<C>) -> bool {
        self.has(key.raw())
    }
}

impl<T: ComponentContainer + ?Sized> ContainerExt for T {}

fn check_type(key: &RawComponentKey, value: &dyn Component) -> Result<(), ContainerError> {
    if key.accepts(value) {
        Ok(())
    } else {
        Err(ContainerError::TypeMismatch {
            key: key.id().to_string(),
            expected: key.type_name(),
            found: value.component_type_name(),
        })
    }
}

/// Hash-indexed container, open to any key.
///
/// Iteration follows first-insertion order.
#[derive(Debug, Default)]
pub struct SparseContainer {
    /// Key index to position in `entries`.
    slots: HashMap<u32, usize>,
    entries: Vec<(RawComponentKey, Box<dyn Component>)>,
}

impl SparseContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentContainer for SparseContainer {
    fn get_raw(&self, key: &RawComponentKey) -> Option<&dyn Component> {
        let &pos = self.slots.get(&key.index())?;
        let (stored, value) = &self.entries[pos];
        (*stored == *key).then_some(&**value)
    }

    fn get_raw_mut(&mut self, key: &RawComponentKey) -> Option<&mut dyn Component> {
        let &pos = self.slots.get(&key.index())?;
        let (stored, value) = &mut self.entries[pos];
        if *stored == *key { Some(&mut **value) } else { None }
    }

    fn put_raw(&mut self, key: &RawComponentKey, value: Box<dyn Component>) -> Result<(), ContainerError> {
        check_type(key, &*value)?;
        match self.slots.get(&key.index()) {
            Some(&pos) => self.entries[pos] = (key.clone(), value),
            None => {
                self.slots.insert(key.index(), self.entries.len());
                self.entries.push((key.clone(), value));
            }
        }
        Ok(())
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &RawComponentKey> + '_> {
        Box::new(self.entries.iter().map(|(key, _)| key))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Slot layout shared by every [`DenseContainer`] built from one recipe.
#[derive(Debug)]
pub struct DenseLayout {
    min_index: u32,
    /// One entry per index in `min_index..=max_index`; `None` marks a hole.
    slot_keys: Vec<Option<RawComponentKey>>,
    /// Member keys in build order.
    order: Vec<RawComponentKey>,
}

impl DenseLayout {
    /// Builds a layout covering `keys`, which are kept in the given order.
    #[must_use]
    pub fn new(keys: Vec<RawComponentKey>) -> Self {
        let min_index = keys.iter().map(RawComponentKey::index).min().unwrap_or(0);
        let span = keys
            .iter()
            .map(|k| (k.index() - min_index) as usize + 1)
            .max()
            .unwrap_or(0);

        let mut slot_keys = vec![None; span];
        for key in &keys {
            slot_keys[(key.index() - min_index) as usize] = Some(key.clone());
        }

        Self {
            min_index,
            slot_keys,
            order: keys,
        }
    }

    /// Slot of `key`, if it belongs to this layout.
    #[must_use]
    pub fn slot_of(&self, key: &RawComponentKey) -> Option<usize> {
        let slot = key.index().checked_sub(self.min_index)? as usize;
        match self.slot_keys.get(slot)? {
            Some(member) if member == key => Some(slot),
            _ => None,
        }
    }

    #[must_use]
    pub fn min_index(&self) -> u32 {
        self.min_index
    }

    /// Number of slots, holes included.
    #[must_use]
    pub fn span(&self) -> usize {
        self.slot_keys.len()
    }

    /// Member keys in build order.
    pub fn keys(&self) -> impl Iterator<Item = &RawComponentKey> {
        self.order.iter()
    }

    /// Number of member keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Range-indexed container with a fixed layout.
///
/// Each key can be filled once; keys outside the layout are rejected.
pub struct DenseContainer {
    layout: Arc<DenseLayout>,
    slots: Vec<Option<Box<dyn Component>>>,
    filled: usize,
}

impl DenseContainer {
    /// An empty container for `layout`.
    #[must_use]
    pub fn new(layout: Arc<DenseLayout>) -> Self {
        let slots = (0..layout.span()).map(|_| None).collect();
        Self {
            layout,
            slots,
            filled: 0,
        }
    }

    /// Assembles a container from pre-filled slots.
    ///
    /// The caller guarantees that each `Some` slot holds an instance of the
    /// component type of the layout key at that slot. No check is done here.
    #[must_use]
    pub fn from_slots_unchecked(layout: Arc<DenseLayout>, mut slots: Vec<Option<Box<dyn Component>>>) -> Self {
        slots.resize_with(layout.span(), || None);
        let filled = slots.iter().filter(|slot| slot.is_some()).count();
        Self {
            layout,
            slots,
            filled,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &Arc<DenseLayout> {
        &self.layout
    }
}

impl fmt::Debug for DenseContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in self.layout.keys() {
            if let Some(value) = self.get_raw(key) {
                map.entry(key, &value);
            }
        }
        map.finish()
    }
}

impl ComponentContainer for DenseContainer {
    fn get_raw(&self, key: &RawComponentKey) -> Option<&dyn Component> {
        let slot = self.layout.slot_of(key)?;
        self.slots[slot].as_deref()
    }

    fn get_raw_mut(&mut self, key: &RawComponentKey) -> Option<&mut dyn Component> {
        let slot = self.layout.slot_of(key)?;
        match &mut self.slots[slot] {
            Some(value) => Some(&mut **value),
            None => None,
        }
    }

    fn put_raw(&mut self, key: &RawComponentKey, value: Box<dyn Component>) -> Result<(), ContainerError> {
        let slot = self.layout.slot_of(key).ok_or_else(|| ContainerError::OutOfLayout {
            key: key.id().to_string(),
        })?;
        check_type(key, &*value)?;
        let entry = &mut self.slots[slot];
        if entry.is_some() {
            return Err(ContainerError::AlreadyPresent {
                key: key.id().to_string(),
            });
        }
        *entry = Some(value);
        self.filled += 1;
        Ok(())
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &RawComponentKey> + '_> {
        let layout = &self.layout;
        let slots = &self.slots;
        Box::new(
            layout
                .keys()
                .filter(move |key| layout.slot_of(key).is_some_and(|slot| slots[slot].is_some())),
        )
    }

    fn len(&self) -> usize {
        self.filled
    }

    fn tick_components(&mut self, side: TickSide) {
        for slot in self.slots.iter_mut().flatten() {
            if let Some(ticking) = slot.as_ticking_mut() {
                ticking.tick(side);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Ticking;
    use crate::registry::ComponentRegistry;
    use crate::capabilities;

    #[derive(Debug, PartialEq)]
    struct Mana(u32);
    impl Component for Mana {}

    #[derive(Debug, PartialEq)]
    struct Stamina(u32);
    impl Component for Stamina {}

    #[derive(Debug, Default)]
    struct Clock(u32);
    impl Ticking for Clock {
        fn server_tick(&mut self) {
            self.0 += 1;
        }
        fn client_tick(&mut self) {
            self.0 += 10;
        }
    }
    impl Component for Clock {
        capabilities!(ticking);
    }

    struct Keys {
        mana: ComponentKey<Mana>,
        stamina: ComponentKey<Stamina>,
        clock: ComponentKey<Clock>,
    }

    fn keys() -> Keys {
        let mut registry = ComponentRegistry::new();
        Keys {
            mana: registry.register("mana").unwrap(),
            stamina: registry.register("stamina").unwrap(),
            clock: registry.register("clock").unwrap(),
        }
    }

    fn address(value: &dyn Component) -> *const () {
        value as *const dyn Component as *const ()
    }

    #[test]
    fn test_sparse_put_get_identity() {
        let keys = keys();
        let mut container = SparseContainer::new();
        let boxed: Box<dyn Component> = Box::new(Mana(5));
        let expected = address(&*boxed);

        container.put_raw(keys.mana.raw(), boxed).unwrap();
        let stored = container.get_raw(keys.mana.raw()).unwrap();
        assert_eq!(address(stored), expected);
        assert_eq!(container.get(&keys.mana), Some(&Mana(5)));
    }

    #[test]
    fn test_sparse_has_implies_get() {
        let keys = keys();
        let mut container = SparseContainer::new();
        assert!(!container.contains(&keys.mana));
        assert!(container.get(&keys.mana).is_none());

        container.put(&keys.mana, Mana(1)).unwrap();
        for key in container.keys() {
            assert!(container.has(key));
            assert!(container.get_raw(key).is_some());
        }
        assert!(!container.contains(&keys.stamina));
    }

    #[test]
    fn test_sparse_put_replaces() {
        let keys = keys();
        let mut container = SparseContainer::new();
        container.put(&keys.mana, Mana(1)).unwrap();
        container.put(&keys.mana, Mana(2)).unwrap();
        assert_eq!(container.len(), 1);
        assert_eq!(container.get(&keys.mana), Some(&Mana(2)));
    }

    #[test]
    fn test_put_rejects_wrong_type() {
        let keys = keys();
        let mut container = SparseContainer::new();
        let err = container
            .put_raw(keys.mana.raw(), Box::new(Stamina(3)))
            .unwrap_err();
        assert!(matches!(err, ContainerError::TypeMismatch { ref key, .. } if key == "mana"));
        assert!(container.is_empty());
    }

    #[test]
    fn test_sparse_keys_in_insertion_order() {
        let keys = keys();
        let mut container = SparseContainer::new();
        container.put(&keys.stamina, Stamina(1)).unwrap();
        container.put(&keys.mana, Mana(1)).unwrap();
        let ids: Vec<&str> = container.keys().map(|k| k.id().as_str()).collect();
        assert_eq!(ids, ["stamina", "mana"]);
    }

    #[test]
    fn test_dense_layout_slots() {
        let keys = keys();
        let layout = DenseLayout::new(vec![keys.clock.raw().clone(), keys.mana.raw().clone()]);
        assert_eq!(layout.min_index(), 0);
        assert_eq!(layout.span(), 3);
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.slot_of(keys.mana.raw()), Some(0));
        assert_eq!(layout.slot_of(keys.clock.raw()), Some(2));
        assert_eq!(layout.slot_of(keys.stamina.raw()), None);
    }

    #[test]
    fn test_dense_put_once() {
        let keys = keys();
        let layout = Arc::new(DenseLayout::new(vec![keys.mana.raw().clone()]));
        let mut container = DenseContainer::new(layout);

        container.put(&keys.mana, Mana(1)).unwrap();
        assert!(matches!(
            container.put(&keys.mana, Mana(2)),
            Err(ContainerError::AlreadyPresent { .. })
        ));
        assert_eq!(container.get(&keys.mana), Some(&Mana(1)));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_dense_rejects_keys_outside_layout() {
        let keys = keys();
        let layout = Arc::new(DenseLayout::new(vec![keys.mana.raw().clone()]));
        let mut container = DenseContainer::new(layout);

        assert!(matches!(
            container.put(&keys.stamina, Stamina(1)),
            Err(ContainerError::OutOfLayout { .. })
        ));
        assert!(container.get(&keys.stamina).is_none());
        assert!(!container.contains(&keys.stamina));
    }

    #[test]
    fn test_dense_shared_layout_and_key_order() {
        let keys = keys();
        let layout = Arc::new(DenseLayout::new(vec![
            keys.stamina.raw().clone(),
            keys.mana.raw().clone(),
        ]));
        let mut a = DenseContainer::new(Arc::clone(&layout));
        let b = DenseContainer::new(Arc::clone(&layout));
        assert!(Arc::ptr_eq(a.layout(), b.layout()));

        a.put(&keys.mana, Mana(1)).unwrap();
        a.put(&keys.stamina, Stamina(1)).unwrap();
        let ids: Vec<&str> = a.keys().map(|k| k.id().as_str()).collect();
        assert_eq!(ids, ["stamina", "mana"]);
        assert!(b.is_empty());
    }

    #[test]
    fn test_dense_from_slots() {
        let keys = keys();
        let layout = Arc::new(DenseLayout::new(vec![keys.mana.raw().clone()]));
        let slot: Box<dyn Component> = Box::new(Mana(9));
        let container = DenseContainer::from_slots_unchecked(layout, vec![Some(slot)]);
        assert_eq!(container.len(), 1);
        assert_eq!(container.get(&keys.mana), Some(&Mana(9)));
    }

    #[test]
    fn test_tick_components_both_strategies() {
        let keys = keys();
        let layout = Arc::new(DenseLayout::new(vec![keys.mana.raw().clone(), keys.clock.raw().clone()]));
        let mut dense = DenseContainer::new(layout);
        dense.put(&keys.mana, Mana(0)).unwrap();
        dense.put(&keys.clock, Clock::default()).unwrap();
        dense.tick_components(TickSide::Server);
        dense.tick_components(TickSide::Client);
        assert_eq!(dense.get(&keys.clock).map(|c| c.0), Some(11));

        let mut sparse = SparseContainer::new();
        sparse.put(&keys.clock, Clock::default()).unwrap();
        sparse.tick_components(TickSide::Server);
        assert_eq!(sparse.get(&keys.clock).map(|c| c.0), Some(1));
    }
}
