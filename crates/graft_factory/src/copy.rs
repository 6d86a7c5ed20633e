//! Copy strategies.
//!
//! When one owner replaces another (a player respawning, an entity being
//! converted), component state is carried across with a [`CopyStrategy`].
//! The strategy for a (key, destination class) pair is resolved as:
//!
//! 1. the strategy bound to that key on the nearest class in the
//!    destination's ancestry,
//! 2. else the key's default strategy,
//! 3. else the generic copy ([`copy_component`]).
//!
//! [`CopyFlags`] describe the circumstances of the copy and are passed to
//! the strategy untouched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use graft_component::{Component, ComponentContainer, OwnerClass, OwnerClassId, RawComponentKey, Tag};
use tracing::warn;

use crate::error::CopyError;

/// Circumstances of a copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CopyFlags {
    /// The transition loses nothing (e.g. returning from another dimension).
    pub exact: bool,
    /// Inventory-like state is kept by the host's rules.
    pub keep_inventory: bool,
    /// The destination represents the same identity as the source.
    pub same_identity: bool,
}

impl CopyFlags {
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            exact: true,
            keep_inventory: false,
            same_identity: true,
        }
    }

    #[must_use]
    pub const fn with_keep_inventory(mut self, keep: bool) -> Self {
        self.keep_inventory = keep;
        self
    }

    #[must_use]
    pub const fn with_same_identity(mut self, same: bool) -> Self {
        self.same_identity = same;
        self
    }
}

/// Copies state from one component to another of the same key.
pub trait CopyStrategy: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CopyError`] if the state cannot be transferred.
    fn copy(&self, from: &dyn Component, to: &mut dyn Component, flags: CopyFlags) -> Result<(), CopyError>;
}

impl<F> CopyStrategy for F
where
    F: Fn(&dyn Component, &mut dyn Component, CopyFlags) -> Result<(), CopyError> + Send + Sync,
{
    fn copy(&self, from: &dyn Component, to: &mut dyn Component, flags: CopyFlags) -> Result<(), CopyError> {
        self(from, to, flags)
    }
}

/// Pins a closure to the [`CopyStrategy`] signature.
pub fn strategy_fn<F>(f: F) -> F
where
    F: Fn(&dyn Component, &mut dyn Component, CopyFlags) -> Result<(), CopyError> + Send + Sync,
{
    f
}

pub type SharedCopyStrategy = Arc<dyn CopyStrategy>;

/// Built-in copy policies, all using [`copy_component`] when they copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyPolicy {
    Always,
    /// Copy when the destination keeps the source's identity.
    SameIdentity,
    /// Copy when the transition is exact or inventory is kept.
    Inventory,
    ExactOnly,
    Never,
}

impl CopyPolicy {
    #[must_use]
    pub fn applies(self, flags: CopyFlags) -> bool {
        match self {
            Self::Always => true,
            Self::SameIdentity => flags.same_identity,
            Self::Inventory => flags.exact || flags.keep_inventory,
            Self::ExactOnly => flags.exact,
            Self::Never => false,
        }
    }
}

impl CopyStrategy for CopyPolicy {
    fn copy(&self, from: &dyn Component, to: &mut dyn Component, flags: CopyFlags) -> Result<(), CopyError> {
        if self.applies(flags) {
            copy_component(from, to)
        } else {
            Ok(())
        }
    }
}

/// Generic copy: `copy_from` when the destination is copyable, otherwise a
/// tag round trip.
///
/// # Errors
///
/// - [`CopyError::Incompatible`] if the destination is copyable but the
///   source is of another type.
/// - [`CopyError::Unsupported`] if either side lacks a usable capability.
/// - [`CopyError::Tag`] if the destination rejects the source's tag.
pub fn copy_component(from: &dyn Component, to: &mut dyn Component) -> Result<(), CopyError> {
    let from_name = from.component_type_name();
    let to_name = (*to).component_type_name();

    if let Some(target) = to.as_copy_target_mut() {
        return if target.copy_from_component(from) {
            Ok(())
        } else {
            Err(CopyError::Incompatible {
                from: from_name,
                to: to_name,
            })
        };
    }

    let source = from.as_serializable().ok_or(CopyError::Unsupported(from_name))?;
    let target = to.as_serializable_mut().ok_or(CopyError::Unsupported(to_name))?;
    let mut tag = Tag::new();
    source.write_to_tag(&mut tag);
    target.read_from_tag(&tag)?;
    Ok(())
}

/// How a copy for a (key, class) pair will be performed.
pub enum ResolvedCopy<'a> {
    /// Bound on `class`, the nearest ancestor with a binding.
    Bound {
        class: &'a OwnerClass,
        strategy: &'a dyn CopyStrategy,
    },
    Default(&'a dyn CopyStrategy),
    Generic,
}

impl ResolvedCopy<'_> {
    /// Performs the copy.
    ///
    /// # Errors
    ///
    /// See [`CopyStrategy::copy`] and [`copy_component`].
    pub fn apply(&self, from: &dyn Component, to: &mut dyn Component, flags: CopyFlags) -> Result<(), CopyError> {
        match self {
            Self::Bound { strategy, .. } | Self::Default(strategy) => strategy.copy(from, to, flags),
            Self::Generic => copy_component(from, to),
        }
    }
}

impl fmt::Debug for ResolvedCopy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound { class, .. } => write!(f, "Bound({})", class.name()),
            Self::Default(_) => f.write_str("Default"),
            Self::Generic => f.write_str("Generic"),
        }
    }
}

/// Copy strategies per (key, class) and per key.
#[derive(Default)]
pub struct CopyStrategies {
    bound: HashMap<(RawComponentKey, OwnerClassId), SharedCopyStrategy>,
    defaults: HashMap<RawComponentKey, SharedCopyStrategy>,
}

impl CopyStrategies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `strategy` to `key` on `class` and its subclasses.
    ///
    /// Replaces (with a warning) any strategy already bound to the pair.
    pub fn bind(&mut self, key: &RawComponentKey, class: &OwnerClass, strategy: SharedCopyStrategy) {
        if self.bound.insert((key.clone(), class.id()), strategy).is_some() {
            warn!(key = %key, class = class.name(), "replaced copy strategy");
        }
    }

    /// Sets the strategy used for `key` when no class binding applies.
    pub fn set_default(&mut self, key: &RawComponentKey, strategy: SharedCopyStrategy) {
        if self.defaults.insert(key.clone(), strategy).is_some() {
            warn!(key = %key, "replaced default copy strategy");
        }
    }

    /// Resolves the strategy for `key` on destination class `class`.
    #[must_use]
    pub fn resolve<'a>(&'a self, key: &RawComponentKey, class: &'a OwnerClass) -> ResolvedCopy<'a> {
        for ancestor in class.ancestors() {
            if let Some(strategy) = self.bound.get(&(key.clone(), ancestor.id())) {
                return ResolvedCopy::Bound {
                    class: ancestor,
                    strategy: strategy.as_ref(),
                };
            }
        }
        match self.defaults.get(key) {
            Some(strategy) => ResolvedCopy::Default(strategy.as_ref()),
            None => ResolvedCopy::Generic,
        }
    }

    /// Copies one component with the resolved strategy.
    ///
    /// # Errors
    ///
    /// See [`ResolvedCopy::apply`].
    pub fn copy(
        &self,
        key: &RawComponentKey,
        class: &OwnerClass,
        from: &dyn Component,
        to: &mut dyn Component,
        flags: CopyFlags,
    ) -> Result<(), CopyError> {
        self.resolve(key, class).apply(from, to, flags)
    }

    /// Copies every key present in both containers into `to`, whose owner
    /// is of class `class`. Returns the number of keys visited.
    ///
    /// # Errors
    ///
    /// Stops at the first failing copy.
    pub fn copy_container<F, T>(&self, from: &F, to: &mut T, class: &OwnerClass, flags: CopyFlags) -> Result<usize, CopyError>
    where
        F: ComponentContainer + ?Sized,
        T: ComponentContainer + ?Sized,
    {
        let keys: Vec<RawComponentKey> = to.keys().cloned().collect();
        let mut copied = 0;
        for key in &keys {
            let (Some(source), Some(target)) = (from.get_raw(key), to.get_raw_mut(key)) else {
                continue;
            };
            self.copy(key, class, source, target, flags)?;
            copied += 1;
        }
        Ok(copied)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bound.len() + self.defaults.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty() && self.defaults.is_empty()
    }
}

impl fmt::Debug for CopyStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyStrategies")
            .field("bound", &self.bound.len())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}
