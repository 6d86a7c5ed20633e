//! # graft_factory
//!
//! Turns factory declarations into per-owner-class container recipes.
//!
//! Extensions declare, per owner class, which components to attach and in
//! which order. For every concrete class the [`Composer`] merges the class's
//! own declarations with those of its ancestors, sorts them by their "after"
//! dependencies, and caches the result as a [`ContainerRecipe`]. Creating a
//! container for an owner then only runs the recipe's builders.
//!
//! Registration happens on an open [`Bootstrap`]; sealing it produces the
//! shared, read-only [`Runtime`].

pub mod bootstrap;
pub mod composer;
pub mod copy;
pub mod declaration;
pub mod error;
pub mod recipe;
pub mod registration;
pub mod registry;
mod sort;

pub use bootstrap::{Bootstrap, BootstrapContext, ComponentInitializer, Runtime};
pub use composer::Composer;
pub use copy::{
    CopyFlags, CopyPolicy, CopyStrategies, CopyStrategy, ResolvedCopy, SharedCopyStrategy,
    copy_component, strategy_fn,
};
pub use declaration::{ClassPredicate, ComponentBuilder, FactoryDeclaration};
pub use error::{CompositionError, CopyError, MissingDependency};
pub use recipe::ContainerRecipe;
pub use registration::Registration;
pub use registry::FactoryRegistry;
