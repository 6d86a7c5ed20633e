//! # graft_component
//!
//! Attaches typed components to owner instances without touching the owner's
//! own definition.
//!
//! This crate provides:
//!
//! - [`Component`] trait and its optional capabilities (serializable,
//!   auto-synced, ticking, copyable).
//! - [`ComponentRegistry`]: stable string ids mapped to dense integer indices.
//! - [`OwnerClass`]: a statically declared owner-class hierarchy.
//! - [`ComponentContainer`]: per-owner storage, as a [`SparseContainer`] or a
//!   range-indexed [`DenseContainer`].
//! - [`tag`]: container to/from a structured key→payload tree.

pub mod component;
pub mod container;
pub mod diagnostics;
pub mod error;
pub mod key;
pub mod owner;
pub mod registry;
pub mod tag;

pub use component::{
    AsAny, AutoSynced, Capabilities, Component, CopyTarget, CopyableComponent, PeerId,
    TagSerializable, TickSide, Ticking,
};
pub use container::{
    ComponentContainer, ContainerExt, DenseContainer, DenseLayout, SparseContainer,
};
pub use diagnostics::WarnOnce;
pub use error::{ContainerError, RegistryError, TagError};
pub use key::{ComponentId, ComponentKey, RawComponentKey};
pub use owner::{Owner, OwnerClass, OwnerClassId, OwnerRef};
pub use registry::ComponentRegistry;
pub use tag::Tag;
