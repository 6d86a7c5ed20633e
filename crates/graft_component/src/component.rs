//! Core [`Component`] trait and its optional capabilities.
//!
//! A component is any `Send + Sync + 'static` value attached to an owner
//! instance. Plain storage needs nothing more than an empty `impl Component`.
//! Components opt into further behavior by exposing capability accessors:
//!
//! | Capability     | Trait                 | Used by                        |
//! |----------------|-----------------------|--------------------------------|
//! | serializable   | [`TagSerializable`]   | the [`tag`](crate::tag) codec  |
//! | auto-synced    | [`AutoSynced`]        | the sync dispatcher            |
//! | ticking        | [`Ticking`]           | the main loop                  |
//! | copyable       | [`CopyableComponent`] | copy strategies                |
//!
//! The [`capabilities!`](crate::capabilities) macro generates the accessors
//! so the declared set and the reported [`Capabilities`] never drift apart.

use std::any::{Any, TypeId};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TagError;
use crate::tag::Tag;

/// Type-erasure helpers, implemented for every `'static` type.
///
/// Call these through `&dyn Component`, never through a `Box`, or they
/// describe the box instead of the component.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// `TypeId` of the concrete type.
    fn component_type_id(&self) -> TypeId;
    /// Rust type name of the concrete type, for diagnostics.
    fn component_type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn component_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn component_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Bit set describing which optional capabilities a component exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const SERIALIZABLE: Self = Self(1);
    pub const SYNCED: Self = Self(1 << 1);
    pub const TICKING: Self = Self(1 << 2);
    pub const COPYABLE: Self = Self(1 << 3);

    /// Union of two capability sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The core component trait.
///
/// Every accessor defaults to `None`, which makes a component transient:
/// not written to tags, never synced, never ticked, and copied only when a
/// registered strategy knows its concrete type.
///
/// # Examples
///
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use graft_component::{capabilities, impl_serde_tag, Component};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Mana {
///     amount: u32,
/// }
///
/// impl_serde_tag!(Mana);
///
/// impl Component for Mana {
///     capabilities!(serializable);
/// }
/// ```
pub trait Component: AsAny + fmt::Debug + Send + Sync {
    /// Capabilities this component exposes.
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn as_serializable(&self) -> Option<&dyn TagSerializable> {
        None
    }

    fn as_serializable_mut(&mut self) -> Option<&mut dyn TagSerializable> {
        None
    }

    fn as_synced(&self) -> Option<&dyn AutoSynced> {
        None
    }

    fn as_synced_mut(&mut self) -> Option<&mut dyn AutoSynced> {
        None
    }

    fn as_ticking_mut(&mut self) -> Option<&mut dyn Ticking> {
        None
    }

    fn as_copy_target_mut(&mut self) -> Option<&mut dyn CopyTarget> {
        None
    }
}

impl dyn Component {
    /// Returns `true` if the concrete type is `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.component_type_id() == TypeId::of::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    #[must_use]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Serializable capability: read and write a structured [`Tag`].
pub trait TagSerializable {
    /// Writes this component's state into `tag`.
    fn write_to_tag(&self, tag: &mut Tag);

    /// Replaces this component's state with the contents of `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`TagError`] if `tag` does not describe a valid state.
    fn read_from_tag(&mut self, tag: &Tag) -> Result<(), TagError>;
}

/// Auto-synced capability: server state mirrored onto remote peers.
///
/// The default payload is the component's tag encoded with MessagePack.
pub trait AutoSynced: TagSerializable {
    /// Whether `recipient` should receive this component's state.
    fn should_sync_with(&self, _recipient: PeerId) -> bool {
        true
    }

    /// Encodes the state sent to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::Encode`] if MessagePack encoding fails.
    fn write_sync_packet(&self, _recipient: PeerId) -> Result<Vec<u8>, TagError> {
        let mut tag = Tag::new();
        self.write_to_tag(&mut tag);
        Ok(rmp_serde::to_vec(&tag)?)
    }

    /// Applies a payload produced by [`AutoSynced::write_sync_packet`].
    ///
    /// # Errors
    ///
    /// Returns [`TagError`] if the payload cannot be decoded or applied.
    fn apply_sync_packet(&mut self, data: &[u8]) -> Result<(), TagError> {
        let tag: Tag = rmp_serde::from_slice(data)?;
        self.read_from_tag(&tag)
    }
}

/// Which side of the main loop is ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSide {
    Server,
    Client,
}

/// Ticking capability: invoked once per main-loop tick.
pub trait Ticking {
    fn server_tick(&mut self) {}

    fn client_tick(&mut self) {}

    /// Dispatches to the tick method for `side`.
    fn tick(&mut self, side: TickSide) {
        match side {
            TickSide::Server => self.server_tick(),
            TickSide::Client => self.client_tick(),
        }
    }
}

/// Copyable capability: copy state from another instance of the same type.
pub trait CopyableComponent: Component {
    fn copy_from(&mut self, other: &Self);
}

/// Type-erased form of [`CopyableComponent`].
pub trait CopyTarget {
    /// Copies from `source` if it has the same concrete type as `self`.
    /// Returns `false` and leaves `self` untouched otherwise.
    fn copy_from_component(&mut self, source: &dyn Component) -> bool;
}

impl<T: CopyableComponent> CopyTarget for T {
    fn copy_from_component(&mut self, source: &dyn Component) -> bool {
        match source.downcast_ref::<T>() {
            Some(other) => {
                self.copy_from(other);
                true
            }
            None => false,
        }
    }
}

/// A remote peer that may receive synced component state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub Uuid);

impl PeerId {
    /// Generates a fresh random peer id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Implements the capability accessors of [`Component`] for the listed
/// capabilities: any of `serializable`, `synced`, `ticking`, `copyable`.
///
/// Use inside an `impl Component for T` block. `synced` requires the type to
/// implement [`AutoSynced`], and so on for the other capabilities.
#[macro_export]
macro_rules! capabilities {
    (@flag serializable) => { $crate::Capabilities::SERIALIZABLE };
    (@flag synced) => { $crate::Capabilities::SYNCED };
    (@flag ticking) => { $crate::Capabilities::TICKING };
    (@flag copyable) => { $crate::Capabilities::COPYABLE };

    (@accessors serializable) => {
        fn as_serializable(&self) -> ::core::option::Option<&dyn $crate::TagSerializable> {
            ::core::option::Option::Some(self)
        }

        fn as_serializable_mut(
            &mut self,
        ) -> ::core::option::Option<&mut dyn $crate::TagSerializable> {
            ::core::option::Option::Some(self)
        }
    };
    (@accessors synced) => {
        fn as_synced(&self) -> ::core::option::Option<&dyn $crate::AutoSynced> {
            ::core::option::Option::Some(self)
        }

        fn as_synced_mut(&mut self) -> ::core::option::Option<&mut dyn $crate::AutoSynced> {
            ::core::option::Option::Some(self)
        }
    };
    (@accessors ticking) => {
        fn as_ticking_mut(&mut self) -> ::core::option::Option<&mut dyn $crate::Ticking> {
            ::core::option::Option::Some(self)
        }
    };
    (@accessors copyable) => {
        fn as_copy_target_mut(&mut self) -> ::core::option::Option<&mut dyn $crate::CopyTarget> {
            ::core::option::Option::Some(self)
        }
    };

    ($($cap:ident),* $(,)?) => {
        fn capabilities(&self) -> $crate::Capabilities {
            $crate::Capabilities::NONE $(.with($crate::capabilities!(@flag $cap)))*
        }

        $($crate::capabilities!(@accessors $cap);)*
    };
}
