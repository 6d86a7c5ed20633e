//! Error types for composition and copying.

use std::fmt;

use graft_component::{RegistryError, TagError};

/// A factory whose "after" dependency is not attached to the class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    pub key: String,
    pub dependency: String,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` requires `{}`", self.key, self.dependency)
    }
}

fn join(missing: &[MissingDependency]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while declaring factories or composing recipes.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("duplicate factory declarations for `{key}` on `{class}`: {existing} and {conflicting}")]
    DuplicateFactory {
        key: String,
        class: &'static str,
        existing: String,
        conflicting: String,
    },

    #[error("circular component dependency on `{class}`: {path}")]
    Cycle { class: &'static str, path: String },

    #[error("unsatisfied component dependencies on `{class}`: {}", join(.missing))]
    UnsatisfiedDependencies {
        class: &'static str,
        missing: Vec<MissingDependency>,
    },

    #[error("extension `{extension}` failed to register its components")]
    Initializer {
        extension: String,
        #[source]
        source: Box<CompositionError>,
    },
}

/// Errors raised while copying component state.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("`{0}` is neither copyable nor serializable")]
    Unsupported(&'static str),

    #[error("cannot copy `{from}` into `{to}`")]
    Incompatible {
        from: &'static str,
        to: &'static str,
    },

    #[error(transparent)]
    Tag(#[from] TagError),
}
