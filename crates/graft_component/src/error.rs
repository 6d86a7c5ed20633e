//! Error types for the component layer.

/// Errors raised while registering component keys.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid component id `{0}`: expected lowercase [a-z0-9_-./] with an optional `namespace:` prefix")]
    InvalidId(String),

    #[error("component `{id}` is already registered as `{existing}`, cannot register it as `{requested}`")]
    CapabilityMismatch {
        id: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("cannot register component `{id}`: the registry is sealed")]
    Sealed { id: String },

    #[error("component index space exhausted")]
    IndexOverflow,
}

/// Errors raised by container writes.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("component `{key}` expects `{expected}`, got `{found}`")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("component `{key}` is already present")]
    AlreadyPresent { key: String },

    #[error("component `{key}` is not part of this container's layout")]
    OutOfLayout { key: String },
}

/// Errors raised while reading or writing component tags.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("malformed component tag: {0}")]
    Malformed(String),

    #[error("tag value error: {0}")]
    Value(#[from] serde_json::Error),

    #[error("MessagePack encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
