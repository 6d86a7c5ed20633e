//! Wire codec for sync traffic.
//!
//! A [`ComponentSyncPayload`](crate::messages::ComponentSyncPayload) is sent
//! as one MessagePack array in field order: `[target, key_id, data]`. The
//! target owner is its UUID, the key id a string, and `data` the
//! component's own sync bytes, which this layer never interprets. One NATS
//! message or one local delivery carries exactly one payload, so no length
//! prefix is added.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`SyncError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SyncError> {
    rmp_serde::to_vec(value).map_err(SyncError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`SyncError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, SyncError> {
    rmp_serde::from_slice(bytes).map_err(SyncError::Decode)
}
