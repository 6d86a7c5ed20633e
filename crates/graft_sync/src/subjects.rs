//! NATS subject hierarchy.
//!
//! All graft subjects are prefixed with `graft.` to namespace within a
//! shared NATS cluster.

use graft_component::PeerId;

/// Root prefix for all graft NATS subjects.
pub const PREFIX: &str = "graft";

/// Prefix of the per-peer component sync subjects.
pub const SYNC_PREFIX: &str = "graft.sync";

/// Build the subject a peer listens on for component sync payloads.
///
/// `graft.sync.<peer>`
#[must_use]
pub fn sync_subject(peer: PeerId) -> String {
    format!("{SYNC_PREFIX}.{}", peer.0)
}
