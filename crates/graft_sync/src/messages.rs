//! Message types exchanged between peers.

use graft_component::OwnerRef;
use serde::{Deserialize, Serialize};

/// One component's state, addressed to one owner on the receiving peer.
///
/// `data` is whatever the component's
/// [`write_sync_packet`](graft_component::AutoSynced::write_sync_packet)
/// produced; the transport never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSyncPayload {
    /// The owner whose container receives the data.
    pub target: OwnerRef,
    /// String id of the component key.
    pub key_id: String,
    /// Opaque component data.
    pub data: Vec<u8>,
}
