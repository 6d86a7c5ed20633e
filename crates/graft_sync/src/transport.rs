//! The boundary between the dispatcher and the wire.

use std::future::Future;

use dashmap::DashMap;
use graft_component::PeerId;
use tracing::debug;

use crate::codec;
use crate::dispatcher::SyncDispatcher;
use crate::error::SyncError;
use crate::messages::ComponentSyncPayload;

/// Moves encoded payloads to a peer.
pub trait SyncTransport: Send + Sync {
    /// Delivers `payload` to `recipient`.
    fn send(
        &self,
        recipient: PeerId,
        payload: &ComponentSyncPayload,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// In-process loopback into attached dispatchers.
///
/// Payloads still go through the MessagePack codec, so a local session
/// exercises the same bytes a network transport would carry.
#[derive(Debug, Default)]
pub struct LocalTransport {
    peers: DashMap<PeerId, SyncDispatcher>,
}

impl LocalTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes payloads for `peer` into `dispatcher`.
    pub fn attach(&self, peer: PeerId, dispatcher: SyncDispatcher) {
        self.peers.insert(peer, dispatcher);
    }

    /// Stops routing to `peer`. Returns whether it was attached.
    pub fn detach(&self, peer: PeerId) -> bool {
        self.peers.remove(&peer).is_some()
    }

    #[must_use]
    pub fn is_attached(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }
}

impl SyncTransport for LocalTransport {
    async fn send(&self, recipient: PeerId, payload: &ComponentSyncPayload) -> Result<(), SyncError> {
        let bytes = codec::encode(payload)?;
        let dispatcher = self
            .peers
            .get(&recipient)
            .map(|entry| entry.value().clone())
            .ok_or(SyncError::UnknownPeer(recipient))?;
        let queued = dispatcher.receive_bytes(&bytes)?;
        debug!(peer = %recipient, key = payload.key_id, queued, "delivered sync payload locally");
        Ok(())
    }
}
