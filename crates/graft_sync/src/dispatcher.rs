//! Sync capture and ordered application.
//!
//! Capture runs wherever the authoritative state lives and produces
//! [`ComponentSyncPayload`]s. Incoming payloads are resolved against the
//! registry by [`SyncDispatcher::receive`] on any thread, then queued; only
//! [`SyncApplier::drain`], called from the main loop, touches containers.
//! Payloads are applied strictly in arrival order.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use graft_component::{ComponentContainer, ComponentRegistry, OwnerRef, PeerId, RawComponentKey, WarnOnce};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::codec;
use crate::error::SyncError;
use crate::messages::ComponentSyncPayload;

/// Creates a connected dispatcher/applier pair over `registry`.
///
/// The two halves share one [`WarnOnce`], so an unresolvable id is reported
/// once per session whichever half notices it.
#[must_use]
pub fn channel(registry: Arc<ComponentRegistry>) -> (SyncDispatcher, SyncApplier) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let warnings = Arc::new(WarnOnce::new());
    let dispatcher = SyncDispatcher {
        registry,
        sender,
        warnings: Arc::clone(&warnings),
    };
    (dispatcher, SyncApplier { receiver, warnings })
}

/// A resolved payload waiting for the main loop.
#[derive(Debug)]
struct QueuedSync {
    target: OwnerRef,
    key: RawComponentKey,
    data: Vec<u8>,
}

/// Thread-safe entry point of the sync pipeline.
#[derive(Debug, Clone)]
pub struct SyncDispatcher {
    registry: Arc<ComponentRegistry>,
    sender: UnboundedSender<QueuedSync>,
    warnings: Arc<WarnOnce>,
}

impl SyncDispatcher {
    /// Captures the state of `key` in `container` for `recipient`.
    ///
    /// Returns `None` when the component is absent, not auto-synced, or
    /// declines to sync with `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Payload`] if the component fails to encode.
    pub fn capture(
        &self,
        target: OwnerRef,
        container: &dyn ComponentContainer,
        key: &RawComponentKey,
        recipient: PeerId,
    ) -> Result<Option<ComponentSyncPayload>, SyncError> {
        let Some(synced) = container.get_raw(key).and_then(|c| c.as_synced()) else {
            return Ok(None);
        };
        if !synced.should_sync_with(recipient) {
            return Ok(None);
        }
        let data = synced.write_sync_packet(recipient)?;
        Ok(Some(ComponentSyncPayload {
            target,
            key_id: key.id().to_string(),
            data,
        }))
    }

    /// Captures every auto-synced component of `container`, in key order.
    ///
    /// # Errors
    ///
    /// See [`SyncDispatcher::capture`].
    pub fn capture_all(
        &self,
        target: OwnerRef,
        container: &dyn ComponentContainer,
        recipient: PeerId,
    ) -> Result<Vec<ComponentSyncPayload>, SyncError> {
        let mut payloads = Vec::new();
        for key in container.keys() {
            if let Some(payload) = self.capture(target, container, key, recipient)? {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    /// Resolves and queues an incoming payload.
    ///
    /// Returns `false` if the key id is unknown; the payload is dropped and
    /// the id is reported once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ChannelClosed`] if the applier was dropped.
    pub fn receive(&self, payload: ComponentSyncPayload) -> Result<bool, SyncError> {
        let Some(key) = self.registry.lookup(&payload.key_id) else {
            self.warnings.warn(&payload.key_id, "unknown component id in sync payload");
            return Ok(false);
        };
        self.sender
            .send(QueuedSync {
                target: payload.target,
                key: key.clone(),
                data: payload.data,
            })
            .map_err(|_| SyncError::ChannelClosed)?;
        Ok(true)
    }

    /// Decodes a MessagePack payload and passes it to [`SyncDispatcher::receive`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Decode`] for malformed bytes, otherwise as
    /// [`SyncDispatcher::receive`].
    pub fn receive_bytes(&self, bytes: &[u8]) -> Result<bool, SyncError> {
        let payload: ComponentSyncPayload = codec::decode(bytes)?;
        self.receive(payload)
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }
}

/// Where the main loop finds containers by owner.
pub trait ContainerHost {
    /// The container of `owner`, if it is known here.
    fn container_mut(&mut self, owner: OwnerRef) -> Option<&mut dyn ComponentContainer>;

    /// Visits every hosted container.
    fn for_each_container(&mut self, f: &mut dyn FnMut(&mut dyn ComponentContainer));
}

impl<C: ComponentContainer, S: BuildHasher> ContainerHost for HashMap<OwnerRef, C, S> {
    fn container_mut(&mut self, owner: OwnerRef) -> Option<&mut dyn ComponentContainer> {
        match self.get_mut(&owner) {
            Some(container) => Some(container),
            None => None,
        }
    }

    fn for_each_container(&mut self, f: &mut dyn FnMut(&mut dyn ComponentContainer)) {
        for container in self.values_mut() {
            f(container);
        }
    }
}

/// Outcome of one [`SyncApplier::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Payloads written into a component.
    pub applied: usize,
    /// Payloads whose owner or component was not found.
    pub dropped: usize,
    /// Payloads the component rejected.
    pub failed: usize,
}

impl ApplyReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied + self.dropped + self.failed
    }
}

/// Main-loop half of the sync pipeline.
#[derive(Debug)]
pub struct SyncApplier {
    receiver: UnboundedReceiver<QueuedSync>,
    warnings: Arc<WarnOnce>,
}

impl SyncApplier {
    /// Applies every queued payload to `host`, in arrival order.
    pub fn drain(&mut self, host: &mut dyn ContainerHost) -> ApplyReport {
        let mut report = ApplyReport::default();
        while let Ok(queued) = self.receiver.try_recv() {
            let Some(container) = host.container_mut(queued.target) else {
                self.warnings
                    .warn(&queued.target.to_string(), "sync target has no container");
                report.dropped += 1;
                continue;
            };
            let Some(synced) = container
                .get_raw_mut(&queued.key)
                .and_then(|c| c.as_synced_mut())
            else {
                self.warnings.warn(
                    queued.key.id().as_str(),
                    "sync target lacks an auto-synced component",
                );
                report.dropped += 1;
                continue;
            };
            match synced.apply_sync_packet(&queued.data) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!(key = %queued.key, target = %queued.target, %error, "failed to apply sync payload");
                    report.failed += 1;
                }
            }
        }
        if report.total() > 0 {
            debug!(
                applied = report.applied,
                dropped = report.dropped,
                failed = report.failed,
                "drained sync queue"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use graft_component::{
        AutoSynced, Component, ComponentKey, ContainerExt, SparseContainer, capabilities, impl_serde_tag,
    };
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Mana {
        amount: u32,
    }
    impl_serde_tag!(Mana);
    impl AutoSynced for Mana {}
    impl Component for Mana {
        capabilities!(serializable, synced);
    }

    /// Only synced with the peer it belongs to.
    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Secret {
        holder: Option<PeerId>,
        code: u32,
    }
    impl_serde_tag!(Secret);
    impl AutoSynced for Secret {
        fn should_sync_with(&self, recipient: PeerId) -> bool {
            self.holder == Some(recipient)
        }
    }
    impl Component for Secret {
        capabilities!(serializable, synced);
    }

    #[derive(Debug, Default, PartialEq)]
    struct Marker;
    impl Component for Marker {}

    struct Keys {
        mana: ComponentKey<Mana>,
        secret: ComponentKey<Secret>,
        marker: ComponentKey<Marker>,
    }

    fn setup() -> (Keys, SyncDispatcher, SyncApplier) {
        let mut registry = ComponentRegistry::new();
        let keys = Keys {
            mana: registry.register("mana").unwrap(),
            secret: registry.register("secret").unwrap(),
            marker: registry.register("marker").unwrap(),
        };
        let (dispatcher, applier) = channel(Arc::new(registry));
        (keys, dispatcher, applier)
    }

    fn host_with(owner: OwnerRef, keys: &Keys) -> HashMap<OwnerRef, SparseContainer> {
        let mut container = SparseContainer::new();
        container.put(&keys.mana, Mana::default()).unwrap();
        container.put(&keys.marker, Marker).unwrap();
        HashMap::from([(owner, container)])
    }

    #[test]
    fn test_capture_then_apply() {
        let (keys, dispatcher, mut applier) = setup();
        let owner = OwnerRef::new();
        let peer = PeerId::new();

        let mut server = SparseContainer::new();
        server.put(&keys.mana, Mana { amount: 75 }).unwrap();
        let payload = dispatcher
            .capture(owner, &server, keys.mana.raw(), peer)
            .unwrap()
            .unwrap();
        assert_eq!(payload.key_id, "mana");

        let mut client = host_with(owner, &keys);
        assert!(dispatcher.receive(payload).unwrap());
        let report = applier.drain(&mut client);

        assert_eq!(report, ApplyReport { applied: 1, dropped: 0, failed: 0 });
        assert_eq!(client[&owner].get(&keys.mana), Some(&Mana { amount: 75 }));
    }

    #[test]
    fn test_capture_skips_absent_and_transient() {
        let (keys, dispatcher, _applier) = setup();
        let owner = OwnerRef::new();
        let mut container = SparseContainer::new();
        container.put(&keys.marker, Marker).unwrap();

        let peer = PeerId::new();
        assert!(dispatcher.capture(owner, &container, keys.mana.raw(), peer).unwrap().is_none());
        assert!(dispatcher.capture(owner, &container, keys.marker.raw(), peer).unwrap().is_none());
    }

    #[test]
    fn test_capture_respects_recipient_filter() {
        let (keys, dispatcher, _applier) = setup();
        let owner = OwnerRef::new();
        let holder = PeerId::new();
        let mut container = SparseContainer::new();
        container.put(&keys.mana, Mana { amount: 1 }).unwrap();
        container
            .put(&keys.secret, Secret { holder: Some(holder), code: 7 })
            .unwrap();
        container.put(&keys.marker, Marker).unwrap();

        let to_holder = dispatcher.capture_all(owner, &container, holder).unwrap();
        let to_other = dispatcher.capture_all(owner, &container, PeerId::new()).unwrap();

        let ids: Vec<&str> = to_holder.iter().map(|p| p.key_id.as_str()).collect();
        assert_eq!(ids, ["mana", "secret"]);
        let ids: Vec<&str> = to_other.iter().map(|p| p.key_id.as_str()).collect();
        assert_eq!(ids, ["mana"]);
    }

    #[test]
    fn test_unknown_key_dropped_on_receive() {
        let (_keys, dispatcher, mut applier) = setup();
        let payload = ComponentSyncPayload {
            target: OwnerRef::new(),
            key_id: "unknown:thing".to_string(),
            data: Vec::new(),
        };
        assert!(!dispatcher.receive(payload.clone()).unwrap());
        assert!(!dispatcher.receive(payload).unwrap());
        assert!(dispatcher.warnings.has_warned("unknown:thing"));
        assert_eq!(dispatcher.warnings.len(), 1);

        let mut host: HashMap<OwnerRef, SparseContainer> = HashMap::new();
        assert_eq!(applier.drain(&mut host).total(), 0);
    }

    #[test]
    fn test_missing_owner_or_component_dropped() {
        let (keys, dispatcher, mut applier) = setup();
        let owner = OwnerRef::new();
        let stranger = OwnerRef::new();
        let mut host = host_with(owner, &keys);

        let data = Mana { amount: 3 }.write_sync_packet(PeerId::new()).unwrap();
        for (target, key_id) in [(stranger, "mana"), (owner, "secret"), (owner, "marker")] {
            let payload = ComponentSyncPayload {
                target,
                key_id: key_id.to_string(),
                data: data.clone(),
            };
            assert!(dispatcher.receive(payload).unwrap());
        }

        let report = applier.drain(&mut host);
        assert_eq!(report, ApplyReport { applied: 0, dropped: 3, failed: 0 });
        assert_eq!(host[&owner].get(&keys.mana), Some(&Mana::default()));
    }

    #[test]
    fn test_payloads_applied_in_arrival_order() {
        let (keys, dispatcher, mut applier) = setup();
        let owner = OwnerRef::new();
        let peer = PeerId::new();
        let mut host = host_with(owner, &keys);

        for amount in [10, 20, 30] {
            let data = Mana { amount }.write_sync_packet(peer).unwrap();
            let bytes = codec::encode(&ComponentSyncPayload {
                target: owner,
                key_id: "mana".to_string(),
                data,
            })
            .unwrap();
            assert!(dispatcher.receive_bytes(&bytes).unwrap());
        }

        assert_eq!(applier.drain(&mut host).applied, 3);
        assert_eq!(host[&owner].get(&keys.mana), Some(&Mana { amount: 30 }));
    }

    #[test]
    fn test_malformed_component_data_counts_as_failed() {
        let (keys, dispatcher, mut applier) = setup();
        let owner = OwnerRef::new();
        let mut host = host_with(owner, &keys);

        let payload = ComponentSyncPayload {
            target: owner,
            key_id: "mana".to_string(),
            data: vec![0xC1],
        };
        assert!(dispatcher.receive(payload).unwrap());
        let report = applier.drain(&mut host);
        assert_eq!(report.failed, 1);
        assert_eq!(host[&owner].get(&keys.mana), Some(&Mana::default()));
    }

    #[test]
    fn test_receive_after_applier_dropped() {
        let (_keys, dispatcher, applier) = setup();
        drop(applier);
        let payload = ComponentSyncPayload {
            target: OwnerRef::new(),
            key_id: "mana".to_string(),
            data: Vec::new(),
        };
        assert!(matches!(dispatcher.receive(payload), Err(SyncError::ChannelClosed)));
    }

    #[test]
    fn test_receive_bytes_rejects_garbage() {
        let (_keys, dispatcher, _applier) = setup();
        assert!(matches!(dispatcher.receive_bytes(&[0xFF]), Err(SyncError::Decode(_))));
    }
}
