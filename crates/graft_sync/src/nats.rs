//! NATS-backed sync transport.
//!
//! Each peer listens on its own subject (see [`subjects::sync_subject`]);
//! payloads are published MessagePack-encoded and fed to the listening
//! peer's dispatcher.
//!
//! [`subjects::sync_subject`]: crate::subjects::sync_subject

use futures::StreamExt;
use graft_component::PeerId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec;
use crate::dispatcher::SyncDispatcher;
use crate::error::SyncError;
use crate::messages::ComponentSyncPayload;
use crate::subjects;
use crate::transport::SyncTransport;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// A [`SyncTransport`] over an `async-nats` client.
#[derive(Debug, Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
}

impl NatsTransport {
    /// Connect using the URL from the `NATS_URL` environment variable,
    /// falling back to [`DEFAULT_NATS_URL`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connect`] if the connection cannot be established.
    pub async fn connect() -> Result<Self, SyncError> {
        let url = std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        Self::connect_to(&url).await
    }

    /// Connect to NATS at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connect`] if the connection cannot be established.
    pub async fn connect_to(url: &str) -> Result<Self, SyncError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Returns a reference to the underlying `async-nats` client.
    #[must_use]
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Subscribes `peer`'s sync subject and feeds every message to
    /// `dispatcher` until the subscription ends or the applier is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Subscribe`] if the subscription fails.
    pub async fn listen(&self, peer: PeerId, dispatcher: SyncDispatcher) -> Result<JoinHandle<()>, SyncError> {
        let subject = subjects::sync_subject(peer);
        let mut subscriber = self.client.subscribe(subject.clone()).await?;
        info!(subject, "listening for sync payloads");

        Ok(tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match dispatcher.receive_bytes(&message.payload) {
                    Ok(queued) => debug!(subject, queued, "received sync payload"),
                    Err(SyncError::ChannelClosed) => {
                        info!(subject, "sync applier dropped, stopping listener");
                        break;
                    }
                    Err(error) => warn!(subject, %error, "discarding sync message"),
                }
            }
        }))
    }
}

impl SyncTransport for NatsTransport {
    async fn send(&self, recipient: PeerId, payload: &ComponentSyncPayload) -> Result<(), SyncError> {
        let bytes = codec::encode(payload)?;
        self.client
            .publish(subjects::sync_subject(recipient), bytes.into())
            .await?;
        Ok(())
    }
}
