//! Sync-layer error types.

use graft_component::{PeerId, TagError};

/// Errors that can occur while capturing, moving or applying sync payloads.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Failed to encode a payload to MessagePack.
    #[error("failed to encode sync payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a payload from MessagePack.
    #[error("failed to decode sync payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A component could not produce or consume its sync data.
    #[error("component sync data: {0}")]
    Payload(#[from] TagError),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// NATS publish error.
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// The applier side of the channel was dropped.
    #[error("sync channel closed")]
    ChannelClosed,

    /// The main loop was configured with a non-positive or non-finite rate.
    #[error("tick rate must be a positive number of ticks per second, got {0}")]
    InvalidTickRate(f64),

    /// No dispatcher is attached for the recipient.
    #[error("no dispatcher attached for peer {0}")]
    UnknownPeer(PeerId),
}
