//! # graft_sync
//!
//! Mirrors auto-synced component state from the authoritative side onto
//! peers.
//!
//! This crate provides:
//!
//! - [`messages`]: the [`ComponentSyncPayload`] exchanged between peers.
//! - [`codec`]: MessagePack encoding of payloads.
//! - [`dispatcher`]: capture on any thread, ordered application on the main
//!   loop.
//! - [`transport`]: the [`SyncTransport`] seam and an in-process loopback.
//! - [`nats`]: a NATS-backed transport.
//! - [`main_loop`]: the fixed-rate loop that applies payloads and ticks
//!   containers.

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod main_loop;
pub mod messages;
pub mod nats;
pub mod subjects;
pub mod transport;

pub use codec::{decode, encode};
pub use dispatcher::{ApplyReport, ContainerHost, SyncApplier, SyncDispatcher, channel};
pub use error::SyncError;
pub use main_loop::{MainLoop, TickConfig};
pub use messages::ComponentSyncPayload;
pub use nats::NatsTransport;
pub use transport::{LocalTransport, SyncTransport};
