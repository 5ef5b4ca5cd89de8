//! # liveupdate-client
//!
//! Client-side live-property subscription manager.
//!
//! A [`LiveUpdateClient`] keeps a persistent duplex connection to a live
//! update server, lets callers declare interest in named properties of
//! named remote objects, and keeps [`Binding`]s synchronized with
//! server-pushed value changes. Bindings support write-back, per-binding
//! freeze/thaw suspension, and release their interest automatically on
//! drop. After a connection loss, [`LiveUpdateClient::reconnect`]
//! transparently re-establishes every known subscription.
//!
//! The server is the sole source of truth: it allocates subscription ids,
//! reference-counts duplicate interest, and pushes full subscription
//! snapshots that rebuild the client's registry wholesale.

#![deny(unsafe_code)]

pub mod binding;
pub mod client;
pub mod config;
pub mod connection;
pub mod errors;
pub mod registry;
pub mod transport;

pub use binding::Binding;
pub use client::{DebugInfo, LiveUpdateClient};
pub use config::ClientConfig;
pub use connection::{ConnectionState, ConnectionStatus};
pub use errors::{ConfigError, TransportError};
pub use transport::{ChannelEvent, ChannelRx, ChannelTx, Connector, WsConnector};

pub use liveupdate_core::wire::{SetValue, SubscriptionEntry};
pub use liveupdate_core::PropertyKey;
