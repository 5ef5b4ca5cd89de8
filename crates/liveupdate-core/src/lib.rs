//! # liveupdate-core
//!
//! Protocol-level building blocks for the live update client:
//!
//! - [`PropertyKey`]: canonical identity of an (object, property) pair
//! - [`wire`]: the JSON frame types exchanged with the live update server
//! - [`patch_value`]: one-level patching of mapping-valued properties
//! - [`close_reason`]: human-readable text for WebSocket close codes
//!
//! Everything in this crate is transport-agnostic; the connection machinery
//! lives in `liveupdate-client`.

#![deny(unsafe_code)]

pub mod close_code;
pub mod key;
pub mod patch;
pub mod wire;

pub use close_code::close_reason;
pub use key::PropertyKey;
pub use patch::patch_value;
pub use wire::{ClientFrame, ServerFrame, SetValue, SubscriptionEntry, ValueChange};
