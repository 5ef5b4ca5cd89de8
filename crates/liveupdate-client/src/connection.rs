//! Connection state machine types.
//!
//! The lifecycle is `Connecting → Open → Closed`; channel errors are a
//! transient diagnostic signal that precedes a close and never change the
//! state on their own. Status is published through a `tokio::sync::watch`
//! channel so consumers (e.g. a disconnected-overlay UI) can await changes.

use std::fmt;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A channel is being established.
    Connecting,
    /// The channel is open and subscriptions are active.
    Open,
    /// No channel. Also the initial state: a client never auto-connects.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(text)
    }
}

/// Current state plus human-readable diagnostic text.
///
/// `detail` carries the mapped close reason or transport error text of the
/// most recent close/error, and is empty while nothing noteworthy happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Diagnostic text for the last close or error.
    pub detail: String,
}

impl ConnectionStatus {
    /// Initial status of a freshly built client.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Closed,
            detail: String::new(),
        }
    }
}
