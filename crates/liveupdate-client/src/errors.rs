//! Client error types.

use thiserror::Error;

/// Errors raised while establishing or using the duplex channel.
///
/// Transport errors are non-fatal to the client as a whole: they surface as
/// connection diagnostic text, and reconnection stays caller-driven.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the channel failed.
    #[error("failed to connect: {context}")]
    Connect {
        /// What went wrong while connecting.
        context: String,
    },
    /// Sending on an established channel failed.
    #[error("failed to send: {context}")]
    Send {
        /// What went wrong while sending.
        context: String,
    },
}

/// Construction-time configuration failures. These fail fast.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The server host is required and was empty.
    #[error("server host is required")]
    MissingHost,
}
