//! Session and transport error types.

use gateway_wire::{CloseCode, WireError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a transport implementation
#[derive(Error, Debug)]
pub enum TransportError {
    /// TCP connection could not be established
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// Address that was dialed
        addr: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// WebSocket upgrade rejected or malformed
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// WebSocket upgrade did not finish in time
    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Reading from the connection failed
    #[error("read failed: {0}")]
    Read(String),

    /// Writing to the connection failed
    #[error("write failed: {0}")]
    Write(String),

    /// The connection was already closed locally
    #[error("transport closed")]
    Closed,
}

/// Errors that end a gateway session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport could not connect
    #[error("gateway connect failed: {0}")]
    Connect(#[source] TransportError),

    /// Transport connected but the WebSocket handshake failed
    #[error("gateway handshake failed: {0}")]
    Handshake(#[source] TransportError),

    /// First frame was not a textual hello
    #[error("expected hello as first frame, got {0}")]
    HelloUnexpected(String),

    /// Inbound envelope could not be decoded
    #[error("envelope decode failed: {0}")]
    EnvelopeDecode(#[source] WireError),

    /// Outbound payload could not be encoded
    #[error("outbound encode failed: {0}")]
    Encode(#[source] WireError),

    /// Outbound write failed; liveness cannot be maintained
    #[error("gateway write failed: {0}")]
    Write(#[source] TransportError),

    /// Inbound read failed
    #[error("gateway read failed: {0}")]
    Read(#[source] TransportError),

    /// Peer closed the connection without a local shutdown
    #[error("gateway closed the connection (code {code:?})")]
    Closed {
        /// Close code sent by the peer, if any
        code: Option<u16>,
    },
}

impl SessionError {
    /// Gateway close code carried by a `Closed` error, if it is a known one
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            SessionError::Closed { code: Some(code) } => CloseCode::from_u16(*code),
            _ => None,
        }
    }
}
