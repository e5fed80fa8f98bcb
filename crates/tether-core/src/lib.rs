//! Core types for tether.
//!
//! This crate provides the wire primitives of the duplex RPC transport: the
//! request and response messages, the envelope that carries them, and the
//! codec that turns envelopes into binary WebSocket frames. Connection
//! management lives in `tether-client`.

mod codec;
mod credentials;
mod message;

pub use codec::{CodecError, decode, encode};
pub use credentials::{Credentials, CredentialsParseError};
pub use message::{Envelope, RequestMessage, ResponseMessage};

/// Verb of the liveness probe.
pub const KEEPALIVE_VERB: &str = "GET";

/// Path of the liveness probe. Responses to it are discarded.
pub const KEEPALIVE_PATH: &str = "/v1/keepalive";

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket, and none being opened.
    Disconnected,
    /// Opening the socket (TCP, TLS, WebSocket handshake).
    Connecting,
    /// Socket open; requests flow in both directions.
    Connected,
    /// Local close in progress.
    Closing,
}

impl ConnectionState {
    /// True when the connection cannot deliver frames and is not trying to.
    pub fn is_dead(self) -> bool {
        matches!(self, Self::Disconnected | Self::Closing)
    }

    /// True when an incoming request may still show up: the socket is open
    /// or about to be.
    pub fn can_receive(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}
