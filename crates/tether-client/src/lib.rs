//! Persistent duplex RPC over a WebSocket.
//!
//! One long-lived socket carries correlated request/response pairs in both
//! directions. [`WebSocketConnection`] keeps the socket open across
//! network loss with a linear back-off, probes it with periodic keepalives,
//! matches responses to the requests that caused them, and hands requests
//! from the peer to a single consumer in arrival order.
//!
//! ```no_run
//! use std::time::Duration;
//! use tether_client::{TransportConfig, WebSocketConnection};
//! use tether_core::{RequestMessage, ResponseMessage};
//!
//! # async fn run() -> Result<(), tether_client::TransportError> {
//! let connection = WebSocketConnection::new(TransportConfig::new("https://chat.example.org"));
//! connection.connect();
//!
//! let response = connection
//!     .send_request(RequestMessage::new("GET", "/v1/ping"))?
//!     .with_timeout(Duration::from_secs(10))
//!     .await?;
//! println!("status {}", response.status);
//!
//! let request = connection.poll_request(Duration::from_secs(60)).await?;
//! connection.send_response(ResponseMessage::ok(request.id))?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod keepalive;
mod queue;
mod tracker;

pub use config::{
    AGENT_HEADER, DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DnsResolver,
    MIN_KEEPALIVE_INTERVAL, MIN_RECONNECT_STEP, ReconnectPolicy, RequestInterceptor,
    StaticResolver, TransportConfig, TransportSettings, WEBSOCKET_PATH,
};
pub use connection::{ConnectionEvent, WebSocketConnection};
pub use error::{ConfigError, ConnectError, TransportError};
pub use tether_core::{ConnectionState, Credentials, RequestMessage, ResponseMessage};
pub use tokio_tungstenite::Connector;
pub use tokio_tungstenite::tungstenite::handshake::client::Request as HandshakeRequest;
pub use tracker::ResponseHandle;
