//! Error types.

use tether_core::CodecError;
use tokio_tungstenite::tungstenite;

/// Outcome of a failed send, poll or response wait.
///
/// Transport-internal faults (write failures, malformed frames) never show
/// up here directly; they surface as `ConnectionClosed` on whatever was
/// pending when the socket went down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The socket is not connected; nothing was sent.
    #[error("not connected")]
    NotConnected,
    /// The socket closed before the operation could complete.
    #[error("connection closed")]
    ConnectionClosed,
    /// A caller-imposed wait expired.
    #[error("timed out")]
    TimedOut,
    /// The frame could not be encoded; nothing was sent.
    ///
    /// Holds the rendered [`CodecError`] so the enum stays `Clone`, which
    /// closing needs to fail every waiter with one error. The codec's
    /// source chain is lost.
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl From<CodecError> for TransportError {
    fn from(error: CodecError) -> Self {
        TransportError::Encode(error.to_string())
    }
}

/// Why a single connection attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tcp connect failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("connect timed out")]
    Timeout,
    /// The server rejected the credentials (HTTP 401/403 on the handshake).
    #[error("authentication rejected with status {status}")]
    Authentication { status: u16 },
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),
}

impl ConnectError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, ConnectError::Authentication { .. })
    }
}

impl From<tungstenite::Error> for ConnectError {
    fn from(error: tungstenite::Error) -> Self {
        match &error {
            tungstenite::Error::Http(response)
                if matches!(response.status().as_u16(), 401 | 403) =>
            {
                ConnectError::Authentication {
                    status: response.status().as_u16(),
                }
            }
            _ => ConnectError::Handshake(error),
        }
    }
}

/// Error loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid credentials: {0}")]
    Credentials(#[from] tether_core::CredentialsParseError),
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::Response;

    fn http_error(status: u16) -> tungstenite::Error {
        let response = Response::builder().status(status).body(None::<Vec<u8>>).unwrap();
        tungstenite::Error::Http(response.into())
    }

    #[test]
    fn handshake_401_and_403_are_authentication_failures() {
        assert!(ConnectError::from(http_error(401)).is_authentication());
        assert!(ConnectError::from(http_error(403)).is_authentication());
    }

    #[test]
    fn other_handshake_statuses_are_generic() {
        let error = ConnectError::from(http_error(502));
        assert!(matches!(error, ConnectError::Handshake(_)));
        assert!(!error.is_authentication());
    }

    #[test]
    fn codec_errors_keep_their_message() {
        let error = TransportError::from(CodecError::MissingPayload("request"));
        assert_eq!(
            error,
            TransportError::Encode("request frame has no request payload".to_string())
        );
        assert_eq!(error.clone(), error);
    }
}
