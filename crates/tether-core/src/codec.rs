//! Frame codec.
//!
//! A frame is the JSON encoding of
//!
//! ```text
//! { "type": "REQUEST" | "RESPONSE", "request": {..}?, "response": {..}? }
//! ```
//!
//! sent as a binary WebSocket message. Exactly one payload must be present
//! and it must match the type tag. Both functions are pure.

use crate::message::{Envelope, RequestMessage, ResponseMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum FrameType {
    Request,
    Response,
}

#[derive(Serialize, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: FrameType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request: Option<RequestMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ResponseMessage>,
}

/// Error encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("{0} frame has no {0} payload")]
    MissingPayload(&'static str),
    #[error("{0} frame also carries a {1} payload")]
    UnexpectedPayload(&'static str, &'static str),
}

/// Encode an envelope into frame bytes.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let frame = match envelope {
        Envelope::Request(request) => Frame {
            kind: FrameType::Request,
            request: Some(request.clone()),
            response: None,
        },
        Envelope::Response(response) => Frame {
            kind: FrameType::Response,
            request: None,
            response: Some(response.clone()),
        },
    };
    serde_json::to_vec(&frame).map_err(CodecError::Encode)
}

/// Decode frame bytes into an envelope.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let frame: Frame = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
    match (frame.kind, frame.request, frame.response) {
        (FrameType::Request, Some(request), None) => Ok(Envelope::Request(request)),
        (FrameType::Response, None, Some(response)) => Ok(Envelope::Response(response)),
        (FrameType::Request, None, _) => Err(CodecError::MissingPayload("request")),
        (FrameType::Response, _, None) => Err(CodecError::MissingPayload("response")),
        (FrameType::Request, Some(_), Some(_)) => {
            Err(CodecError::UnexpectedPayload("request", "response"))
        }
        (FrameType::Response, Some(_), Some(_)) => {
            Err(CodecError::UnexpectedPayload("response", "request"))
        }
    }
}
