//! Request and response messages.
//!
//! Either peer may originate a request. The id ties a response to the
//! request that caused it; ids are chosen by the side that sends the request.

use serde::{Deserialize, Serialize};

/// A request travelling over the socket, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Correlation id, unique among the sender's outstanding requests.
    pub id: u64,
    pub verb: String,
    pub path: String,
    /// Headers in `Name: value` form, order preserved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

impl RequestMessage {
    /// Create a request without headers or body. The id is filled in by
    /// whoever sends it.
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: 0,
            verb: verb.into(),
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a `name: value` header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(format!("{name}:{value}"));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Look up a header value by name, ignoring ASCII case. Returns the first
    /// match with surrounding whitespace trimmed.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|header| {
            let (key, value) = header.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

/// A response to a request, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Id of the request this answers.
    pub id: u64,
    pub status: u32,
    /// Reason phrase, e.g. `OK`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

impl ResponseMessage {
    pub fn new(id: u64, status: u32) -> Self {
        Self {
            id,
            status,
            message: None,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A `200 OK` response with no body.
    pub fn ok(id: u64) -> Self {
        Self::new(id, 200).with_message("OK")
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The unit written to and read from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Request(RequestMessage),
    Response(ResponseMessage),
}

impl Envelope {
    /// Correlation id of the carried message.
    pub fn id(&self) -> u64 {
        match self {
            Self::Request(request) => request.id,
            Self::Response(response) => response.id,
        }
    }
}

impl From<RequestMessage> for Envelope {
    fn from(request: RequestMessage) -> Self {
        Self::Request(request)
    }
}

impl From<ResponseMessage> for Envelope {
    fn from(response: ResponseMessage) -> Self {
        Self::Response(response)
    }
}
