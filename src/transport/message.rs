//! Messages exchanged with a connection actor.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{SendError, TransportError};
use crate::http::Request;

/// Engine-level request handed to an actor.
pub type OutboundRequest = hyper::Request<Bytes>;

/// Recipient of the messages an actor produces for one request.
pub type ReplyTo = mpsc::UnboundedSender<TransportMessage>;

/// One delivery from the engine. The last one of a response has `done` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePart {
    pub status_code: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub done: bool,
}

impl ResponsePart {
    /// A complete response in a single message.
    pub fn complete(status_code: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status_code: Some(status_code),
            headers,
            body,
            done: true,
        }
    }

    /// Status line and headers, body still to come.
    pub fn head(status_code: u16, headers: Vec<(String, String)>) -> Self {
        Self {
            status_code: Some(status_code),
            headers,
            body: Bytes::new(),
            done: false,
        }
    }

    pub fn chunk(body: Bytes) -> Self {
        Self {
            status_code: None,
            headers: Vec::new(),
            body,
            done: false,
        }
    }

    /// Empty terminal marker.
    pub fn finished() -> Self {
        Self {
            status_code: None,
            headers: Vec::new(),
            body: Bytes::new(),
            done: true,
        }
    }
}

/// What an actor sends to the recipient of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    Part(ResponsePart),
    Failed(TransportError),
}

/// Commands accepted by an actor's mailbox.
#[derive(Debug)]
pub enum ActorCommand {
    Request {
        request: OutboundRequest,
        reply_to: ReplyTo,
    },
}

/// Encode a caller request into the engine's request type.
///
/// Rejects header names or values and URIs that cannot go on the wire.
pub fn encode_request(request: &Request) -> Result<OutboundRequest, SendError> {
    let mut builder = hyper::Request::builder()
        .method(hyper::Method::from(request.method()))
        .uri(request.url());
    for (name, value) in request.header_pairs() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(request.body_bytes().clone())
        .map_err(|e| SendError::Invalid(e.to_string()))
}
