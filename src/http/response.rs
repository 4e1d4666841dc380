//! Response model and assembly.
//!
//! # Responsibilities
//! - Structured result returned to callers
//! - Fold one or more transport messages into a single Response
//!
//! # Design Decisions
//! - A single terminal part carrying everything is the common case
//! - Streamed parts accumulate: status from the first part that has one,
//!   headers appended in arrival order, body chunks concatenated
//! - A terminal part without any status is a protocol error

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::transport::ResponsePart;

/// A completed (or partially drained) HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    /// Headers in the order the engine reported them, duplicates kept.
    ///
    /// `HyperTransport` reports repeated names grouped together at the
    /// position of their first occurrence, so `a, b, a` arrives as `a, a, b`.
    /// Values under one name keep their wire order.
    pub headers: Vec<(String, String)>,
    #[serde(with = "body_text")]
    pub body: Bytes,
    /// True once the engine signalled completion.
    pub done: bool,
}

impl Response {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Accumulates transport messages for one request.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    status_code: Option<u16>,
    headers: Vec<(String, String)>,
    body: BytesMut,
    parts: usize,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parts folded in so far.
    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Fold in one part. Returns the finished response on the terminal part.
    pub fn push(&mut self, part: ResponsePart) -> Result<Option<Response>, TransportError> {
        self.parts += 1;
        if self.status_code.is_none() {
            self.status_code = part.status_code;
        }
        self.headers.extend(part.headers);
        self.body.extend_from_slice(&part.body);

        if !part.done {
            return Ok(None);
        }

        let status_code = self.status_code.ok_or_else(|| {
            TransportError::Protocol("response completed without a status code".to_string())
        })?;
        Ok(Some(Response {
            status_code,
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body).freeze(),
            done: true,
        }))
    }

    /// Snapshot of what has arrived so far, with `done` false.
    pub fn partial(&self) -> Option<Response> {
        self.status_code.map(|status_code| Response {
            status_code,
            headers: self.headers.clone(),
            body: Bytes::copy_from_slice(&self.body),
            done: false,
        })
    }
}

mod body_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Bytes::from(text))
    }
}
