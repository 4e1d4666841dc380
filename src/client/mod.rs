//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! request(method, url, headers, body, options)
//!     → oneshot.rs: open an ephemeral actor (bounded by the timeout)
//!     → exchange.rs: send, race the reply against the deadline,
//!                    outer watchdog at timeout + grace
//!     → terminate the actor (every exit path)
//!     → Response | Error
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every wait has a deadline
//! - Timeout errors are distinct from other errors
//! - The pool reuses exchange.rs unchanged against borrowed actors

use bytes::Bytes;

use crate::error::Result;
use crate::http::{Method, Request, RequestOptions, Response};

pub mod exchange;
pub mod oneshot;

pub use oneshot::Client;

/// One-shot request on the bundled hyper engine.
pub async fn request<I, K, V>(
    method: Method,
    url: impl Into<String>,
    headers: I,
    body: impl Into<Bytes>,
    options: RequestOptions,
) -> Result<Response>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let request = Request::new(method, url)
        .headers(headers)
        .body(body)
        .options(options);
    Client::new().request(request).await
}

pub(crate) fn outcome_label(outcome: &Result<Response>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    }
}
