//! Transport engine interface.
//!
//! # Data Flow
//! ```text
//! Transport::open(url)
//!     → spawns one actor task (actor.rs) owning one connection
//!     → returns ActorHandle
//!
//! ActorHandle::send_request(request, reply_to)
//!     → ActorCommand into the actor's mailbox
//!     → actor writes the request, reads the response
//!     → TransportMessage::Part ... (done = true) | TransportMessage::Failed
//!     → reply_to
//! ```
//!
//! # Design Decisions
//! - Wire work (TCP, HTTP/1 framing) stays behind this trait; the bundled
//!   engine delegates it to hyper (hyper_engine.rs)
//! - Every actor registers with an ActorTracker so leaked tasks are visible
//! - Termination of the actor task is the only cancellation mechanism

use std::future::Future;

use crate::error::ConnectError;

pub mod actor;
pub mod hyper_engine;
pub mod message;
pub mod tracker;

pub use actor::ActorHandle;
pub use hyper_engine::HyperTransport;
pub use message::{encode_request, ActorCommand, OutboundRequest, ReplyTo, ResponsePart, TransportMessage};
pub use tracker::{ActorId, ActorTracker};

/// A transport engine that can open connection actors.
pub trait Transport: Send + Sync + 'static {
    /// Open a new actor connected to the host named by `url`.
    fn open(&self, url: &str) -> impl Future<Output = Result<ActorHandle, ConnectError>> + Send;
}
