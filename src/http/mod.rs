//! HTTP data model.
//!
//! # Data Flow
//! ```text
//! caller builds Request
//!     → client / pool (orchestration)
//!     → transport engine encodes and sends
//!     → ResponsePart messages
//!     → response.rs (ResponseAssembler)
//!     → Response returned to caller
//! ```

pub mod request;
pub mod response;

pub use request::{Method, Request, RequestOptions, RequestTiming};
pub use response::{Response, ResponseAssembler};
