//! HTTP request layer over connection actors.
//!
//! Two ways to send a request:
//! - [`request`]: one-shot, on an actor opened for this call and torn down
//!   before it returns
//! - [`pool_request`]: on an actor borrowed from a fixed-size
//!   [`ConnectionPool`]
//!
//! Both race the reply against a deadline and return a [`Response`] or a
//! typed [`Error`].

// Core subsystems
pub mod client;
pub mod http;
pub mod pool;
pub mod transport;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use client::{request, Client};
pub use config::schema::ClientConfig;
pub use error::{Error, Result};
pub use http::{Method, Request, RequestOptions, Response};
pub use lifecycle::Shutdown;
pub use pool::{pool_request, ConnectionPool};
