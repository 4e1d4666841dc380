//! Request model.
//!
//! # Responsibilities
//! - Closed set of supported methods
//! - Immutable request value (method, url, ordered headers, body, options)
//! - Resolve per-request options against the process-wide defaults
//!
//! # Design Decisions
//! - Builder methods consume `self`; a built request cannot be mutated
//! - URL stays a string here; parsing is the transport engine's job
//! - Header order and duplicates are preserved as given

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::RequestDefaults;
use crate::error::Error;

/// HTTP methods accepted by the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(Error::InvalidRequest(format!("unsupported method '{}'", s))),
        }
    }
}

impl From<Method> for hyper::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => hyper::Method::GET,
            Method::Post => hyper::Method::POST,
            Method::Put => hyper::Method::PUT,
            Method::Patch => hyper::Method::PATCH,
            Method::Delete => hyper::Method::DELETE,
            Method::Options => hyper::Method::OPTIONS,
        }
    }
}

/// Per-request options. Unknown keys are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Reply timeout in milliseconds; overrides the process-wide default.
    #[serde(alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl RequestOptions {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: Some(timeout_ms),
        }
    }

    /// Combine these options with the process-wide defaults.
    pub fn resolve(&self, defaults: &RequestDefaults) -> Result<RequestTiming, Error> {
        let timeout = match self.timeout {
            Some(0) => {
                return Err(Error::InvalidRequest(
                    "timeout must be a positive number of milliseconds".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.timeout,
        };
        Ok(RequestTiming {
            timeout,
            grace: defaults.grace,
        })
    }
}

/// Effective deadlines for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTiming {
    /// Budget shared by opening the actor and waiting for the terminal reply.
    pub timeout: Duration,
    /// Margin the outer watchdog adds before abandoning the exchange.
    pub grace: Duration,
}

impl RequestTiming {
    /// Total time a caller may wait: the timeout plus the watchdog grace.
    pub fn watchdog(&self) -> Duration {
        self.timeout + self.grace
    }

    /// Absolute deadline for a request whose clock starts now. Opening the
    /// actor and waiting for the reply both count against it.
    pub fn deadline(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.timeout
    }
}

/// An outgoing request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    options: RequestOptions,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            options: RequestOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Append a header. Earlier headers with the same name are kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout = Some(timeout_ms);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn request_options(&self) -> &RequestOptions {
        &self.options
    }
}
