//! One-shot request orchestration: one ephemeral actor per call.

use std::time::Instant as StdInstant;

use tokio::time::{timeout_at, Instant};

use crate::client::{exchange, outcome_label};
use crate::config::{defaults, RequestDefaults};
use crate::error::{ConnectError, Result};
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::transport::{HyperTransport, Transport};

/// Issues each request on a freshly opened actor and tears it down before
/// returning.
///
/// No state is shared between calls, so a `Client` can be used from many
/// tasks at once.
#[derive(Debug, Clone)]
pub struct Client<T: Transport = HyperTransport> {
    transport: T,
    defaults: Option<RequestDefaults>,
}

impl Client<HyperTransport> {
    pub fn new() -> Self {
        Self::with_transport(HyperTransport::new())
    }
}

impl Default for Client<HyperTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            defaults: None,
        }
    }

    /// Pin defaults for this client instead of reading the process-wide ones.
    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn defaults(&self) -> RequestDefaults {
        self.defaults.unwrap_or_else(|| *defaults::current())
    }

    /// Execute a request on a dedicated actor.
    ///
    /// The actor is terminated before this returns, whatever the outcome. If
    /// the returned future is dropped early the actor is aborted by its
    /// handle's `Drop`.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let start = StdInstant::now();
        let outcome = self.execute(&request).await;
        metrics::record_request("oneshot", outcome_label(&outcome), start);
        outcome
    }

    async fn execute(&self, request: &Request) -> Result<Response> {
        let timing = request.request_options().resolve(&self.defaults())?;
        let deadline = timing.deadline();

        let mut actor = match timeout_at(deadline, self.transport.open(request.url())).await {
            Ok(Ok(actor)) => actor,
            Ok(Err(e)) => {
                tracing::warn!(url = %request.url(), error = %e, "Failed to open connection actor");
                return Err(e.into());
            }
            Err(_) => {
                let ms = timing.timeout.as_millis() as u64;
                tracing::warn!(url = %request.url(), timeout_ms = ms, "Opening connection actor timed out");
                return Err(ConnectError::TimedOut(ms).into());
            }
        };

        tracing::debug!(
            actor_id = %actor.id(),
            method = %request.method(),
            url = %request.url(),
            remaining_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "Dispatching one-shot request"
        );

        let outcome = exchange::run(&actor, request, deadline, timing.grace).await;
        actor.terminate().await;

        if let Err(e) = &outcome {
            tracing::debug!(actor_id = %actor.id(), kind = e.kind(), error = %e, "One-shot request failed");
        }
        outcome
    }
}
