//! One request/reply exchange against an actor, bounded by deadlines.
//!
//! Shared by the one-shot client and the pool. Callers compute one absolute
//! deadline before opening (or borrowing) the actor and pass it here, so the
//! open and the reply wait share the same budget. The outer watchdog fires at
//! `deadline + grace` in case the inner race itself is starved.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::error::{Error, Result, TransportError};
use crate::http::{Request, Response, ResponseAssembler};
use crate::transport::{encode_request, ActorHandle, TransportMessage};

/// Send `request` on `actor` and wait for the terminal reply until `deadline`.
pub async fn run(actor: &ActorHandle, request: &Request, deadline: Instant, grace: Duration) -> Result<Response> {
    match timeout_at(deadline + grace, send_and_await(actor, request, deadline)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                actor_id = %actor.id(),
                grace_ms = grace.as_millis() as u64,
                "Watchdog expired before the reply deadline fired"
            );
            Err(Error::Timeout)
        }
    }
}

async fn send_and_await(actor: &ActorHandle, request: &Request, deadline: Instant) -> Result<Response> {
    let outbound = encode_request(request)?;
    let (reply_to, mut replies) = mpsc::unbounded_channel();
    actor.send_request(outbound, reply_to)?;

    let mut assembler = ResponseAssembler::new();
    loop {
        match timeout_at(deadline, replies.recv()).await {
            Err(_) => {
                tracing::debug!(
                    actor_id = %actor.id(),
                    parts = assembler.parts(),
                    "No terminal reply before deadline"
                );
                return Err(Error::Timeout);
            }
            Ok(None) => return Err(TransportError::ActorExited.into()),
            Ok(Some(TransportMessage::Failed(e))) => return Err(e.into()),
            Ok(Some(TransportMessage::Part(part))) => {
                if let Some(response) = assembler.push(part)? {
                    return Ok(response);
                }
            }
        }
    }
}
