//! HTTP/1 transport engine backed by hyper.
//!
//! Each actor owns one `TcpStream`, a hyper `SendRequest` and the matching
//! `Connection` future, and drives all three from a single task. Aborting the
//! task drops the socket.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, Connection, SendRequest};
use hyper::header::{HeaderValue, HOST};
use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use url::{Host, Url};

use crate::error::{ConnectError, TransportError};
use crate::transport::actor::ActorHandle;
use crate::transport::message::{
    ActorCommand, OutboundRequest, ReplyTo, ResponsePart, TransportMessage,
};
use crate::transport::tracker::{ActorId, ActorTracker};
use crate::transport::Transport;

type Conn = Connection<TokioIo<TcpStream>, Full<Bytes>>;

/// Plain-HTTP transport engine.
///
/// Response headers pass through `http::HeaderMap`, which groups repeated
/// names; see [`crate::http::Response::headers`].
#[derive(Debug, Clone, Default)]
pub struct HyperTransport {
    tracker: ActorTracker,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liveness accounting for every actor this engine opened.
    pub fn tracker(&self) -> &ActorTracker {
        &self.tracker
    }
}

impl Transport for HyperTransport {
    async fn open(&self, url: &str) -> Result<ActorHandle, ConnectError> {
        let target = Target::parse(url)?;

        let stream = TcpStream::connect((target.host.as_str(), target.port)).await?;
        stream.set_nodelay(true)?;

        let (sender, connection) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
            .await
            .map_err(|e| ConnectError::Handshake(e.to_string()))?;

        tracing::debug!(host = %target.host, port = target.port, "Connection established");

        let authority = target.authority;
        Ok(ActorHandle::spawn(&self.tracker, move |id, mailbox| {
            run_actor(id, sender, connection, mailbox, authority)
        }))
    }
}

/// Where an actor connects, derived from the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    authority: String,
}

impl Target {
    fn parse(raw: &str) -> Result<Self, ConnectError> {
        let url = Url::parse(raw).map_err(|e| ConnectError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" {
            return Err(ConnectError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => {
                return Err(ConnectError::InvalidUrl {
                    url: raw.to_string(),
                    reason: "missing host".to_string(),
                })
            }
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => host.clone(),
        };
        Ok(Self {
            host,
            port,
            authority,
        })
    }
}

async fn run_actor(
    id: ActorId,
    mut sender: SendRequest<Full<Bytes>>,
    connection: Conn,
    mut mailbox: mpsc::Receiver<ActorCommand>,
    authority: String,
) {
    tokio::pin!(connection);

    loop {
        tokio::select! {
            result = &mut connection => {
                match result {
                    Ok(()) => tracing::debug!(actor_id = %id, "Connection closed by peer"),
                    Err(e) => tracing::debug!(actor_id = %id, error = %e, "Connection failed"),
                }
                return;
            }
            command = mailbox.recv() => {
                let Some(ActorCommand::Request { request, reply_to }) = command else {
                    tracing::debug!(actor_id = %id, "Mailbox closed");
                    return;
                };
                tracing::trace!(actor_id = %id, method = %request.method(), uri = %request.uri(), "Forwarding request");

                let exchange = forward(&mut sender, request, &authority, reply_to);
                tokio::pin!(exchange);
                tokio::select! {
                    () = &mut exchange => {}
                    result = &mut connection => {
                        if let Err(e) = result {
                            tracing::debug!(actor_id = %id, error = %e, "Connection failed mid-request");
                        }
                        // Let the exchange drain what hyper already buffered; it
                        // errors out on its own once the connection is gone.
                        exchange.await;
                        return;
                    }
                }
            }
        }
    }
}

async fn forward(
    sender: &mut SendRequest<Full<Bytes>>,
    request: OutboundRequest,
    authority: &str,
    reply_to: ReplyTo,
) {
    let fail = |err: TransportError| {
        let _ = reply_to.send(TransportMessage::Failed(err));
    };

    if let Err(e) = sender.ready().await {
        fail(classify(&e));
        return;
    }
    let response = match sender.send_request(into_origin_form(request, authority)).await {
        Ok(response) => response,
        Err(e) => {
            fail(classify(&e));
            return;
        }
    };

    let (parts, mut body) = response.into_parts();
    // Iteration yields each name's values together, in wire order.
    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let head = ResponsePart::head(parts.status.as_u16(), headers);
    if reply_to.send(TransportMessage::Part(head)).is_err() {
        return;
    }

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                // Trailers are not part of the response model.
                if let Ok(data) = frame.into_data() {
                    if reply_to
                        .send(TransportMessage::Part(ResponsePart::chunk(data)))
                        .is_err()
                    {
                        return;
                    }
                }
            }
            Err(e) => {
                fail(classify(&e));
                return;
            }
        }
    }

    let _ = reply_to.send(TransportMessage::Part(ResponsePart::finished()));
}

fn classify(err: &hyper::Error) -> TransportError {
    if err.is_parse() || err.is_parse_status() {
        TransportError::Protocol(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

/// Rewrite an absolute-form request into origin-form and make sure it
/// carries a Host header.
fn into_origin_form(request: OutboundRequest, authority: &str) -> hyper::Request<Full<Bytes>> {
    let (mut parts, body) = request.into_parts();

    if !parts.headers.contains_key(HOST) {
        if let Ok(value) = HeaderValue::from_str(authority) {
            parts.headers.insert(HOST, value);
        }
    }
    let origin: Uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .parse()
        .unwrap_or_else(|_| Uri::from_static("/"));
    parts.uri = origin;

    hyper::Request::from_parts(parts, Full::new(body))
}
