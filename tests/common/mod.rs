//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use courier::error::{ConnectError, TransportError};
use courier::transport::{
    ActorCommand, ActorHandle, ActorId, ActorTracker, ResponsePart, Transport, TransportMessage,
};

/// What a scripted actor does with each request it receives.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Reply with one complete part after `delay`. The body is echoed back
    /// when `body` is empty.
    Reply {
        status: u16,
        body: &'static str,
        delay: Duration,
    },
    /// Take the request and never answer.
    Silent,
    /// Head, then one part per chunk, then a terminal marker.
    Streamed {
        status: u16,
        chunks: &'static [&'static str],
    },
    /// Reply at once, then stop the actor after `linger`.
    ReplyThenExit { linger: Duration },
    /// Report a connection reset.
    Reset,
    /// Exit without sending anything.
    Vanish,
}

impl Behavior {
    pub fn ok(body: &'static str) -> Self {
        Behavior::Reply {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(body: &'static str, delay: Duration) -> Self {
        Behavior::Reply {
            status: 200,
            body,
            delay,
        }
    }
}

struct Script {
    tracker: ActorTracker,
    behavior: Mutex<Behavior>,
    refuse: AtomicBool,
    refuse_next: AtomicUsize,
    open_delay: Mutex<Duration>,
    opens: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    served: Mutex<Vec<ActorId>>,
}

/// In-process transport whose actors follow a [`Behavior`].
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Script>,
}

impl ScriptedTransport {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            script: Arc::new(Script {
                tracker: ActorTracker::new(),
                behavior: Mutex::new(behavior),
                refuse: AtomicBool::new(false),
                refuse_next: AtomicUsize::new(0),
                open_delay: Mutex::new(Duration::ZERO),
                opens: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                served: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.script.behavior.lock().unwrap() = behavior;
    }

    /// Refuse every open until switched back.
    pub fn set_refuse(&self, refuse: bool) {
        self.script.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Refuse the next `n` opens.
    pub fn refuse_next(&self, n: usize) {
        self.script.refuse_next.store(n, Ordering::SeqCst);
    }

    /// Make every open take `delay` before it succeeds or is refused.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.script.open_delay.lock().unwrap() = delay;
    }

    pub fn tracker(&self) -> &ActorTracker {
        &self.script.tracker
    }

    pub fn live_actors(&self) -> u64 {
        self.script.tracker.live_count()
    }

    pub fn opens(&self) -> usize {
        self.script.opens.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.script.max_in_flight.load(Ordering::SeqCst)
    }

    /// Actor ids in the order they received requests.
    pub fn served(&self) -> Vec<ActorId> {
        self.script.served.lock().unwrap().clone()
    }

    pub fn distinct_actors_served(&self) -> usize {
        self.served().into_iter().collect::<HashSet<_>>().len()
    }
}

impl Transport for ScriptedTransport {
    async fn open(&self, _url: &str) -> Result<ActorHandle, ConnectError> {
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        let delay = *self.script.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let refuse_once = self
            .script
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refuse_once || self.script.refuse.load(Ordering::SeqCst) {
            return Err(ConnectError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )));
        }

        let script = Arc::clone(&self.script);
        Ok(ActorHandle::spawn(&self.script.tracker, move |id, mailbox| {
            serve(script, id, mailbox)
        }))
    }
}

struct FlightGuard(Arc<Script>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn serve(script: Arc<Script>, id: ActorId, mut mailbox: mpsc::Receiver<ActorCommand>) {
    while let Some(ActorCommand::Request { request, reply_to }) = mailbox.recv().await {
        script.served.lock().unwrap().push(id);
        let now = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        script.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _flight = FlightGuard(Arc::clone(&script));

        let behavior = *script.behavior.lock().unwrap();
        let actor_header = vec![("x-actor".to_string(), id.to_string())];
        match behavior {
            Behavior::Reply {
                status,
                body,
                delay,
            } => {
                tokio::time::sleep(delay).await;
                let body = if body.is_empty() {
                    request.into_body()
                } else {
                    Bytes::from_static(body.as_bytes())
                };
                let part = ResponsePart::complete(status, actor_header, body);
                let _ = reply_to.send(TransportMessage::Part(part));
            }
            Behavior::Silent => std::future::pending::<()>().await,
            Behavior::Streamed { status, chunks } => {
                let _ = reply_to.send(TransportMessage::Part(ResponsePart::head(status, actor_header)));
                for chunk in chunks {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let part = ResponsePart::chunk(Bytes::from_static(chunk.as_bytes()));
                    let _ = reply_to.send(TransportMessage::Part(part));
                }
                let _ = reply_to.send(TransportMessage::Part(ResponsePart::finished()));
            }
            Behavior::ReplyThenExit { linger } => {
                let part = ResponsePart::complete(200, actor_header, Bytes::from_static(b"bye"));
                let _ = reply_to.send(TransportMessage::Part(part));
                drop(_flight);
                tokio::time::sleep(linger).await;
                return;
            }
            Behavior::Reset => {
                let err = TransportError::Connection("scripted reset".to_string());
                let _ = reply_to.send(TransportMessage::Failed(err));
            }
            Behavior::Vanish => return,
        }
    }
}

/// Poll `check` every 10ms for up to two seconds.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Counters of a running mock backend.
#[derive(Clone, Default)]
pub struct BackendStats {
    accepted: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl BackendStats {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Start a keep-alive HTTP/1.1 backend on an ephemeral port.
///
/// Every response is `200 OK` with `x-method` and `x-path` headers and a body
/// of `"{method} {path} {request body}"`.
pub async fn start_mock_backend() -> (SocketAddr, BackendStats) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = BackendStats::default();

    let accept_stats = stats.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    accept_stats.accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle_connection(socket, accept_stats.clone()));
                }
                Err(_) => break,
            }
        }
    });

    (addr, stats)
}

/// Backend that answers every request on a connection with `raw` verbatim.
pub async fn start_fixed_backend(raw: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                while read_request(&mut socket, &mut buf).await.is_some() {
                    if socket.write_all(raw.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    addr
}

async fn handle_connection(mut socket: TcpStream, stats: BackendStats) {
    let mut buf = Vec::new();
    loop {
        let Some((method, path, body)) = read_request(&mut socket, &mut buf).await else {
            return;
        };
        stats.requests.fetch_add(1, Ordering::SeqCst);

        let payload = format!("{} {} {}", method, path, body);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nx-method: {}\r\nx-path: {}\r\n\r\n{}",
            payload.len(),
            method,
            path,
            payload
        );
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Read one request from `socket`, keeping leftover bytes in `buf`.
async fn read_request(socket: &mut TcpStream, buf: &mut Vec<u8>) -> Option<(String, String, String)> {
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = String::from_utf8_lossy(&buf[head_end..head_end + content_length]).into_owned();
    buf.drain(..head_end + content_length);
    Some((method, path, body))
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
