//! Connection pool behaviour against scripted actors.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use courier::config::{PoolConfig, RequestDefaults};
use courier::error::{ConnectError, Error, TransportError};
use courier::{pool_request, ConnectionPool, Method, Request, RequestOptions, Shutdown};

mod common;

use common::{eventually, Behavior, ScriptedTransport};

const URL: &str = "http://svc.test/items";

fn pool_config(capacity: usize) -> PoolConfig {
    PoolConfig {
        capacity,
        target_url: "http://svc.test".to_string(),
        monitor_interval_ms: 20,
        revive_base_delay_ms: 10,
        revive_max_delay_ms: 50,
        ..PoolConfig::default()
    }
}

fn pool(capacity: usize, behavior: Behavior) -> (ConnectionPool<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::new(behavior);
    let pool = ConnectionPool::with_transport(pool_config(capacity), transport.clone())
        .expect("valid pool config");
    pool.set_defaults(RequestDefaults {
        timeout: Duration::from_millis(500),
        grace: Duration::from_millis(50),
    });
    (pool, transport)
}

#[tokio::test]
async fn test_invalid_pool_config_rejected() {
    let transport = ScriptedTransport::new(Behavior::ok("x"));

    let err = ConnectionPool::with_transport(pool_config(0), transport.clone()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let mut config = pool_config(2);
    config.target_url = "not a url".to_string();
    let err = ConnectionPool::with_transport(config, transport).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_slots_open_lazily_and_are_reused() {
    let (pool, transport) = pool(2, Behavior::ok("hi"));
    assert_eq!(transport.opens(), 0);

    for _ in 0..10 {
        let response = pool.request(Request::get(URL)).await.unwrap();
        assert_eq!(response.text(), "hi");
    }

    assert_eq!(transport.opens(), 2);
    assert_eq!(transport.distinct_actors_served(), 2);
    assert_eq!(transport.live_actors(), 2);

    let status = pool.status();
    assert_eq!(status.idle, 2);
    assert_eq!(status.in_use, 0);
}

#[tokio::test]
async fn test_warm_up_opens_every_slot() {
    let (pool, transport) = pool(3, Behavior::ok("hi"));

    assert_eq!(pool.warm_up().await, 3);
    assert_eq!(transport.live_actors(), 3);

    // Already open, nothing to do.
    assert_eq!(pool.warm_up().await, 0);
    assert_eq!(transport.opens(), 3);
}

#[tokio::test]
async fn test_no_actor_serves_two_borrowers() {
    let (pool, transport) = pool(3, Behavior::delayed("ok", Duration::from_millis(20)));

    let mut tasks = Vec::new();
    for _ in 0..30 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move { pool.request(Request::get(URL)).await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().status_code, 200);
    }

    assert!(transport.max_in_flight() <= 3, "max in flight {}", transport.max_in_flight());
    assert!(transport.distinct_actors_served() <= 3);
    assert_eq!(transport.served().len(), 30);
}

#[tokio::test]
async fn test_held_connections_are_distinct() {
    let (pool, _transport) = pool(2, Behavior::ok("x"));

    let a = pool.checkout().await.unwrap();
    let b = pool.checkout().await.unwrap();

    assert_ne!(a.slot_id(), b.slot_id());
    assert_ne!(a.actor().unwrap().id(), b.actor().unwrap().id());
    assert_eq!(pool.status().in_use, 2);

    pool.checkin(a);
    pool.checkin(b);
    assert_eq!(pool.status().idle, 2);
}

#[tokio::test]
async fn test_checkout_waits_for_checkin() {
    let (pool, _transport) = pool(1, Behavior::ok("x"));

    let held = pool.checkout().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.checkout().await.map(|conn| conn.slot_id()) })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!waiter.is_finished());

    let slot = held.slot_id();
    pool.checkin(held);

    let got = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should be served")
        .unwrap()
        .unwrap();
    assert_eq!(got, slot);
}

#[tokio::test]
async fn test_waiters_served_in_arrival_order() {
    let (pool, _transport) = pool(1, Behavior::ok("x"));
    let order = Arc::new(Mutex::new(Vec::new()));

    let held = pool.checkout().await.unwrap();
    let mut waiters = Vec::new();
    for i in 0..4 {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let conn = pool.checkout().await.unwrap();
            order.lock().unwrap().push(i);
            tokio::time::sleep(Duration::from_millis(5)).await;
            pool.checkin(conn);
        }));
        // Let the waiter queue up before the next one arrives.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    pool.checkin(held);
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_timeout_replaces_actor() {
    let (pool, transport) = pool(1, Behavior::Silent);

    let err = pool.request(Request::get(URL).timeout_ms(30)).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));

    transport.set_behavior(Behavior::ok("fresh"));
    let response = pool.request(Request::get(URL)).await.unwrap();
    assert_eq!(response.text(), "fresh");

    let served = transport.served();
    assert_eq!(served.len(), 2);
    assert_ne!(served[0], served[1], "timed-out actor must not be reused");
    assert_eq!(transport.live_actors(), 1);
    assert_eq!(pool.health().replacements, 1);
}

#[tokio::test]
async fn test_transport_error_replaces_actor() {
    let (pool, transport) = pool(1, Behavior::Reset);

    let err = pool.request(Request::get(URL)).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Connection(_))));

    transport.set_behavior(Behavior::ok("fresh"));
    pool.request(Request::get(URL)).await.unwrap();

    let served = transport.served();
    assert_ne!(served[0], served[1]);
    assert_eq!(transport.opens(), 2);
}

#[tokio::test]
async fn test_error_status_keeps_actor() {
    let (pool, transport) = pool(
        1,
        Behavior::Reply {
            status: 503,
            body: "busy",
            delay: Duration::ZERO,
        },
    );

    let first = pool.request(Request::get(URL)).await.unwrap();
    let second = pool.request(Request::get(URL)).await.unwrap();

    assert_eq!(first.status_code, 503);
    assert_eq!(second.status_code, 503);
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.distinct_actors_served(), 1);
}

#[tokio::test]
async fn test_dropped_connection_is_replaced() {
    let (pool, transport) = pool(1, Behavior::ok("x"));

    let conn = pool.checkout().await.unwrap();
    let first = conn.actor().unwrap().id();
    drop(conn);

    let conn = pool.checkout().await.unwrap();
    assert_ne!(conn.actor().unwrap().id(), first);
    pool.checkin(conn);

    assert_eq!(pool.health().replacements, 1);
    assert_eq!(transport.live_actors(), 1);
}

#[tokio::test]
async fn test_idle_actor_death_detected_at_checkout() {
    let (pool, transport) = pool(
        1,
        Behavior::ReplyThenExit {
            linger: Duration::from_millis(20),
        },
    );

    let response = pool.request(Request::get(URL)).await.unwrap();
    assert_eq!(response.text(), "bye");
    assert!(eventually(|| transport.live_actors() == 0).await);

    transport.set_behavior(Behavior::ok("again"));
    let response = pool.request(Request::get(URL)).await.unwrap();
    assert_eq!(response.text(), "again");

    assert_eq!(transport.opens(), 2);
    assert_eq!(pool.health().silent_deaths, 1);
}

#[tokio::test]
async fn test_failed_replacement_degrades_capacity() {
    let (pool, transport) = pool(2, Behavior::Silent);
    assert_eq!(pool.warm_up().await, 2);
    transport.set_refuse(true);

    // The caller sees the timeout, never the replacement failure.
    let err = pool.request(Request::get(URL).timeout_ms(30)).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));

    assert!(eventually(|| pool.status().dead == 1).await);
    assert_eq!(pool.effective_capacity(), 1);
    assert_eq!(pool.health().replacement_failures, 1);

    // The surviving slot keeps serving.
    transport.set_behavior(Behavior::ok("still here"));
    let response = pool.request(Request::get(URL)).await.unwrap();
    assert_eq!(response.text(), "still here");
}

#[tokio::test]
async fn test_monitor_revives_dead_slot() {
    let (pool, transport) = pool(1, Behavior::Silent);
    pool.warm_up().await;
    transport.set_refuse(true);

    let err = pool.request(Request::get(URL).timeout_ms(30)).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(eventually(|| pool.effective_capacity() == 0).await);

    // No capacity left: checkout blocks.
    let blocked = tokio::time::timeout(Duration::from_millis(100), pool.checkout()).await;
    assert!(blocked.is_err());

    transport.set_refuse(false);
    transport.set_behavior(Behavior::ok("revived"));
    let shutdown = Shutdown::new();
    let monitor = pool.spawn_monitor(shutdown.subscribe());

    assert!(eventually(|| pool.effective_capacity() == 1).await);
    assert_eq!(pool.health().revivals, 1);

    let response = pool.request(Request::get(URL)).await.unwrap();
    assert_eq!(response.text(), "revived");
    assert_eq!(pool.capacity(), 1);

    shutdown.trigger();
    monitor.await.unwrap();
}

#[tokio::test]
async fn test_monitor_replaces_silently_dead_idle_actor() {
    let (pool, transport) = pool(
        1,
        Behavior::ReplyThenExit {
            linger: Duration::from_millis(10),
        },
    );
    pool.request(Request::get(URL)).await.unwrap();

    let shutdown = Shutdown::new();
    let monitor = pool.spawn_monitor(shutdown.subscribe());

    assert!(eventually(|| pool.health().silent_deaths == 1).await);
    assert!(eventually(|| transport.live_actors() == 1).await);
    assert_eq!(transport.opens(), 2);

    shutdown.trigger();
    monitor.await.unwrap();
}

#[tokio::test]
async fn test_lazy_open_bounded_by_request_timeout() {
    let (pool, transport) = pool(1, Behavior::ok("unused"));
    transport.set_open_delay(Duration::from_millis(1_500));

    let start = Instant::now();
    let err = pool.request(Request::get(URL).timeout_ms(50)).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, Error::Connect(ConnectError::TimedOut(_))), "got {:?}", err);
    assert!(elapsed < Duration::from_millis(200), "took {:?}", elapsed);

    // The slot goes back vacant and can be opened by the next caller.
    let status = pool.status();
    assert_eq!(status.idle, 1);
    assert_eq!(status.in_use, 0);
    assert_eq!(transport.live_actors(), 0);
}

#[tokio::test]
async fn test_lazy_open_and_reply_share_one_deadline() {
    let (pool, transport) = pool(1, Behavior::Silent);
    transport.set_open_delay(Duration::from_millis(150));

    let start = Instant::now();
    let err = pool.request(Request::get(URL).timeout_ms(200)).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, Error::Timeout), "got {:?}", err);
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(310), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_close_retires_idle_and_returned_slots() {
    let (pool, transport) = pool(2, Behavior::ok("x"));
    assert_eq!(pool.warm_up().await, 2);

    let held = pool.checkout().await.unwrap();
    pool.close().await;

    let status = pool.status();
    assert_eq!(status.idle, 0);
    assert_eq!(status.in_use, 1);
    assert_eq!(status.closed, 1);

    pool.checkin(held);
    let status = pool.status();
    assert_eq!(status.idle, 0);
    assert_eq!(status.in_use, 0);
    assert_eq!(status.closed, 2);
    assert!(transport.tracker().wait_until_idle(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_revival_finishing_after_close_is_dropped() {
    let (pool, transport) = pool(1, Behavior::Silent);
    pool.warm_up().await;
    transport.set_refuse(true);

    let err = pool.request(Request::get(URL).timeout_ms(30)).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(eventually(|| pool.status().dead == 1).await);
    let failed_opens = transport.opens();

    transport.set_refuse(false);
    transport.set_open_delay(Duration::from_millis(100));
    let shutdown = Shutdown::new();
    shutdown.track(pool.spawn_monitor(shutdown.subscribe()));

    // Close while the revival open is still in progress.
    assert!(eventually(|| transport.opens() > failed_opens).await);
    pool.close().await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(transport.live_actors(), 0);
    let status = pool.status();
    assert_eq!(status.idle, 0);
    assert_eq!(status.closed, 1);
    assert_eq!(pool.health().revivals, 0);
    assert!(matches!(pool.checkout().await, Err(Error::PoolClosed)));

    assert_eq!(shutdown.complete(Duration::from_secs(1)).await, 0);
}

#[tokio::test]
async fn test_foreign_origin_rejected() {
    let (pool, transport) = pool(1, Behavior::ok("x"));

    let err = pool
        .request(Request::get("http://elsewhere.test/items"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(transport.opens(), 0);
}

#[tokio::test]
async fn test_close_fails_pending_and_future_checkouts() {
    let (pool, transport) = pool(1, Behavior::ok("x"));

    let held = pool.checkout().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.checkout().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.close().await;

    assert!(matches!(waiter.await.unwrap(), Err(Error::PoolClosed)));
    assert!(matches!(pool.request(Request::get(URL)).await, Err(Error::PoolClosed)));

    pool.checkin(held);
    assert!(transport.tracker().wait_until_idle(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_pool_request_function() {
    let (pool, _transport) = pool(2, Behavior::ok(""));

    let response = pool_request(
        &pool,
        Method::Post,
        URL,
        vec![("content-type", "text/plain")],
        "echo me",
        RequestOptions::with_timeout_ms(200),
    )
    .await
    .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.text(), "echo me");
}
