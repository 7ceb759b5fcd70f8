//! Lifecycle tests over the in-memory store.
//!
//! Requests are sent over a raw TCP socket so the real listener and the
//! graceful-shutdown path are exercised.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ticket_inventory_core::{
    InventoryStore, NewTicketOption, Purchase, StoreFuture, TicketOption, TicketOptionId,
};
use ticket_inventory_server::{Application, VERSION};
use ticket_inventory_testing::InMemoryInventoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Send one request with `Connection: close` and return the raw response.
async fn request(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(raw.as_bytes()).await.expect("write");

    let mut response = String::new();
    stream.read_to_string(&mut response).await.expect("read");
    response
}

async fn start(store: Arc<dyn InventoryStore>, timeout: Duration) -> Application {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    Application::new(listener, store, timeout)
}

#[tokio::test]
async fn serves_requests_and_reports_health_keys() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let app = start(store.clone(), Duration::from_secs(5)).await;
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_signal();
    let running = tokio::spawn(app.run());

    let health = request(addr, "GET", "/-/health", "").await;
    assert!(health.starts_with("HTTP/1.1 200"), "{health}");
    assert!(health.contains("\"http\":\"OK: "));
    assert!(health.contains(&format!("\"version\":\"{VERSION}\"")));

    let created = request(
        addr,
        "POST",
        "/ticket_options",
        r#"{"name":"GA","desc":"General","allocation":100}"#,
    )
    .await;
    assert!(created.starts_with("HTTP/1.1 200"), "{created}");
    assert_eq!(store.ticket_option_count().await, 1);

    shutdown.trigger();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_flips_health_and_closes_store() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let app = start(store.clone(), Duration::from_secs(5)).await;
    let health = app.health();
    let shutdown = app.shutdown_signal();
    let running = tokio::spawn(app.run());

    // Give the server a moment to register its health keys.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(health.report().is_live());
    assert!(!store.is_closed().await);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("shutdown should finish within its budget")
        .unwrap()
        .unwrap();

    assert!(!health.report().is_live());
    assert!(health.is_shutting_down());
    assert!(store.is_closed().await);
}

/// Wraps the in-memory store and records whether the listener was already
/// gone when `close` ran.
struct ListenerCheckOnClose {
    inner: InMemoryInventoryStore,
    addr: std::sync::OnceLock<SocketAddr>,
    listener_gone_at_close: AtomicBool,
}

impl InventoryStore for ListenerCheckOnClose {
    fn upsert_ticket_option(&self, option: NewTicketOption) -> StoreFuture<'_, TicketOption> {
        self.inner.upsert_ticket_option(option)
    }

    fn purchase_ticket(
        &self,
        id: TicketOptionId,
        quantity: i32,
        user_id: String,
    ) -> StoreFuture<'_, Purchase> {
        self.inner.purchase_ticket(id, quantity, user_id)
    }

    fn get_ticket_option(&self, id: TicketOptionId) -> StoreFuture<'_, TicketOption> {
        self.inner.get_ticket_option(id)
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        self.inner.ping()
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Some(addr) = self.addr.get() {
                let refused = TcpStream::connect(*addr).await.is_err();
                self.listener_gone_at_close.store(refused, Ordering::SeqCst);
            }
            self.inner.close().await;
        })
    }
}

#[tokio::test]
async fn store_closes_only_after_gateway_stopped() {
    let store = Arc::new(ListenerCheckOnClose {
        inner: InMemoryInventoryStore::new(),
        addr: std::sync::OnceLock::new(),
        listener_gone_at_close: AtomicBool::new(false),
    });
    let app = start(store.clone(), Duration::from_secs(5)).await;
    store.addr.set(app.local_addr().unwrap()).unwrap();

    let shutdown = app.shutdown_signal();
    let running = tokio::spawn(app.run());
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.trigger();
    running.await.unwrap().unwrap();

    assert!(store.listener_gone_at_close.load(Ordering::SeqCst));
    assert!(store.inner.is_closed().await);
}

#[tokio::test]
async fn shutdown_respects_budget_with_idle_connection_open() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let app = start(store.clone(), Duration::from_millis(200)).await;
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_signal();
    let running = tokio::spawn(app.run());

    // A client that starts a request and never finishes it.
    let mut stalled = TcpStream::connect(addr).await.unwrap();
    stalled
        .write_all(b"POST /ticket_options HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100\r\n\r\n{")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("shutdown must not wait past its budget")
        .unwrap()
        .unwrap();

    assert!(store.is_closed().await);
    drop(stalled);
}

#[tokio::test]
async fn repeated_shutdown_requests_are_harmless() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let app = start(store.clone(), Duration::from_secs(1)).await;
    let shutdown = app.shutdown_signal();

    shutdown.trigger();
    shutdown.trigger();
    app.run().await.unwrap();

    assert!(store.is_closed().await);
}

/// Store whose reads stall, recording whether a read ever ran to the end.
struct StalledReads {
    inner: InMemoryInventoryStore,
    stall: Duration,
    read_finished: AtomicBool,
}

impl InventoryStore for StalledReads {
    fn upsert_ticket_option(&self, option: NewTicketOption) -> StoreFuture<'_, TicketOption> {
        self.inner.upsert_ticket_option(option)
    }

    fn purchase_ticket(
        &self,
        id: TicketOptionId,
        quantity: i32,
        user_id: String,
    ) -> StoreFuture<'_, Purchase> {
        self.inner.purchase_ticket(id, quantity, user_id)
    }

    fn get_ticket_option(&self, id: TicketOptionId) -> StoreFuture<'_, TicketOption> {
        Box::pin(async move {
            tokio::time::sleep(self.stall).await;
            self.read_finished.store(true, Ordering::SeqCst);
            self.inner.get_ticket_option(id).await
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        self.inner.ping()
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.inner.close()
    }
}

#[tokio::test]
async fn shutdown_cancels_handlers_still_running_after_budget() {
    let store = Arc::new(StalledReads {
        inner: InMemoryInventoryStore::new(),
        stall: Duration::from_millis(1500),
        read_finished: AtomicBool::new(false),
    });
    let option = store
        .upsert_ticket_option(NewTicketOption::new("GA", "", 5))
        .await
        .unwrap();

    let app = start(store.clone(), Duration::from_millis(200)).await;
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_signal();
    let running = tokio::spawn(app.run());

    let path = format!("/ticket/{}", option.id);
    let client = tokio::spawn(async move { request(addr, "GET", &path, "").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    shutdown.trigger();
    running.await.unwrap().unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(1000),
        "shutdown took {:?}",
        started.elapsed()
    );
    assert!(store.inner.is_closed().await);

    let response = tokio::time::timeout(Duration::from_secs(2), client)
        .await
        .expect("client should get an answer")
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 503"), "{response}");

    // Long enough for the stalled read to have finished had it kept running.
    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert!(!store.read_finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn half_sent_request_times_out() {
    let store = Arc::new(InMemoryInventoryStore::new());
    let app = start(store.clone(), Duration::from_secs(1))
        .await
        .with_request_timeout(Duration::from_millis(100));
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_signal();
    let running = tokio::spawn(app.run());

    let mut stalled = TcpStream::connect(addr).await.unwrap();
    stalled
        .write_all(b"POST /ticket_options HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{")
        .await
        .unwrap();

    let mut response = vec![0_u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(2), stalled.read(&mut response))
        .await
        .expect("server should answer a stalled body")
        .unwrap();
    let response = String::from_utf8_lossy(&response[..read]);
    assert!(response.starts_with("HTTP/1.1 408"), "{response}");
    assert_eq!(store.ticket_option_count().await, 0);

    shutdown.trigger();
    running.await.unwrap().unwrap();
}
