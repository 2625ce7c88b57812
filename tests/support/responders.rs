//! Mock-server responders and a raw TCP server for misbehaving peers.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::{Respond, ResponseTemplate};

/// Fails `fail_count` times with 500, then returns 200 with `success_body`.
pub struct FlakyResponder {
    pub request_count: Arc<AtomicUsize>,
    pub fail_count: usize,
    pub success_body: Vec<u8>,
}

impl FlakyResponder {
    pub fn new(fail_count: usize, success_body: &[u8]) -> Self {
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            fail_count,
            success_body: success_body.to_vec(),
        }
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500).set_body_bytes(b"internal server error")
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.success_body.clone())
        }
    }
}

/// Tracks how many requests are being served at once.
///
/// Uses a blocking sleep so the counter stays elevated while other
/// requests arrive.
pub struct ConcurrencyTrackingResponder {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    delay_ms: u64,
}

impl ConcurrencyTrackingResponder {
    pub fn new(current: Arc<AtomicUsize>, peak: Arc<AtomicUsize>, delay_ms: u64) -> Self {
        Self {
            current,
            peak,
            delay_ms,
        }
    }
}

impl Respond for ConcurrencyTrackingResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let current_count = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current_count, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(self.delay_ms));
        self.current.fetch_sub(1, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_bytes(b"content")
    }
}

/// Serves every connection a response declaring `declared_len` bytes but
/// sending only `sent_len`, then closes the socket.
///
/// Returns the base URI and a counter of accepted requests, or `None` when
/// no localhost socket can be bound.
pub async fn spawn_truncating_server(
    declared_len: usize,
    sent_len: usize,
) -> Option<(String, Arc<AtomicUsize>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
    let addr = listener.local_addr().ok()?;
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {declared_len}\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&vec![0xAB; sent_len]).await;
                let _ = socket.flush().await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Some((format!("http://{addr}"), requests))
}
