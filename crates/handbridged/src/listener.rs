//! Loopback TCP listener feeding the broadcast hub.
//!
//! Each connected client gets one record per line, serialized JSON,
//! newline-terminated. Clients are not expected to send anything; their
//! read side is drained only to notice the disconnect.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task;

use crate::hub::BroadcastHub;

/// Backoff after a failed accept. Errors like fd exhaustion tend to
/// persist for a while; retrying immediately would spin the task hot.
const ACCEPT_RETRY_DELAY_MS: u64 = 100;

/// Accept clients forever. Runs on the local task set; aborted at
/// shutdown by dropping its task handle.
pub async fn serve(listener: TcpListener, hub: BroadcastHub) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                task::spawn_local(handle_connection(stream, addr, hub.clone()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(ACCEPT_RETRY_DELAY_MS)).await;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, hub: BroadcastHub) {
    let (id, mut rx) = hub.register();
    tracing::debug!(client = id, %addr, "connection established");

    let (mut reader, mut writer) = stream.into_split();

    let writer_hub = hub.clone();
    let writer_task = task::spawn_local(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                break;
            }
        }
        writer_hub.remove(id);
    });

    // Drain and discard anything the client sends; EOF or error means
    // the connection is gone.
    let mut scratch = [0u8; 1024];
    loop {
        match reader.read(&mut scratch).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }

    hub.remove(id);
    writer_task.abort();
    tracing::debug!(client = id, %addr, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::sleep;

    async fn wait_for_clients(hub: &BroadcastHub, expected: usize) {
        for _ in 0..100 {
            if hub.client_count() == expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("hub never reached {expected} clients");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_client_receives_published_lines() {
        let local = task::LocalSet::new();
        local
            .run_until(async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let hub = BroadcastHub::new();
                let server = task::spawn_local(serve(listener, hub.clone()));

                let stream = TcpStream::connect(addr).await.unwrap();
                wait_for_clients(&hub, 1).await;
                let mut lines = BufReader::new(stream).lines();

                hub.publish(r#"{"timestamp":1}"#);
                assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"timestamp":1}"#);

                hub.publish(r#"{"timestamp":2}"#);
                assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"timestamp":2}"#);

                server.abort();
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_disconnect_removes_client() {
        let local = task::LocalSet::new();
        local
            .run_until(async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let hub = BroadcastHub::new();
                let server = task::spawn_local(serve(listener, hub.clone()));

                let stream = TcpStream::connect(addr).await.unwrap();
                wait_for_clients(&hub, 1).await;

                drop(stream);
                wait_for_clients(&hub, 0).await;

                // Publishing into an empty registry is a no-op
                assert_eq!(hub.publish("tick"), 0);
                server.abort();
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_multiple_clients_all_receive() {
        let local = task::LocalSet::new();
        local
            .run_until(async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let hub = BroadcastHub::new();
                let server = task::spawn_local(serve(listener, hub.clone()));

                let a = TcpStream::connect(addr).await.unwrap();
                let b = TcpStream::connect(addr).await.unwrap();
                wait_for_clients(&hub, 2).await;

                assert_eq!(hub.publish("record"), 2);

                for stream in [a, b] {
                    let mut lines = BufReader::new(stream).lines();
                    assert_eq!(lines.next_line().await.unwrap().unwrap(), "record");
                }
                server.abort();
            })
            .await;
    }
}
