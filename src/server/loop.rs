// Server loop module
// Accepts connections until shutdown is requested, then drains

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Main accept loop.
///
/// Runs on a `LocalSet`: connections are spawned with `spawn_local`. When
/// `state.shutdown` fires the listener is dropped and in-flight connections
/// get up to the connection timeout to finish.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            _ = state.shutdown.notified() => break,
        }
    }

    drop(listener);
    logger::log_shutdown_requested(active_connections.load(Ordering::SeqCst));

    let performance = &state.config.performance;
    let grace = Duration::from_secs(std::cmp::max(
        performance.read_timeout,
        performance.write_timeout,
    ));
    let remaining = drain_connections(&active_connections, grace).await;
    logger::log_shutdown_complete(remaining);
}

/// Wait until no connection is active or `grace` elapses; returns the
/// number still open
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let active = active_connections.load(Ordering::SeqCst);
        if active == 0 || tokio::time::Instant::now() >= deadline {
            return active;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::default_config;
    use crate::handler::builtin::default_handlers;
    use crate::server::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_drain_returns_immediately_when_idle() {
        let counter = AtomicUsize::new(0);
        assert_eq!(drain_connections(&counter, Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let counter = AtomicUsize::new(2);
        assert_eq!(drain_connections(&counter, Duration::from_millis(120)).await, 2);
    }

    #[tokio::test]
    async fn test_serves_portal_request_and_shuts_down() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let state = Arc::new(AppState::new(default_config(), default_handlers().unwrap()).unwrap());
                let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
                let addr = listener.local_addr().unwrap();
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::new(AtomicUsize::new(0)),
                ));

                let body = r#"{"command":"echo","msg":"hi"}"#;
                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                let request = format!(
                    "POST /portal HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).await.unwrap();
                assert!(response.starts_with("HTTP/1.1 200"));
                assert!(response.contains(r#""msg":"hi""#));

                state.request_shutdown();
                server.await.unwrap();
            })
            .await;
    }
}
