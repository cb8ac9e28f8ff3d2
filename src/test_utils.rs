//! Helpers for tests that talk to mock upstream servers

use crate::config::FetchPolicy;
use axum::Router;
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base URL
pub(crate) async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Fast policy: no retries, short timeouts
pub(crate) fn test_policy() -> FetchPolicy {
    FetchPolicy {
        concurrency: 4,
        request_timeout: Duration::from_secs(5),
        fetch_deadline: Duration::from_secs(10),
        max_retries: 0,
        retry_backoff: Duration::from_millis(1),
    }
}
