use reqwest::Client;
use std::time::Duration;

/// Client without a request timeout. Catalog calls are allowed to run as long
/// as the upstream needs; only the connect phase is bounded.
pub fn build_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs()))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Client whose every request is abandoned after `timeout`.
pub fn build_client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(connect_timeout_secs()).min(timeout))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn connect_timeout_secs() -> u64 {
    std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(5)
}
