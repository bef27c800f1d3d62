//! HTTP client initialization.
//!
//! This module provides the function that builds the HTTP client used for uploads.

use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::TCP_CONNECT_TIMEOUT_SECS;

/// Initializes the upload HTTP client.
///
/// Creates a `reqwest::Client` configured with:
/// - Whole-request timeout from `timeout_seconds`
/// - TCP connect timeout of `TCP_CONNECT_TIMEOUT_SECS`
/// - No cookie store (telemetry requests are stateless)
/// - Rustls TLS backend (no native TLS)
///
/// The client is cheap to clone; clones share one connection pool.
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(timeout_seconds: u64) -> Result<reqwest::Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS))
        .user_agent(concat!("telemetry_relay/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_client_builds() {
        assert!(init_client(30).is_ok());
    }
}
