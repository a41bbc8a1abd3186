//! TCP connect probe.
//!
//! Opens a connection to `host:port`, measures time to establishment and
//! closes it. Port 443 additionally negotiates TLS as part of the open, so
//! the measurement covers the full handshake a browser would pay.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;

/// Literal error message reported when the timeout fires
pub const TIMEOUT_MESSAGE: &str = "Connection timeout";

/// Outcome of a single connect-and-measure attempt.
///
/// `latency_ms` is present when the attempt got far enough to measure:
/// on success, or on a failure after the connection attempt started.
/// Timeouts carry no latency.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn success(latency_ms: u64) -> Self {
        Self {
            succeeded: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn failure(error: String, latency_ms: Option<u64>) -> Self {
        Self {
            succeeded: false,
            latency_ms,
            error: Some(error),
        }
    }
}

/// Open a TCP connection to `host:port`, racing against `timeout`.
///
/// All failure modes (DNS, refusal, TLS, timeout) are reported in the
/// outcome; this function never returns an error.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    match tokio::time::timeout(timeout, connect(host, port)).await {
        Ok(Ok(())) => ProbeOutcome::success(start.elapsed().as_millis() as u64),
        Ok(Err(e)) => {
            // The attempt started, so elapsed time is meaningful
            ProbeOutcome::failure(e.to_string(), Some(start.elapsed().as_millis() as u64))
        }
        // Timer won the race; the in-flight connect is dropped and the
        // runtime reclaims the socket
        Err(_) => ProbeOutcome::failure(TIMEOUT_MESSAGE.to_string(), None),
    }
}

async fn connect(host: &str, port: u16) -> anyhow::Result<()> {
    let stream = TcpStream::connect((host, port)).await?;

    if port == 443 {
        // Reachability measurement, not a trust decision: certificate
        // validity must not turn a reachable host into a failure
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        let connector = TlsConnector::from(connector);
        let tls = connector.connect(host, stream).await?;
        drop(tls);
    } else {
        drop(stream);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_success_on_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Keep the listener alive while probing
        let outcome = probe("127.0.0.1", port, Duration::from_secs(2)).await;
        drop(listener);

        assert!(outcome.succeeded);
        assert!(outcome.latency_ms.is_some());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_refused_reports_error_with_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener); // nothing listening on this port anymore

        let outcome = probe("127.0.0.1", port, Duration::from_secs(2)).await;

        assert!(!outcome.succeeded);
        assert!(outcome.error.is_some());
        assert!(outcome.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_probe_timeout_message() {
        // RFC 5737 TEST-NET-1 address: packets go nowhere
        let outcome = probe("192.0.2.1", 80, Duration::from_millis(50)).await;

        assert!(!outcome.succeeded);
        assert_eq!(outcome.error.as_deref(), Some(TIMEOUT_MESSAGE));
        assert_eq!(outcome.latency_ms, None);
    }

    #[tokio::test]
    async fn test_probe_dns_failure_is_not_fatal() {
        let outcome = probe("does-not-exist.invalid", 80, Duration::from_secs(2)).await;

        assert!(!outcome.succeeded);
        assert!(outcome.error.is_some());
    }
}
