// Request telemetry.
// One event per network call: URL, status, elapsed time, and method.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// Event name for outbound HTTP requests.
pub const HTTP_REQUEST_EVENT: &str = "httprequest";

/// Fields recorded for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestEvent {
    pub url: String,
    /// `None` when no response arrived (timeout, connection failure).
    pub status: Option<u16>,
    /// Elapsed time in milliseconds.
    pub time: u64,
    pub method: &'static str,
}

/// Observability hook for request telemetry.
///
/// Implementations must not panic; failures are theirs to swallow.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &str, fields: &RequestEvent);
}

/// Emits events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &str, fields: &RequestEvent) {
        info!(
            target: "mangofetch::events",
            event,
            url = %fields.url,
            status = ?fields.status,
            time = fields.time,
            method = fields.method,
        );
    }
}

/// Wall-clock timer for request latency.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn millis(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_monotonic() {
        let timer = Timer::start();
        let first = timer.millis();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.millis() >= first + 5);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let event = RequestEvent {
            url: "https://example.com".to_string(),
            status: Some(500),
            time: 12,
            method: "GET",
        };
        TracingSink.record(HTTP_REQUEST_EVENT, &event);
    }
}
