//! Metrics recording.
//!
//! # Metrics
//! - `exchange_opened_total` (counter): exchanges created
//! - `exchange_completed_total` (counter): exchanges that reached End
//! - `exchange_failed_total` (counter): failures by stream (`upload`, `head`, `body`)
//! - `exchange_upload_bytes_total` (counter): request bytes reported sent
//! - `exchange_body_bytes_total` (counter): response body bytes received
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding application
//!   installs an exporter, otherwise every call is a no-op

/// Record a newly opened exchange.
pub fn record_exchange_opened() {
    ::metrics::counter!("exchange_opened_total").increment(1);
}

/// Record an exchange that reached End.
pub fn record_exchange_completed() {
    ::metrics::counter!("exchange_completed_total").increment(1);
}

/// Record a failure routed to `stream`.
pub fn record_exchange_failed(stream: &'static str) {
    ::metrics::counter!("exchange_failed_total", "stream" => stream).increment(1);
}

/// Record request bytes reported sent.
pub fn record_upload_bytes(bytes: usize) {
    ::metrics::counter!("exchange_upload_bytes_total").increment(bytes as u64);
}

/// Record response body bytes received.
pub fn record_body_bytes(bytes: usize) {
    ::metrics::counter!("exchange_body_bytes_total").increment(bytes as u64);
}
