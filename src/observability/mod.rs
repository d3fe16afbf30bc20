//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! exchange / transport code produces:
//!     → tracing events (exchange_id on every transition)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → logging.rs installs the fmt subscriber for binaries
//!     → embedding applications install their own metrics recorder
//! ```

pub mod logging;
pub mod metrics;
