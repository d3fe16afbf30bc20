//! Transport boundary.
//!
//! # Data Flow
//! ```text
//! Client::execute
//!     → Transport::execute(request, delegate)
//!     → resources.rs (runtime for the worker group)
//!     → hyper_transport.rs (hyper client drives the delegate callbacks)
//! ```
//!
//! # Design Decisions
//! - Transports own connection handling, TLS and wire framing; the
//!   pipeline only sees the callbacks
//! - `execute` never blocks; failures before the exchange starts are
//!   reported through `transport_error`

pub mod hyper_transport;
pub mod resources;

use bytes::Bytes;
use http::Request;

use crate::exchange::ExchangeDelegate;

pub use hyper_transport::HyperTransport;
pub use resources::{CurrentRuntime, ResourceProvider, RuntimePool};

/// Something that can carry out an exchange and report it through a
/// delegate.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request<Bytes>, delegate: Box<dyn ExchangeDelegate>);
}
