//! Error taxonomy for exchanges.
//!
//! # Categories
//! - Contract violations: panics, never values (see `exchange::state`)
//! - Transport failures: `TransportError`, surfaced once as `ExchangeError::Transport`
//! - Empty result: `ExchangeError::NoResponse`, distinct from a successful empty body

use std::time::Duration;
use thiserror::Error;

/// Failures reported by the transport through `transport_error`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The exchange did not complete before its deadline.
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP client rejected or failed the request.
    #[error("client error: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    /// Reading the response body failed.
    #[error("body error: {0}")]
    Body(#[from] hyper::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No runtime was available to drive the exchange.
    #[error("no runtime available: {0}")]
    Runtime(String),

    /// The resource provider was shut down before the exchange started.
    #[error("worker resources have been shut down")]
    Shutdown,

    /// The transport released the exchange in the middle of the body.
    #[error("transport released the exchange before it finished")]
    Abandoned,
}

/// Terminal errors observed by the consumer of an exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The exchange finished without ever receiving a response head.
    #[error("exchange finished without a response")]
    NoResponse,

    /// `Body::collect_limited` saw more bytes than allowed.
    #[error("body exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Result type for exchange consumers.
pub type Result<T> = std::result::Result<T, ExchangeError>;
