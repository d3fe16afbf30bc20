//! Asynchronous HTTP exchange pipeline.
//!
//! Turns a transport's push-based callbacks into a pull-based, ordered
//! sequence of events: upload progress, then one response head paired with
//! a lazily drained body.

pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod observability;
pub mod stream;
pub mod transport;

pub use client::Client;
pub use config::PipelineConfig;
pub use error::{ExchangeError, Result, TransportError};
pub use exchange::{Body, Exchange, ExchangeEvent, ExchangeHandle, ResponseEvents, ResponseHead};
