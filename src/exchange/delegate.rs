//! Callback boundary consumed from the transport.
//!
//! A transport reports one exchange through these callbacks, in phase
//! order, from whichever threads it runs on.

use bytes::Bytes;

use crate::error::TransportError;
use crate::exchange::head::ResponseHead;

/// Returned from data callbacks so a transport can stop reading early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Proceed,
    /// Every consumer handle of the exchange has been dropped.
    Detached,
}

/// Transport-side callbacks for one exchange.
///
/// Chunks handed to `body_chunk_received` must not be mutated afterwards;
/// `Bytes` enforces this.
pub trait ExchangeDelegate: Send + Sync {
    fn upload_chunk_sent(&self, byte_count: usize);

    fn upload_finished(&self);

    fn response_head_received(&self, head: ResponseHead) -> Continuation;

    fn body_chunk_received(&self, chunk: Bytes) -> Continuation;

    fn exchange_finished(&self);

    fn transport_error(&self, error: TransportError);
}
