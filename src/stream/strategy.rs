//! Backing strategies for a stream's pending values.
//!
//! A stream starts with `Buffered` and switches to `Dispatch` when its
//! consumer attaches. The switch replays the buffer into the sink inside the
//! same serialized operation, so nothing is lost or delivered twice.

use std::collections::VecDeque;

use crate::error::ExchangeError;

/// What a consumer receives from a stream.
#[derive(Debug)]
pub enum Signal<V> {
    Value(V),
    /// The stream closed normally. Nothing follows.
    End,
    /// The stream failed. Nothing follows.
    Failed(ExchangeError),
}

/// Consumer callback attached by `ValueStream::observe`.
pub type Sink<V> = Box<dyn FnMut(Signal<V>) + Send>;

/// Where appended values go.
pub trait QueueStrategy<V> {
    fn enqueue(&mut self, value: V);
}

/// In-memory buffer used until a consumer attaches.
#[derive(Debug)]
pub struct Buffered<V> {
    values: VecDeque<V>,
}

impl<V> Buffered<V> {
    /// Empty buffer.
    pub fn new() -> Self {
        Self {
            values: VecDeque::new(),
        }
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<V> Default for Buffered<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> QueueStrategy<V> for Buffered<V> {
    fn enqueue(&mut self, value: V) {
        self.values.push_back(value);
    }
}

/// Direct forwarder used once a consumer is attached.
pub struct Dispatch<V> {
    sink: Sink<V>,
    delivered: usize,
}

impl<V> Dispatch<V> {
    /// Forwarder delivering into `sink`.
    pub fn new(sink: Sink<V>) -> Self {
        Self { sink, delivered: 0 }
    }

    /// Forward everything `buffered` holds, oldest first.
    pub fn replay(&mut self, buffered: Buffered<V>) {
        for value in buffered.values {
            self.enqueue(value);
        }
    }

    /// Deliver a terminal signal, consuming the forwarder.
    pub fn finish(mut self, signal: Signal<V>) {
        (self.sink)(signal);
    }

    /// Values forwarded so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl<V> QueueStrategy<V> for Dispatch<V> {
    fn enqueue(&mut self, value: V) {
        self.delivered += 1;
        (self.sink)(Signal::Value(value));
    }
}

impl<V> std::fmt::Debug for Dispatch<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}
