//! Push/pull bridge for one phase of an exchange.
//!
//! # States
//! ```text
//! Buffering ──observe──▶ Attached
//!     │                     │
//!     ├──close──▶ Closed ───┤──observe──▶ Done
//!     └──fail───▶ Failed ───┘
//! Attached ──close/fail──▶ Done
//! ```
//!
//! # Design Decisions
//! - Every transition runs on the stream's `SerialQueue`, so attach and
//!   append from different threads are linearized
//! - A failure discards values buffered before it
//! - Producers never block; consumers suspend in `Subscription`

use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures_util::stream::{FusedStream, Stream};
use tokio::sync::mpsc;

use crate::error::ExchangeError;
use crate::stream::queue::SerialQueue;
use crate::stream::strategy::{Buffered, Dispatch, QueueStrategy, Signal, Sink};

/// State of a `ValueStream`.
#[derive(Debug)]
pub enum StreamState<V> {
    /// No consumer yet; values accumulate.
    Buffering(Buffered<V>),
    /// A consumer receives values as they arrive.
    Attached(Dispatch<V>),
    /// Closed before a consumer attached; holds the final batch.
    Closed(Buffered<V>),
    /// Failed before a consumer attached.
    Failed(ExchangeError),
    /// The terminal signal has been handed to the consumer.
    Done,
}

struct Shared<V> {
    name: &'static str,
    queue: SerialQueue<StreamState<V>>,
    observed: AtomicBool,
}

/// Single-producer, single-consumer value stream.
///
/// Cloning yields another handle to the same stream.
pub struct ValueStream<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for ValueStream<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V: Send + 'static> ValueStream<V> {
    /// Create an empty stream. `name` only appears in logs and panics.
    pub fn new(name: &'static str) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                queue: SerialQueue::new(StreamState::Buffering(Buffered::new())),
                observed: AtomicBool::new(false),
            }),
        }
    }

    /// Push a value. Ignored once the stream is terminal.
    pub fn append(&self, value: V) {
        let name = self.shared.name;
        self.shared.queue.submit(move |state| match state {
            StreamState::Buffering(buffer) => buffer.enqueue(value),
            StreamState::Attached(dispatch) => dispatch.enqueue(value),
            _ => tracing::trace!(stream = name, "Value appended after terminal state dropped"),
        });
    }

    /// Close the stream normally. Buffered values stay deliverable.
    pub fn close(&self) {
        self.shared.queue.submit(|state| {
            *state = match mem::replace(state, StreamState::Done) {
                StreamState::Buffering(pending) => StreamState::Closed(pending),
                StreamState::Attached(dispatch) => {
                    dispatch.finish(Signal::End);
                    StreamState::Done
                }
                terminal => terminal,
            };
        });
    }

    /// Fail the stream. Buffered values are discarded.
    pub fn fail(&self, error: ExchangeError) {
        let name = self.shared.name;
        self.shared.queue.submit(move |state| {
            *state = match mem::replace(state, StreamState::Done) {
                StreamState::Buffering(pending) => {
                    if !pending.is_empty() {
                        tracing::debug!(stream = name, discarded = pending.len(), "Failure supersedes buffered values");
                    }
                    StreamState::Failed(error)
                }
                StreamState::Attached(dispatch) => {
                    dispatch.finish(Signal::Failed(error));
                    StreamState::Done
                }
                terminal => {
                    tracing::debug!(stream = name, error = %error, "Failure after terminal state ignored");
                    terminal
                }
            };
        });
    }

    /// Attach the one consumer of this stream.
    ///
    /// Buffered values are replayed to `sink` in order, followed by the
    /// terminal signal if the stream already ended.
    ///
    /// # Panics
    /// If the stream has already been observed.
    pub fn observe(&self, sink: Sink<V>) {
        if self.shared.observed.swap(true, Ordering::AcqRel) {
            panic!("{} stream observed twice", self.shared.name);
        }

        self.shared.queue.submit(move |state| {
            let mut dispatch = Dispatch::new(sink);
            *state = match mem::replace(state, StreamState::Done) {
                StreamState::Buffering(pending) => {
                    dispatch.replay(pending);
                    StreamState::Attached(dispatch)
                }
                StreamState::Closed(pending) => {
                    dispatch.replay(pending);
                    dispatch.finish(Signal::End);
                    StreamState::Done
                }
                StreamState::Failed(error) => {
                    dispatch.finish(Signal::Failed(error));
                    StreamState::Done
                }
                StreamState::Attached(_) | StreamState::Done => {
                    unreachable!("stream attached without passing the observed guard")
                }
            };
        });
    }

    /// Attach a channel-backed consumer and return its pull side.
    pub fn subscribe(&self) -> Subscription<V> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observe(Box::new(move |signal| {
            // A dropped subscription just stops receiving.
            let _ = tx.send(signal);
        }));
        Subscription { rx, finished: false }
    }
}

impl<V> std::fmt::Debug for ValueStream<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStream")
            .field("name", &self.shared.name)
            .field("observed", &self.shared.observed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Pull side of a subscribed `ValueStream`.
///
/// Yields `Ok` values in append order, then ends, or yields one `Err` and
/// ends.
#[derive(Debug)]
pub struct Subscription<V> {
    rx: mpsc::UnboundedReceiver<Signal<V>>,
    finished: bool,
}

impl<V> Stream for Subscription<V> {
    type Item = Result<V, ExchangeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match ready!(this.rx.poll_recv(cx)) {
            Some(Signal::Value(value)) => Poll::Ready(Some(Ok(value))),
            Some(Signal::Failed(error)) => {
                this.finished = true;
                Poll::Ready(Some(Err(error)))
            }
            // A stream released without a terminal signal reads as closed.
            Some(Signal::End) | None => {
                this.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl<V> FusedStream for Subscription<V> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use futures_util::StreamExt;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Value(u32),
        End,
        Failed,
    }

    fn recorder() -> (Arc<Mutex<Vec<Seen>>>, Sink<u32>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let out = log.clone();
        let sink: Sink<u32> = Box::new(move |signal| {
            out.lock().unwrap().push(match signal {
                Signal::Value(v) => Seen::Value(v),
                Signal::End => Seen::End,
                Signal::Failed(_) => Seen::Failed,
            })
        });
        (log, sink)
    }

    fn timeout_error() -> ExchangeError {
        TransportError::Timeout(Duration::from_secs(1)).into()
    }

    #[test]
    fn buffered_values_then_end_when_observed_late() {
        let stream = ValueStream::new("test");
        stream.append(1);
        stream.append(2);
        stream.close();

        let (log, sink) = recorder();
        stream.observe(sink);
        assert_eq!(*log.lock().unwrap(), vec![Seen::Value(1), Seen::Value(2), Seen::End]);
    }

    #[test]
    fn values_forwarded_when_observed_first() {
        let stream = ValueStream::new("test");
        let (log, sink) = recorder();
        stream.observe(sink);

        stream.append(1);
        assert_eq!(*log.lock().unwrap(), vec![Seen::Value(1)]);
        stream.append(2);
        stream.close();
        assert_eq!(*log.lock().unwrap(), vec![Seen::Value(1), Seen::Value(2), Seen::End]);
    }

    #[test]
    fn attach_point_does_not_change_delivery() {
        for close in [true, false] {
            for attach_at in 0..=4 {
                let stream = ValueStream::new("test");
                let (log, sink) = recorder();
                let mut sink = Some(sink);
                for i in 0..4u32 {
                    if i == attach_at {
                        stream.observe(sink.take().unwrap());
                    }
                    stream.append(i);
                }
                if close {
                    stream.close();
                } else {
                    stream.fail(timeout_error());
                }
                if let Some(sink) = sink.take() {
                    stream.observe(sink);
                }

                let log = log.lock().unwrap();
                let expected = if close {
                    let mut expected: Vec<Seen> = (0..4).map(Seen::Value).collect();
                    expected.push(Seen::End);
                    expected
                } else if attach_at == 4 {
                    // Attached after the failure: buffered values were discarded.
                    vec![Seen::Failed]
                } else {
                    let mut expected: Vec<Seen> = (0..4).map(Seen::Value).collect();
                    expected.push(Seen::Failed);
                    expected
                };
                assert_eq!(*log, expected, "close={close} attach at {attach_at}");
            }
        }
    }

    #[test]
    fn fail_discards_buffered_values() {
        let stream = ValueStream::new("test");
        stream.append(1);
        stream.fail(timeout_error());
        stream.append(2);

        let (log, sink) = recorder();
        stream.observe(sink);
        assert_eq!(*log.lock().unwrap(), vec![Seen::Failed]);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let stream = ValueStream::new("test");
        let (log, sink) = recorder();
        stream.observe(sink);
        stream.close();
        stream.append(7);
        stream.fail(timeout_error());
        stream.close();
        assert_eq!(*log.lock().unwrap(), vec![Seen::End]);
    }

    #[test]
    #[should_panic(expected = "observed twice")]
    fn observing_twice_panics() {
        let stream: ValueStream<u32> = ValueStream::new("test");
        let _first = stream.subscribe();
        let _second = stream.subscribe();
    }

    #[tokio::test]
    async fn subscription_yields_values_then_ends() {
        let stream = ValueStream::new("test");
        let mut values = stream.subscribe();
        let producer = stream.clone();
        tokio::spawn(async move {
            for i in 0..3u32 {
                producer.append(i);
                tokio::task::yield_now().await;
            }
            producer.close();
        });

        let collected: Vec<u32> = (&mut values).map(|v| v.unwrap()).collect().await;
        assert_eq!(collected, vec![0, 1, 2]);
        assert!(values.is_terminated());
        assert!(values.next().await.is_none());
    }

    #[tokio::test]
    async fn subscription_surfaces_failure_once() {
        let stream: ValueStream<u32> = ValueStream::new("test");
        stream.append(5);
        let mut values = stream.subscribe();
        stream.fail(timeout_error());

        assert_eq!(values.next().await.unwrap().unwrap(), 5);
        assert!(matches!(values.next().await, Some(Err(ExchangeError::Transport(_)))));
        assert!(values.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_stream_reads_as_closed() {
        let stream: ValueStream<u32> = ValueStream::new("test");
        let mut values = stream.subscribe();
        drop(stream);
        assert!(values.next().await.is_none());
    }
}
