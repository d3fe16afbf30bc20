//! Lazy byte sequence over the body stream.
//!
//! # Design Decisions
//! - The body stream is only subscribed on the first pull
//! - Chunks are `Bytes`, so handing out sub-slices never copies
//! - Single pass: once ended or failed, a `Body` yields nothing more

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::future::poll_fn;
use futures_util::stream::{self, FusedStream, Stream, StreamExt};

use crate::error::{ExchangeError, Result};
use crate::exchange::ConsumerToken;
use crate::stream::{Subscription, ValueStream};

enum Source {
    Pending(ValueStream<Bytes>),
    Subscribed(Subscription<Bytes>),
}

/// Response body of an exchange.
///
/// Iterates one byte at a time as a `Stream`, or drains whole chunks via
/// `chunks`, `collect` and `collect_limited`.
pub struct Body {
    source: Source,
    current: Bytes,
    position: usize,
    finished: bool,
    _consumer: Arc<ConsumerToken>,
}

impl Body {
    pub(crate) fn new(stream: ValueStream<Bytes>, consumer: Arc<ConsumerToken>) -> Self {
        Self {
            source: Source::Pending(stream),
            current: Bytes::new(),
            position: 0,
            finished: false,
            _consumer: consumer,
        }
    }

    /// Next unread chunk, starting with whatever is left of the current one.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        poll_fn(|cx| self.poll_next_chunk(cx)).await
    }

    /// Chunk-level view of the remaining body.
    pub fn chunks(self) -> impl Stream<Item = Result<Bytes>> + Send {
        stream::unfold(self, |mut body| async move {
            let item = body.next_chunk().await?;
            Some((item, body))
        })
    }

    /// Drain the remaining body into one contiguous buffer.
    pub async fn collect(self) -> Result<Bytes> {
        self.drain(None).await
    }

    /// Like `collect`, but fails once more than `limit` bytes arrive.
    pub async fn collect_limited(self, limit: usize) -> Result<Bytes> {
        self.drain(Some(limit)).await
    }

    async fn drain(mut self, limit: Option<usize>) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            let chunk = chunk?;
            if let Some(limit) = limit {
                if buffer.len() + chunk.len() > limit {
                    return Err(ExchangeError::BodyTooLarge { limit });
                }
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    fn poll_next_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes>>> {
        loop {
            if self.position < self.current.len() {
                let rest = self.current.slice(self.position..);
                self.position = self.current.len();
                return Poll::Ready(Some(Ok(rest)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            let chunks = match &mut self.source {
                Source::Pending(stream) => {
                    let subscription = stream.subscribe();
                    self.source = Source::Subscribed(subscription);
                    continue;
                }
                Source::Subscribed(chunks) => chunks,
            };
            match ready!(chunks.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.current = chunk;
                    self.position = 0;
                }
                Some(Err(error)) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(error)));
                }
                None => {
                    self.finished = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Stream for Body {
    type Item = Result<u8>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(&byte) = this.current.get(this.position) {
                this.position += 1;
                return Poll::Ready(Some(Ok(byte)));
            }
            match ready!(this.poll_next_chunk(cx)) {
                Some(Ok(chunk)) => {
                    this.current = chunk;
                    this.position = 0;
                }
                Some(Err(error)) => return Poll::Ready(Some(Err(error))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for Body {
    fn is_terminated(&self) -> bool {
        self.finished && self.position >= self.current.len()
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("subscribed", &matches!(self.source, Source::Subscribed(_)))
            .field("buffered", &(self.current.len() - self.position))
            .field("finished", &self.finished)
            .finish()
    }
}
