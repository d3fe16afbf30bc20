//! Response multiplexer.
//!
//! # Algorithm
//! ```text
//! subscribe upload  ── Upload(n) per value ──▶ caller
//!     │ end
//!     ▼
//! subscribe head    ── first head ──▶ Download { head, body } ──▶ end
//!     │ end without head
//!     ▼
//! end (no Download)
//! ```
//! A failure on either stream is yielded once as `Err` and ends the
//! sequence. The body stream is never touched here; `Body` drains it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures_util::stream::{FusedStream, Stream, StreamExt};

use crate::error::{ExchangeError, Result};
use crate::exchange::body::Body;
use crate::exchange::head::ResponseHead;
use crate::exchange::{ConsumerToken, ExchangeId, Streams};
use crate::stream::Subscription;

/// One item of an exchange's event sequence.
#[derive(Debug)]
pub enum ExchangeEvent {
    /// The transport sent `n` more request bytes.
    Upload(usize),
    /// The response arrived. Always the last event.
    Download { head: ResponseHead, body: Body },
}

enum Stage {
    Start,
    Upload(Subscription<usize>),
    Head(Subscription<ResponseHead>),
    Finished,
}

/// Ordered, single-pass sequence of upload events followed by at most one
/// download event.
pub struct ResponseEvents {
    id: ExchangeId,
    streams: Streams,
    consumer: Arc<ConsumerToken>,
    stage: Stage,
}

impl ResponseEvents {
    pub(crate) fn new(id: ExchangeId, streams: Streams, consumer: Arc<ConsumerToken>) -> Self {
        Self {
            id,
            streams,
            consumer,
            stage: Stage::Start,
        }
    }

    /// Identifier of the exchange these events belong to.
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Skip upload progress and wait for the response.
    ///
    /// Fails with `ExchangeError::NoResponse` if the exchange ended without
    /// a head.
    pub async fn response(mut self) -> Result<(ResponseHead, Body)> {
        while let Some(event) = self.next().await {
            match event? {
                ExchangeEvent::Upload(_) => continue,
                ExchangeEvent::Download { head, body } => return Ok((head, body)),
            }
        }
        tracing::debug!(exchange_id = %self.id, "Exchange ended without a response head");
        Err(ExchangeError::NoResponse)
    }
}

impl Stream for ResponseEvents {
    type Item = Result<ExchangeEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.stage {
                Stage::Start => this.stage = Stage::Upload(this.streams.upload.subscribe()),
                Stage::Upload(uploads) => match ready!(uploads.poll_next_unpin(cx)) {
                    Some(Ok(byte_count)) => return Poll::Ready(Some(Ok(ExchangeEvent::Upload(byte_count)))),
                    Some(Err(error)) => {
                        this.stage = Stage::Finished;
                        return Poll::Ready(Some(Err(error)));
                    }
                    None => this.stage = Stage::Head(this.streams.head.subscribe()),
                },
                Stage::Head(heads) => {
                    let item = ready!(heads.poll_next_unpin(cx));
                    this.stage = Stage::Finished;
                    return Poll::Ready(match item {
                        Some(Ok(head)) => {
                            let body = Body::new(this.streams.body.clone(), this.consumer.clone());
                            Some(Ok(ExchangeEvent::Download { head, body }))
                        }
                        Some(Err(error)) => Some(Err(error)),
                        None => None,
                    });
                }
                Stage::Finished => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for ResponseEvents {
    fn is_terminated(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }
}

impl std::fmt::Debug for ResponseEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self.stage {
            Stage::Start => "start",
            Stage::Upload(_) => "upload",
            Stage::Head(_) => "head",
            Stage::Finished => "finished",
        };
        f.debug_struct("ResponseEvents")
            .field("id", &self.id)
            .field("stage", &stage)
            .finish()
    }
}
