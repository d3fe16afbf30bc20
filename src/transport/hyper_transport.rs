//! Transport adapter over the hyper-util legacy client.
//!
//! # Responsibilities
//! - Translate one hyper request/response cycle into delegate callbacks
//! - Report request body frames as upload progress
//! - Enforce the whole-exchange deadline
//!
//! # Design Decisions
//! - Upload frames count as sent when hyper pulls them from the body
//! - Upload callbacks and the head callback share a gate, so a response
//!   that arrives while hyper is still writing the request never produces
//!   upload callbacks after the head
//! - Reading stops as soon as the consumer side detaches

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::Request;
use http_body_util::BodyExt;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper::ext::ReasonPhrase;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::exchange::{Continuation, ExchangeDelegate, ResponseHead};
use crate::transport::resources::ResourceProvider;
use crate::transport::Transport;

/// Drives exchanges with a hyper client on runtimes from a `ResourceProvider`.
pub struct HyperTransport {
    client: Client<HttpConnector, UploadBody>,
    resources: Arc<dyn ResourceProvider>,
    config: TransportConfig,
}

impl HyperTransport {
    /// Build the client from `config`. Exchanges run on runtimes from `resources`.
    pub fn new(config: TransportConfig, resources: Arc<dyn ResourceProvider>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        let client = Client::builder(TokioExecutor::new())
            .http2_only(config.http2_only)
            .build(connector);

        Self {
            client,
            resources,
            config,
        }
    }
}

impl Transport for HyperTransport {
    fn execute(&self, request: Request<Bytes>, delegate: Box<dyn ExchangeDelegate>) {
        let handle = match self.resources.handle(&self.config.worker_group) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(group = %self.config.worker_group, error = %e, "No worker runtime for exchange");
                delegate.transport_error(e);
                return;
            }
        };

        let reporter = Arc::new(Reporter::new(delegate));
        let client = self.client.clone();
        let deadline = Duration::from_secs(self.config.request_timeout_secs);
        let chunk_bytes = self.config.upload_chunk_bytes;

        handle.spawn(async move {
            let exchange = drive(client, request, reporter.clone(), chunk_bytes);
            match tokio::time::timeout(deadline, exchange).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => reporter.error(e),
                Err(_) => reporter.error(TransportError::Timeout(deadline)),
            }
        });
    }
}

async fn drive(
    client: Client<HttpConnector, UploadBody>,
    request: Request<Bytes>,
    reporter: Arc<Reporter>,
    chunk_bytes: usize,
) -> Result<(), TransportError> {
    let request = request.map(|data| UploadBody::new(data, chunk_bytes, reporter.clone()));
    tracing::trace!(method = %request.method(), uri = %request.uri(), "Sending request");

    let response = client.request(request).await.map_err(|e| {
        if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Client(e)
        }
    })?;

    let (parts, mut incoming) = response.into_parts();
    let mut head = ResponseHead::from_parts(&parts);
    if let Some(reason) = parts.extensions.get::<ReasonPhrase>() {
        head = head.with_reason(String::from_utf8_lossy(reason.as_bytes()));
    }
    if reporter.head(head) == Continuation::Detached {
        tracing::debug!("Consumer detached after head, dropping response");
        return Ok(());
    }

    while let Some(frame) = incoming.frame().await {
        // Trailers are not part of the byte sequence.
        let Ok(data) = frame?.into_data() else { continue };
        if reporter.delegate.body_chunk_received(data) == Continuation::Detached {
            tracing::debug!("Consumer detached, dropping remaining body");
            return Ok(());
        }
    }

    reporter.delegate.exchange_finished();
    Ok(())
}

/// Serializes upload callbacks against the head and error callbacks.
struct Reporter {
    delegate: Box<dyn ExchangeDelegate>,
    /// Cleared when the head or an error arrives.
    uploading: Mutex<bool>,
}

impl Reporter {
    fn new(delegate: Box<dyn ExchangeDelegate>) -> Self {
        Self {
            delegate,
            uploading: Mutex::new(true),
        }
    }

    fn gate(&self) -> MutexGuard<'_, bool> {
        self.uploading.lock().expect("upload gate mutex poisoned")
    }

    fn upload_chunk(&self, byte_count: usize) {
        let uploading = self.gate();
        if *uploading {
            self.delegate.upload_chunk_sent(byte_count);
        }
    }

    fn upload_done(&self) {
        let uploading = self.gate();
        if *uploading {
            self.delegate.upload_finished();
        }
    }

    fn head(&self, head: ResponseHead) -> Continuation {
        let mut uploading = self.gate();
        *uploading = false;
        self.delegate.response_head_received(head)
    }

    fn error(&self, error: TransportError) {
        let mut uploading = self.gate();
        *uploading = false;
        self.delegate.transport_error(error);
    }
}

/// Request body that reports each frame hyper pulls from it.
struct UploadBody {
    remaining: Bytes,
    chunk_bytes: usize,
    reporter: Arc<Reporter>,
    finished: bool,
}

impl UploadBody {
    fn new(data: Bytes, chunk_bytes: usize, reporter: Arc<Reporter>) -> Self {
        Self {
            remaining: data,
            chunk_bytes: chunk_bytes.max(1),
            reporter,
            finished: false,
        }
    }
}

impl HttpBody for UploadBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.remaining.is_empty() {
            if !this.finished {
                this.finished = true;
                this.reporter.upload_done();
            }
            return Poll::Ready(None);
        }

        let len = this.chunk_bytes.min(this.remaining.len());
        let chunk = this.remaining.split_to(len);
        this.reporter.upload_chunk(chunk.len());
        Poll::Ready(Some(Ok(Frame::data(chunk))))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Exchange, ExchangeEvent};
    use futures_util::StreamExt;
    use hyper::{HeaderMap, StatusCode, Version};

    #[tokio::test]
    async fn upload_body_reports_frames_then_finish() {
        let (handle, mut events) = Exchange::open();
        let reporter = Arc::new(Reporter::new(Box::new(handle)));
        let body = UploadBody::new(Bytes::from_static(b"0123456789"), 4, reporter.clone());

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"0123456789"));

        reporter.head(ResponseHead::new(StatusCode::OK, Version::HTTP_11, HeaderMap::new()));
        reporter.delegate.exchange_finished();

        let mut uploads = Vec::new();
        while let Some(event) = events.next().await {
            if let ExchangeEvent::Upload(n) = event.unwrap() {
                uploads.push(n);
            }
        }
        assert_eq!(uploads, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn upload_after_head_is_suppressed() {
        let (handle, events) = Exchange::open();
        let reporter = Reporter::new(Box::new(handle));
        reporter.head(ResponseHead::new(StatusCode::PAYLOAD_TOO_LARGE, Version::HTTP_11, HeaderMap::new()));
        // Would be a contract violation if forwarded.
        reporter.upload_chunk(8);
        reporter.upload_done();
        reporter.delegate.exchange_finished();

        let (head, body) = events.response().await.unwrap();
        assert_eq!(head.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body.collect().await.unwrap().is_empty());
    }

    #[test]
    fn error_closes_upload_gate() {
        let (handle, _events) = Exchange::open();
        let reporter = Reporter::new(Box::new(handle));
        reporter.upload_chunk(1);
        reporter.error(TransportError::Connect("refused".into()));
        reporter.upload_chunk(1);
        assert!(!*reporter.gate());
    }
}
