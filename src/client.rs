//! Request execution layer.
//!
//! # Responsibilities
//! - Open one exchange per request
//! - Hand the transport side to the configured `Transport`
//! - Return the caller's event sequence

use std::sync::Arc;

use bytes::Bytes;
use http::Request;

use crate::config::PipelineConfig;
use crate::exchange::{Exchange, ResponseEvents};
use crate::transport::{HyperTransport, ResourceProvider, Transport};

/// Executes requests through a transport.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Client over an arbitrary transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Client over `HyperTransport` using the given runtimes.
    pub fn with_hyper(config: &PipelineConfig, resources: Arc<dyn ResourceProvider>) -> Self {
        Self::new(HyperTransport::new(config.transport.clone(), resources))
    }

    /// Start an exchange. Events become available as the transport
    /// reports progress.
    pub fn execute(&self, request: Request<Bytes>) -> ResponseEvents {
        let (handle, events) = Exchange::open();
        tracing::info!(
            exchange_id = %handle.id(),
            method = %request.method(),
            uri = %request.uri(),
            "Executing request"
        );
        self.transport.execute(request, Box::new(handle));
        events
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExchangeError, TransportError};
    use crate::exchange::ExchangeDelegate;
    use crate::transport::RuntimePool;

    struct Refusing;

    impl Transport for Refusing {
        fn execute(&self, _request: Request<Bytes>, delegate: Box<dyn ExchangeDelegate>) {
            delegate.transport_error(TransportError::Connect("refused".into()));
        }
    }

    #[tokio::test]
    async fn transport_failure_reaches_caller() {
        let client = Client::new(Refusing);
        let events = client.execute(Request::new(Bytes::new()));
        assert!(matches!(
            events.response().await,
            Err(ExchangeError::Transport(TransportError::Connect(_)))
        ));
    }

    #[tokio::test]
    async fn shut_down_pool_fails_exchange() {
        let config = PipelineConfig::default();
        let pool = Arc::new(RuntimePool::new(config.runtime.clone()));
        pool.shutdown();

        let client = Client::with_hyper(&config, pool);
        let events = client.execute(Request::new(Bytes::new()));
        assert!(matches!(
            events.response().await,
            Err(ExchangeError::Transport(TransportError::Shutdown))
        ));
    }
}
