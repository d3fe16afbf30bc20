//! Exchange subsystem.
//!
//! # Data Flow
//! ```text
//! transport callbacks
//!     → ExchangeHandle (delegate.rs contract, state.rs validation)
//!     → upload / head / body ValueStreams
//!     → events.rs (ResponseEvents multiplexes upload and head)
//!     → body.rs (Body pulls bytes from the body stream)
//! ```
//!
//! # Design Decisions
//! - One `Exchange::open` per request; nothing is shared across exchanges
//! - The handle and the consumer side own separate clones of the streams,
//!   so either side may be dropped first
//! - Dropping the handle before a terminal callback resolves every stream,
//!   so consumers never hang on a vanished transport

pub mod body;
pub mod delegate;
pub mod events;
pub mod head;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{ExchangeError, TransportError};
use crate::observability::metrics;
use crate::stream::ValueStream;

pub use body::Body;
pub use delegate::{Continuation, ExchangeDelegate};
pub use events::{ExchangeEvent, ResponseEvents};
pub use head::ResponseHead;
pub use state::{ExchangeState, Phase};

use state::{Abandon, FailureTarget, StateMachine, Terminal};

/// Unique identifier for an exchange, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    /// Generate a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exch-{}", self.0)
    }
}

/// The three per-phase streams of one exchange.
#[derive(Debug, Clone)]
pub(crate) struct Streams {
    pub upload: ValueStream<usize>,
    pub head: ValueStream<ResponseHead>,
    pub body: ValueStream<Bytes>,
}

impl Streams {
    fn new() -> Self {
        Self {
            upload: ValueStream::new("upload"),
            head: ValueStream::new("head"),
            body: ValueStream::new("body"),
        }
    }
}

/// Held by every consumer-side handle. The exchange is detached once all
/// of them are gone.
#[derive(Debug)]
pub(crate) struct ConsumerToken;

/// Entry point for creating exchanges.
pub struct Exchange;

impl Exchange {
    /// Create a fresh exchange: the handle goes to the transport, the
    /// events to the caller.
    pub fn open() -> (ExchangeHandle, ResponseEvents) {
        let id = ExchangeId::new();
        let streams = Streams::new();
        let consumer = Arc::new(ConsumerToken);
        metrics::record_exchange_opened();
        tracing::debug!(exchange_id = %id, "Exchange opened");

        let handle = ExchangeHandle {
            id,
            machine: Mutex::new(StateMachine::new(id)),
            streams: streams.clone(),
            consumer: Arc::downgrade(&consumer),
        };
        (handle, ResponseEvents::new(id, streams, consumer))
    }
}

/// Transport side of an exchange.
///
/// Routes each callback to the stream of its phase after validating it
/// against the exchange state machine.
///
/// # Panics
/// Every callback panics when it arrives in a state or phase the
/// transport contract does not allow.
#[derive(Debug)]
pub struct ExchangeHandle {
    id: ExchangeId,
    machine: Mutex<StateMachine>,
    streams: Streams,
    consumer: Weak<ConsumerToken>,
}

impl ExchangeHandle {
    /// Identifier shared with the consumer side.
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Current state of the exchange.
    pub fn state(&self) -> ExchangeState {
        self.machine().state()
    }

    /// Current phase of the exchange.
    pub fn phase(&self) -> Phase {
        self.machine().phase()
    }

    fn machine(&self) -> MutexGuard<'_, StateMachine> {
        self.machine.lock().expect("exchange state mutex poisoned")
    }

    fn continuation(&self) -> Continuation {
        if self.consumer.strong_count() == 0 {
            Continuation::Detached
        } else {
            Continuation::Proceed
        }
    }
}

// The machine guard is held while streams are fed so that callbacks racing
// on different threads still reach the streams in validated order.
impl ExchangeDelegate for ExchangeHandle {
    fn upload_chunk_sent(&self, byte_count: usize) {
        let mut machine = self.machine();
        machine.upload_chunk_sent();
        metrics::record_upload_bytes(byte_count);
        self.streams.upload.append(byte_count);
    }

    fn upload_finished(&self) {
        let mut machine = self.machine();
        machine.upload_finished();
        self.streams.upload.close();
    }

    fn response_head_received(&self, head: ResponseHead) -> Continuation {
        let mut machine = self.machine();
        machine.response_head_received();
        tracing::debug!(exchange_id = %self.id, status = %head.status(), "Response head received");
        self.streams.upload.close();
        self.streams.head.append(head);
        self.continuation()
    }

    fn body_chunk_received(&self, chunk: Bytes) -> Continuation {
        let mut machine = self.machine();
        machine.body_chunk_received();
        metrics::record_body_bytes(chunk.len());
        self.streams.head.close();
        self.streams.body.append(chunk);
        self.continuation()
    }

    fn exchange_finished(&self) {
        let mut machine = self.machine();
        if let Terminal::Apply(()) = machine.exchange_finished() {
            metrics::record_exchange_completed();
            tracing::debug!(exchange_id = %self.id, "Exchange finished");
        }
        self.streams.head.close();
        self.streams.body.close();
    }

    fn transport_error(&self, error: TransportError) {
        let mut machine = self.machine();
        let target = match machine.transport_error() {
            Terminal::Apply(target) => target,
            Terminal::Absorb => return,
        };
        metrics::record_exchange_failed(target.as_str());
        tracing::debug!(exchange_id = %self.id, target = target.as_str(), error = %error, "Exchange failed");

        let error = ExchangeError::Transport(error);
        match target {
            FailureTarget::Upload => self.streams.upload.fail(error),
            FailureTarget::Head => self.streams.head.fail(error),
            FailureTarget::Body => self.streams.body.fail(error),
        }
    }
}

impl Drop for ExchangeHandle {
    fn drop(&mut self) {
        let machine = self.machine.get_mut().unwrap_or_else(PoisonError::into_inner);
        match machine.abandon() {
            Abandon::Nothing => {}
            Abandon::BeforeHead => {
                self.streams.upload.close();
                self.streams.head.close();
                self.streams.body.close();
            }
            Abandon::DuringBody => {
                metrics::record_exchange_failed(FailureTarget::Body.as_str());
                self.streams.head.close();
                self.streams.body.fail(TransportError::Abandoned.into());
            }
        }
    }
}
