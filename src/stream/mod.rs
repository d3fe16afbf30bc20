//! Value streams bridging push-based producers and pull-based consumers.
//!
//! # Data Flow
//! ```text
//! producer thread(s)
//!     → ValueStream::append / close / fail
//!     → queue.rs (SerialQueue linearizes every mutation)
//!     → strategy.rs (Buffered until attach, Dispatch after)
//!     → Sink callback or Subscription (async pull)
//! ```

pub mod queue;
pub mod strategy;
pub mod value;

pub use queue::SerialQueue;
pub use strategy::{Buffered, Dispatch, QueueStrategy, Signal, Sink};
pub use value::{StreamState, Subscription, ValueStream};
