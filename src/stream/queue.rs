//! Serialized execution slot for stream state.
//!
//! # Responsibilities
//! - Run every mutation of one piece of state in submission order
//! - Never run two operations concurrently, whichever thread submits them
//! - Never block a submitter behind another submitter's operation
//!
//! # Design Decisions
//! - The first submitter to find the slot free becomes the runner and drains
//!   everything queued behind it before handing the state back
//! - Operations may submit further operations; those run after the current one
//! - The mutex only guards the hand-off, never an operation body
//! - A panicking operation does not strand the backlog; the runner drains
//!   it and then re-raises the panic

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

type Operation<S> = Box<dyn FnOnce(&mut S) + Send>;

struct Inner<S> {
    pending: VecDeque<Operation<S>>,
    /// `None` while a runner holds the state.
    state: Option<S>,
}

/// Linearizes operations on a value of type `S`.
pub struct SerialQueue<S> {
    inner: Mutex<Inner<S>>,
}

impl<S: Send> SerialQueue<S> {
    /// Create a queue owning `state`.
    pub fn new(state: S) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                state: Some(state),
            }),
        }
    }

    /// Enqueue `operation`. It runs exactly once, after every operation
    /// submitted before it.
    ///
    /// # Panics
    /// Re-raises the first panic of an operation this call ran, after the
    /// operations queued behind it have run.
    pub fn submit<F>(&self, operation: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let mut state = {
            let mut inner = self.lock();
            match inner.state.take() {
                Some(state) => state,
                None => {
                    inner.pending.push_back(Box::new(operation));
                    return;
                }
            }
        };

        // The state is only handed back once `pending` is empty, so nothing
        // can be queued ahead of this operation.
        let mut next: Operation<S> = Box::new(operation);
        let mut panicked = None;
        loop {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| next(&mut state))) {
                panicked.get_or_insert(payload);
            }

            let mut inner = self.lock();
            match inner.pending.pop_front() {
                Some(queued) => next = queued,
                None => {
                    inner.state = Some(state);
                    break;
                }
            }
        }

        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
    }

    /// Number of operations waiting behind the current runner.
    pub fn backlog(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().expect("serial queue mutex poisoned")
    }
}
