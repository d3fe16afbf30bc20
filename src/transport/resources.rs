//! Worker runtimes for transports.
//!
//! # Responsibilities
//! - Hand out a runtime `Handle` per worker group key
//! - Create a group's runtime on first use
//! - Shut every group down explicitly
//!
//! # Design Decisions
//! - Injected into transports instead of living in a global
//! - After `shutdown`, lookups fail with `TransportError::Shutdown`

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::RuntimeConfig;
use crate::error::TransportError;

/// Source of runtimes that drive exchanges.
pub trait ResourceProvider: Send + Sync {
    fn handle(&self, key: &str) -> Result<Handle, TransportError>;
}

/// Uses the runtime of the calling task for every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentRuntime;

impl ResourceProvider for CurrentRuntime {
    fn handle(&self, _key: &str) -> Result<Handle, TransportError> {
        Handle::try_current().map_err(|e| TransportError::Runtime(e.to_string()))
    }
}

/// Keyed pool of multi-thread runtimes.
#[derive(Debug)]
pub struct RuntimePool {
    config: RuntimeConfig,
    /// `None` once shut down.
    groups: Mutex<Option<HashMap<String, Runtime>>>,
}

impl RuntimePool {
    /// Empty pool. Groups start on first lookup.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            groups: Mutex::new(Some(HashMap::new())),
        }
    }

    /// Number of worker groups started so far.
    pub fn group_count(&self) -> usize {
        let groups = self.groups.lock().expect("runtime pool mutex poisoned");
        groups.as_ref().map_or(0, HashMap::len)
    }

    /// Stop every worker group. Tasks still running are dropped.
    pub fn shutdown(&self) {
        let groups = self.groups.lock().expect("runtime pool mutex poisoned").take();
        for (key, runtime) in groups.into_iter().flatten() {
            tracing::info!(group = %key, "Worker group shutting down");
            runtime.shutdown_background();
        }
    }

    fn build(&self, key: &str) -> Result<Runtime, TransportError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .thread_name(format!("{}-{}", self.config.thread_name, key))
            .enable_all()
            .build()?;
        tracing::info!(
            group = %key,
            worker_threads = self.config.worker_threads,
            "Worker group started"
        );
        Ok(runtime)
    }
}

impl ResourceProvider for RuntimePool {
    fn handle(&self, key: &str) -> Result<Handle, TransportError> {
        let mut guard = self.groups.lock().expect("runtime pool mutex poisoned");
        let groups = guard.as_mut().ok_or(TransportError::Shutdown)?;
        if let Some(runtime) = groups.get(key) {
            return Ok(runtime.handle().clone());
        }
        let runtime = self.build(key)?;
        let handle = runtime.handle().clone();
        groups.insert(key.to_string(), runtime);
        Ok(handle)
    }
}

impl Drop for RuntimePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
