use tokio::runtime::Handle;

use super::{Executor, Job};
use crate::{Error, Result};

/// Cooperative scheduling on a tokio runtime.
///
/// Each job becomes an independent tokio task, so sibling handlers of one
/// emission interleave at their own `.await` points instead of running one after
/// another. On a `current_thread` runtime this is the single-threaded cooperative
/// regime; on a multi-threaded runtime tasks may also run in parallel.
///
/// Jobs still pending when the runtime shuts down are dropped without running.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Bind to the runtime the caller is currently running in.
    ///
    /// Fails with [`Error::BackendUnavailable`] when called outside a runtime.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::BackendUnavailable(e.to_string().into()))?;
        Ok(Self { handle })
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, job: Job) {
        // Detached: the core keeps no handle back into submitted work.
        drop(self.handle.spawn(job));
    }
}
