use tokio::runtime::{Builder, Runtime};

use super::{Executor, Job};
use crate::Result;

/// A fixed set of worker threads owned by the executor.
///
/// Backed by a dedicated multi-threaded tokio runtime, so jobs run in parallel and
/// never share a scheduler with the code that emitted them. Blocking handler
/// bodies only occupy a pool worker.
///
/// Dropping the pool shuts its runtime down in the background: jobs that have not
/// finished by then are discarded.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Option<Runtime>,
}

impl WorkerPool {
    /// Start a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name("fanout-worker")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }
}

impl Executor for WorkerPool {
    fn submit(&self, job: Job) {
        if let Some(runtime) = &self.runtime {
            drop(runtime.spawn(job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // A plain drop would block, which panics inside an async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
