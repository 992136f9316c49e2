//! Execution back-ends.
//!
//! The dispatch core only knows one operation: [`Executor::submit`]. It hands over
//! a unit of work and never waits for, or hears back from, it. Whatever the job
//! does with errors is contained inside the job itself.
//!
//! Shipped back-ends:
//! - [`Inline`]: runs the job on the calling thread before `submit` returns.
//! - [`TokioExecutor`]: cooperative scheduling on a tokio runtime.
//! - [`WorkerPool`]: a dedicated multi-threaded runtime.
//! - [`JobQueue`]: hands jobs to a queue drained by someone else.
//!
//! None of the back-ends can cancel a job once submitted. Tearing a back-end down
//! while jobs are outstanding silently discards them.

mod inline;
mod pool;
mod queue;
mod runtime;

use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use inline::Inline;
pub use pool::WorkerPool;
pub use queue::{JobQueue, JobReceiver};
pub use runtime::TokioExecutor;

/// A unit of work handed to an [`Executor`].
pub type Job = BoxFuture<'static, ()>;

/// The processing-service contract: accept a job, return nothing.
pub trait Executor: Send + Sync {
    fn submit(&self, job: Job);
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn submit(&self, job: Job) {
        (**self).submit(job)
    }
}

impl<X: Executor + ?Sized> Executor for &X {
    fn submit(&self, job: Job) {
        (**self).submit(job)
    }
}

/// Runs `f`, which blocks on a future, where blocking is allowed.
///
/// `futures_executor::block_on` refuses to run inside another futures executor on
/// the same thread. In that case `f` runs on a scoped helper thread and the
/// caller waits for it. A panic in `f` is resumed on the calling thread.
pub(crate) fn outside_executor<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match futures_executor::enter() {
        Ok(guard) => {
            drop(guard);
            f()
        }
        Err(_) => std::thread::scope(|s| match s.spawn(f).join() {
            Ok(out) => out,
            Err(panic) => std::panic::resume_unwind(panic),
        }),
    }
}
