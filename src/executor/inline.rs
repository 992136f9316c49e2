use std::{cell::RefCell, collections::VecDeque};

use super::{Executor, Job, outside_executor};

thread_local! {
    /// Jobs submitted while an inline job is already running on this thread.
    static PENDING: RefCell<Option<VecDeque<Job>>> = const { RefCell::new(None) };
}

/// Runs every job to completion on the calling thread.
///
/// `submit` returns only after the job (and anything it submitted in turn) has
/// finished. A job submitted from inside a running inline job is queued and run
/// right after the current one, so a success or failure continuation always runs
/// after its entry callback, never nested inside it.
///
/// Jobs are driven with a blocking executor: async handlers must not depend on
/// being polled by a tokio runtime (timers, tokio IO). Use [`TokioExecutor`]
/// for those. When `submit` is called from a future that another blocking
/// executor is polling, the jobs run on a short-lived helper thread while the
/// caller waits, so a job must not wait on that outer executor.
///
/// [`TokioExecutor`]: crate::executor::TokioExecutor
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Executor for Inline {
    fn submit(&self, job: Job) {
        let job = PENDING.with(|pending| match pending.borrow_mut().as_mut() {
            Some(queue) => {
                queue.push_back(job);
                None
            }
            None => Some(job),
        });
        if let Some(job) = job {
            outside_executor(move || drain(job));
        }
    }
}

fn drain(first: Job) {
    PENDING.with(|pending| *pending.borrow_mut() = Some(VecDeque::new()));
    let _reset = ResetOnDrop;
    let mut next = Some(first);
    while let Some(job) = next {
        futures_executor::block_on(job);
        next = PENDING.with(|pending| pending.borrow_mut().as_mut().and_then(VecDeque::pop_front));
    }
}

/// Leaves the thread in a clean state even if a job panics.
struct ResetOnDrop;

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        PENDING.with(|pending| *pending.borrow_mut() = None);
    }
}
