use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use futures_util::FutureExt;
use tokio::runtime::Handle;

use crate::{
    Emission, HandlerError, SubscriberId, Workflow,
    executor::{Executor, Job},
    trace::{Stage, Tracer},
    workflow::{Entry, FailureFn, SuccessFn},
};

/// Type-erased callbacks of a subscriber.
pub(crate) trait Invoke: Send + Sync {
    fn bind(
        &self,
        emission: Arc<Emission>,
        executor: Arc<dyn Executor>,
        tracer: Tracer,
        subscriber: SubscriberId,
        force_offload: bool,
    ) -> Job;
}

pub(crate) struct Invocation<R> {
    entry: Entry<R>,
    success: Option<SuccessFn<R>>,
    failure: Option<FailureFn>,
}

impl<R> From<Workflow<R>> for Invocation<R> {
    fn from(workflow: Workflow<R>) -> Self {
        Self {
            entry: workflow.entry,
            success: workflow.success,
            failure: workflow.failure,
        }
    }
}

/// What a bound invocation needs once the entry has returned.
struct Continuation {
    executor: Arc<dyn Executor>,
    tracer: Tracer,
    subscriber: SubscriberId,
    failure: Option<FailureFn>,
}

impl<R: Send + 'static> Invoke for Invocation<R> {
    fn bind(
        &self,
        emission: Arc<Emission>,
        executor: Arc<dyn Executor>,
        tracer: Tracer,
        subscriber: SubscriberId,
        force_offload: bool,
    ) -> Job {
        let entry = self.entry.clone();
        let success = self.success.clone();
        let next = Continuation {
            executor,
            tracer,
            subscriber,
            failure: self.failure.clone(),
        };
        Box::pin(async move {
            match run_entry(entry, emission, force_offload).await {
                Ok(value) => {
                    if let Some(success) = success {
                        let executor = next.executor.clone();
                        executor.submit(Box::pin(async move {
                            let result = guarded(|| success(value));
                            if let Err(err) = result {
                                next.fail(Stage::Success, err);
                            }
                        }));
                    }
                }
                Err(err) => next.fail(Stage::Entry, err),
            }
        })
    }
}

impl Continuation {
    /// Route an error to the failure callback, or to the trace if there is none.
    fn fail(self, stage: Stage, err: HandlerError) {
        let Continuation {
            executor,
            tracer,
            subscriber,
            failure,
        } = self;
        if err.is_panic() {
            tracer.panicked(subscriber, stage, &err);
        }
        let Some(failure) = failure else {
            tracer.swallowed(subscriber, stage, &err);
            return;
        };
        executor.submit(Box::pin(async move {
            if let Err(err) = guarded(|| failure(err)) {
                if err.is_panic() {
                    tracer.panicked(subscriber, Stage::Failure, &err);
                }
                tracer.swallowed(subscriber, Stage::Failure, &err);
            }
        }));
    }
}

async fn run_entry<R: Send + 'static>(
    entry: Entry<R>,
    emission: Arc<Emission>,
    force_offload: bool,
) -> Result<R, HandlerError> {
    if force_offload {
        // Without a runtime there is no cooperative scheduler to protect.
        if let Ok(handle) = Handle::try_current() {
            return offload(handle, entry, emission).await;
        }
    }
    match entry {
        Entry::Blocking(f) => guarded(|| f(&emission)),
        Entry::Async(f) => AssertUnwindSafe(async move { f(emission).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic))),
    }
}

async fn offload<R: Send + 'static>(
    handle: Handle,
    entry: Entry<R>,
    emission: Arc<Emission>,
) -> Result<R, HandlerError> {
    let runtime = handle.clone();
    let task = handle.spawn_blocking(move || match entry {
        Entry::Blocking(f) => guarded(|| f(&emission)),
        Entry::Async(f) => guarded(|| runtime.block_on(f(emission))),
    });
    match task.await {
        Ok(result) => result,
        Err(join) if join.is_panic() => Err(HandlerError::from_panic(join.into_panic())),
        Err(join) => Err(HandlerError::new(join)),
    }
}

/// Run a callback, turning a panic into a [`HandlerError`].
fn guarded<T>(f: impl FnOnce() -> Result<T, HandlerError>) -> Result<T, HandlerError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| Err(HandlerError::from_panic(panic)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{Args, EventKey, executor::Inline};

    fn emission() -> Arc<Emission> {
        Arc::new(Emission::new(EventKey::from("Greet"), Args::new(), Vec::new()))
    }

    fn tracer() -> Tracer {
        Tracer::new(Arc::from("test"), Some(false))
    }

    fn run<R: Send + 'static>(workflow: Workflow<R>) {
        let job = Invocation::from(workflow).bind(
            emission(),
            Arc::new(Inline),
            tracer(),
            SubscriberId::next(),
            false,
        );
        Inline.submit(job);
    }

    #[test]
    fn test_success_receives_entry_value() {
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        run(Workflow::new(|_| Ok("ok")).on_success(move |v| {
            *s.lock().unwrap() = Some(v);
            Ok(())
        }));
        assert_eq!(*seen.lock().unwrap(), Some("ok"));
    }

    #[test]
    fn test_success_error_goes_to_failure() {
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        run(Workflow::new(|_| Ok(1))
            .on_success(|_| Err(HandlerError::msg("late")))
            .on_failure(move |e| {
                *s.lock().unwrap() = Some(e.to_string());
                Ok(())
            }));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("late"));
    }

    #[test]
    fn test_panic_becomes_failure() {
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        run(Workflow::<()>::new(|_| panic!("kaboom")).on_failure(move |e| {
            *s.lock().unwrap() = Some(e.is_panic());
            Ok(())
        }));
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_unhandled_error_is_contained() {
        run(Workflow::<()>::new(|_| Err(HandlerError::msg("nobody listens"))));
        run(Workflow::new(|_| Ok(())).on_success(|_| panic!("in success")));
    }

    fn blocking<R: Send + 'static>(
        f: impl Fn(&Emission) -> Result<R, HandlerError> + Send + Sync + 'static,
    ) -> Entry<R> {
        Workflow::new(f).entry
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_offload_runs_on_blocking_thread() {
        let main_thread = std::thread::current().id();
        let entry = blocking(|_| Ok(std::thread::current().id()));
        let id = run_entry(entry, emission(), true).await.unwrap();
        assert_ne!(id, main_thread);
    }

    #[tokio::test]
    async fn test_offload_async_entry_and_panic() {
        let entry = Workflow::new_async(|_| async { Ok(5u8) }).entry;
        assert_eq!(run_entry(entry, emission(), true).await.unwrap(), 5);

        let entry = blocking::<u8>(|_| panic!("offloaded"));
        let err = run_entry(entry, emission(), true).await.unwrap_err();
        assert!(err.is_panic());
    }

    #[test]
    fn test_offload_without_runtime_runs_inline() {
        let here = std::thread::current().id();
        let entry = blocking(|_| Ok(std::thread::current().id()));
        let id = futures_executor::block_on(run_entry(entry, emission(), true)).unwrap();
        assert_eq!(id, here);
    }
}
