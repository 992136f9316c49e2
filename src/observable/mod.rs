//! Cold, multicast streams.
//!
//! An [`Observable`] wraps a [`Source`] bound to its arguments. It does nothing
//! until it is run, and it runs at most once: every attached [`Observer`] sees
//! the same sequence of values followed by one outcome (completion or error).
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use fanout::{Observer, Signal, Source, Termination, as_observable};
//!
//! # futures_executor::block_on(async {
//! let countdown = as_observable(Source::generate(|from: u32| {
//!     (1..=from).rev().map(Signal::Value).chain([Signal::Completed])
//! }));
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let s = seen.clone();
//! let observable = countdown.call(3);
//! observable.subscribe(Observer::new().on_next(move |v: &u32| s.lock().unwrap().push(*v)));
//!
//! assert_eq!(observable.run().await.unwrap(), Termination::Completed);
//! assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1]);
//! # });
//! ```

mod observer;
mod scope;
mod source;

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use futures_util::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    Error, HandlerError, Result, StreamError, SubscriptionContext,
    context::StreamScope,
    executor::Executor,
};

pub(crate) use observer::Detach;
pub use observer::{Observer, StreamSubscription};
pub use scope::ObservableScope;
pub use source::{Signal, Source};

type Launch<T> = Box<dyn FnOnce() -> BoxStream<'static, Signal<T>> + Send>;

/// Lifecycle of an [`Observable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not run yet.
    Cold,
    Running,
    Completed,
    Errored,
    Cancelled,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Completed | State::Errored | State::Cancelled)
    }
}

/// How a run of an [`Observable`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Completed,
    Errored(StreamError),
    /// Stopped by [`Observable::cancel`]. Observers were not told.
    Cancelled,
}

impl Termination {
    pub fn is_completed(&self) -> bool {
        matches!(self, Termination::Completed)
    }

    pub fn error(&self) -> Option<&StreamError> {
        match self {
            Termination::Errored(err) => Some(err),
            _ => None,
        }
    }

    fn state(&self) -> State {
        match self {
            Termination::Completed => State::Completed,
            Termination::Errored(_) => State::Errored,
            Termination::Cancelled => State::Cancelled,
        }
    }
}

/// Wrap `source` into a factory of cold observables.
pub fn as_observable<A, T>(source: Source<A, T>) -> ObservableFactory<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    ObservableFactory { source }
}

/// Produces one cold [`Observable`] per call. See [`as_observable`].
pub struct ObservableFactory<A, T> {
    source: Source<A, T>,
}

impl<A, T> ObservableFactory<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    /// Bind the source to `args`. Nothing runs until the observable is run.
    pub fn call(&self, args: A) -> Observable<T> {
        let source = self.source.clone();
        Observable::new(Box::new(move || source.open(args)))
    }

    pub fn source(&self) -> &Source<A, T> {
        &self.source
    }
}

impl<A, T> Clone for ObservableFactory<A, T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<A, T> fmt::Debug for ObservableFactory<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableFactory")
            .field("source", &self.source)
            .finish()
    }
}

/// A cold, multicast stream bound to its arguments.
///
/// - `subscribe(observer)`: attach an observer (any number, before or during a run).
/// - `run()`: produce and deliver in the calling task.
/// - `run_on(executor)`: produce inside one job of `executor`, deliver here.
/// - `enter()` / `scoped(..)`: run exactly once when the scope ends.
/// - `cancel()`: stop at the next signal.
///
/// Handles are cheap to clone and share the same stream.
pub struct Observable<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    launch: Mutex<Option<Launch<T>>>,
    state: Mutex<State>,
    observers: Mutex<Vec<(u64, Arc<Observer<T>>)>>,
    next_id: AtomicU64,
    token: CancellationToken,
}

impl<T: Send + 'static> Observable<T> {
    fn new(launch: Launch<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                launch: Mutex::new(Some(launch)),
                state: Mutex::new(State::Cold),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                token: CancellationToken::new(),
            }),
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) -> StreamSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.observers).push((id, Arc::new(observer)));
        let target: Arc<dyn Detach> = self.inner.clone();
        StreamSubscription::new(id, Arc::downgrade(&target))
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    pub fn state(&self) -> State {
        *lock(&self.inner.state)
    }

    /// Run the source in the calling task and deliver everything it produces.
    ///
    /// Fails with [`Error::AlreadyStarted`] if the observable ran before.
    pub async fn run(&self) -> Result<Termination> {
        let launch = self.start()?;
        if self.inner.token.is_cancelled() {
            return Ok(self.finish(Termination::Cancelled));
        }
        Ok(self.deliver(launch()).await)
    }

    /// Run the source inside a job submitted to `executor`.
    ///
    /// Signals travel back over a channel and are delivered here, so observers
    /// see the same sequence as with [`run`](Self::run). If the executor drops
    /// the job before the source terminates, the run ends with an error.
    pub async fn run_on<X>(&self, executor: &X) -> Result<Termination>
    where
        X: Executor + ?Sized,
    {
        let launch = self.start()?;
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let token = self.inner.token.clone();

        executor.submit(Box::pin(async move {
            if token.is_cancelled() {
                return;
            }
            let mut signals = launch();
            loop {
                let signal = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    signal = signals.next() => signal.unwrap_or(Signal::Completed),
                };
                let last = signal.is_terminal();
                if sender.send(signal).is_err() || last {
                    break;
                }
            }
        }));

        let received = stream::poll_fn(move |cx| receiver.poll_recv(cx)).chain(stream::once(
            async { Signal::Errored(HandlerError::msg("producer ended without a terminal signal")) },
        ));
        Ok(self.deliver(received).await)
    }

    /// Stop the stream at the next signal boundary. No more callbacks fire.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Open a scope that runs the observable exactly once when it ends.
    pub fn enter(&self) -> ObservableScope<T> {
        ObservableScope::new(self.clone())
    }

    /// Closure form of [`enter`](Self::enter): attach observers in `f`, then run.
    pub async fn scoped<F>(&self, f: F) -> Result<Termination>
    where
        F: FnOnce(&ObservableScope<T>),
    {
        let scope = self.enter();
        f(&scope);
        scope.finish().await
    }

    /// Open a [`SubscriptionContext`] that attaches one observer on commit.
    pub fn context(&self) -> SubscriptionContext<StreamScope<T>> {
        SubscriptionContext::new(StreamScope::new(self.clone()))
    }

    fn start(&self) -> Result<Launch<T>> {
        let launch = lock(&self.inner.launch)
            .take()
            .ok_or(Error::AlreadyStarted)?;
        *lock(&self.inner.state) = State::Running;
        Ok(launch)
    }

    async fn deliver<S>(&self, signals: S) -> Termination
    where
        S: Stream<Item = Signal<T>>,
    {
        let token = self.inner.token.clone();
        let mut signals = std::pin::pin!(signals);
        loop {
            let signal = tokio::select! {
                biased;
                _ = token.cancelled() => return self.finish(Termination::Cancelled),
                signal = signals.next() => signal,
            };
            match signal {
                Some(Signal::Value(value)) => {
                    for observer in self.observers() {
                        if token.is_cancelled() {
                            return self.finish(Termination::Cancelled);
                        }
                        observer.next(&value);
                    }
                }
                Some(Signal::Completed) | None => {
                    for observer in self.observers() {
                        observer.complete();
                    }
                    return self.finish(Termination::Completed);
                }
                Some(Signal::Errored(err)) => {
                    for observer in self.observers() {
                        observer.error(&err);
                    }
                    return self.finish(Termination::Errored(err));
                }
            }
        }
    }

    fn observers(&self) -> Vec<Arc<Observer<T>>> {
        lock(&self.inner.observers)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }

    fn finish(&self, termination: Termination) -> Termination {
        *lock(&self.inner.state) = termination.state();
        tracing::trace!(outcome = ?termination.state(), "observable finished");
        termination
    }
}

impl<T: Send + 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("state", &self.state())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl<T: Send + 'static> Detach for Inner<T> {
    fn detach(&self, id: u64) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(other, _)| *other != id);
        observers.len() != before
    }

    fn is_attached(&self, id: u64) -> bool {
        lock(&self.observers).iter().any(|(other, _)| *other == id)
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::executor::{Inline, JobQueue, TokioExecutor};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> Observer<u32> {
        let (n, e, c) = (log.clone(), log.clone(), log.clone());
        Observer::new()
            .on_next(move |v: &u32| n.lock().unwrap().push(format!("{name} next {v}")))
            .on_error(move |err| e.lock().unwrap().push(format!("{name} error {err}")))
            .on_complete(move || c.lock().unwrap().push(format!("{name} complete")))
    }

    fn one_two_three() -> ObservableFactory<(), u32> {
        as_observable(Source::generate(|_: ()| {
            [
                Signal::Value(1),
                Signal::Value(2),
                Signal::Value(3),
                Signal::Completed,
            ]
        }))
    }

    #[tokio::test]
    async fn test_generator_delivers_in_order() {
        let log = Log::default();
        let observable = one_two_three().call(());
        observable.subscribe(recorder(&log, "a"));
        assert_eq!(observable.state(), State::Cold);

        assert_eq!(observable.run().await.unwrap(), Termination::Completed);
        assert_eq!(observable.state(), State::Completed);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a next 1", "a next 2", "a next 3", "a complete"]
        );
    }

    #[tokio::test]
    async fn test_multicast_observers_see_same_sequence() {
        let (a, b) = (Log::default(), Log::default());
        let observable = as_observable(Source::generate(|n: u32| {
            (1..=n)
                .map(Signal::Value)
                .chain([Signal::Errored(HandlerError::msg("boom"))])
        }))
        .call(2);
        observable.subscribe(recorder(&a, "x"));
        observable.subscribe(recorder(&b, "x"));

        let outcome = observable.run().await.unwrap();
        assert_eq!(outcome.error().map(ToString::to_string).as_deref(), Some("boom"));
        assert_eq!(observable.state(), State::Errored);
        assert_eq!(*a.lock().unwrap(), vec!["x next 1", "x next 2", "x error boom"]);
        assert_eq!(*a.lock().unwrap(), *b.lock().unwrap());
    }

    #[tokio::test]
    async fn test_plain_sources() {
        let log = Log::default();
        let observable = as_observable(Source::call(|n: u32| Ok(n + 1))).call(41);
        observable.subscribe(recorder(&log, "p"));
        assert!(observable.run().await.unwrap().is_completed());
        assert_eq!(*log.lock().unwrap(), vec!["p next 42", "p complete"]);

        let log = Log::default();
        let observable = as_observable(Source::call_async(|_: ()| async {
            Err::<u32, _>(HandlerError::msg("offline"))
        }))
        .call(());
        observable.subscribe(recorder(&log, "p"));
        assert!(!observable.run().await.unwrap().is_completed());
        assert_eq!(*log.lock().unwrap(), vec!["p error offline"]);
    }

    #[tokio::test]
    async fn test_exhausted_generator_completes() {
        let log = Log::default();
        let observable = as_observable(Source::generate(|_: ()| [Signal::Value(9)])).call(());
        observable.subscribe(recorder(&log, "g"));
        assert_eq!(observable.run().await.unwrap(), Termination::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["g next 9", "g complete"]);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let factory = one_two_three();
        let observable = factory.call(());
        observable.run().await.unwrap();
        assert!(matches!(observable.run().await, Err(Error::AlreadyStarted)));
        assert!(matches!(
            observable.run_on(&Inline).await,
            Err(Error::AlreadyStarted)
        ));
        assert!(factory.call(()).run().await.is_ok());
    }

    #[tokio::test]
    async fn test_unsubscribed_observer_sees_nothing() {
        let (kept, dropped) = (Log::default(), Log::default());
        let observable = one_two_three().call(());
        observable.subscribe(recorder(&kept, "k"));
        let subscription = observable.subscribe(recorder(&dropped, "d"));
        assert_eq!(observable.observer_count(), 2);

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        assert!(!subscription.is_subscribed());
        observable.run().await.unwrap();
        assert_eq!(kept.lock().unwrap().len(), 4);
        assert!(dropped.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observer_added_mid_stream_sees_the_rest() {
        let log = Log::default();
        let observable = one_two_three().call(());
        let (late, l) = (observable.clone(), log.clone());
        let attached = Arc::new(AtomicUsize::new(0));
        let a = attached.clone();
        observable.subscribe(Observer::new().on_next(move |v: &u32| {
            if *v == 1 && a.fetch_add(1, Ordering::SeqCst) == 0 {
                late.subscribe(recorder(&l, "late"));
            }
        }));

        observable.run().await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["late next 2", "late next 3", "late complete"]
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let log = Log::default();
        let observable = one_two_three().call(());
        let handle = observable.clone();
        let l = log.clone();
        observable.subscribe(Observer::new().on_next(move |v: &u32| {
            l.lock().unwrap().push(format!("next {v}"));
            if *v == 2 {
                handle.cancel();
            }
        }));
        observable.subscribe(recorder(&log, "after"));

        assert_eq!(observable.run().await.unwrap(), Termination::Cancelled);
        assert_eq!(observable.state(), State::Cancelled);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["next 1", "after next 1", "next 2"]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        let observable = as_observable(Source::call(move |_: ()| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(1u32)
        }))
        .call(());
        observable.cancel();
        assert!(observable.is_cancelled());
        assert_eq!(observable.run().await.unwrap(), Termination::Cancelled);
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_on_inline_and_tokio() {
        let log = Log::default();
        let observable = one_two_three().call(());
        observable.subscribe(recorder(&log, "i"));
        assert!(observable.run_on(&Inline).await.unwrap().is_completed());
        assert_eq!(log.lock().unwrap().len(), 4);

        let log = Log::default();
        let observable = one_two_three().call(());
        observable.subscribe(recorder(&log, "t"));
        let executor = TokioExecutor::current().unwrap();
        assert!(observable.run_on(&executor).await.unwrap().is_completed());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["t next 1", "t next 2", "t next 3", "t complete"]
        );
    }

    #[tokio::test]
    async fn test_run_on_dropped_job_is_an_error() {
        let log = Log::default();
        let observable = one_two_three().call(());
        observable.subscribe(recorder(&log, "q"));
        let (queue, receiver) = JobQueue::channel();
        drop(receiver);

        let outcome = observable.run_on(&queue).await.unwrap();
        assert!(outcome.error().is_some());
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(log.lock().unwrap()[0].starts_with("q error"));
    }
}
