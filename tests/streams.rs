use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use fanout::{
    Emitter, Error, HandlerError, Inline, Observable, Observer, Registry, Signal, Source,
    Termination, WorkerPool, Workflow, as_observable, observable::State,
};
use futures_util::stream;

type Log = Arc<Mutex<Vec<String>>>;

fn recorder<T: std::fmt::Debug + Send + 'static>(log: &Log) -> Observer<T> {
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    Observer::new()
        .on_next(move |v: &T| n.lock().unwrap().push(format!("next({v:?})")))
        .on_error(move |err| e.lock().unwrap().push(format!("error({err})")))
        .on_complete(move || c.lock().unwrap().push("complete".into()))
}

fn one_two_three() -> Observable<u32> {
    as_observable(Source::generate(|_: ()| {
        [
            Signal::Value(1),
            Signal::Value(2),
            Signal::Value(3),
            Signal::Completed,
        ]
    }))
    .call(())
}

#[tokio::test]
async fn test_generator_then_completed() {
    let log = Log::default();
    let observable = one_two_three();
    observable.subscribe(recorder(&log));

    assert_eq!(observable.run().await.unwrap(), Termination::Completed);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["next(1)", "next(2)", "next(3)", "complete"]
    );
}

#[tokio::test]
async fn test_two_observers_see_identical_sequences() {
    let (a, b) = (Log::default(), Log::default());
    let observable = as_observable(Source::stream(|limit: u32| {
        stream::unfold(0u32, move |n| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            match n {
                n if n < limit => Some((Signal::Value(n), n + 1)),
                n if n == limit => Some((Signal::Errored(HandlerError::msg("limit")), n + 1)),
                _ => None,
            }
        })
    }))
    .call(4);
    observable.subscribe(recorder(&a));
    observable.subscribe(recorder(&b));

    let outcome = observable.run().await.unwrap();
    assert_eq!(outcome.error().map(ToString::to_string).as_deref(), Some("limit"));
    assert_eq!(
        *a.lock().unwrap(),
        vec!["next(0)", "next(1)", "next(2)", "next(3)", "error(limit)"]
    );
    assert_eq!(*a.lock().unwrap(), *b.lock().unwrap());
}

#[tokio::test]
async fn test_factory_makes_independent_cold_observables() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let factory = as_observable(Source::call_async(move |name: String| {
        c.fetch_add(1, Ordering::SeqCst);
        async move { Ok(format!("hello {name}")) }
    }));

    let first = factory.call("ann".into());
    let second = factory.call("bob".into());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let log = Log::default();
    second.subscribe(recorder(&log));
    second.run().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.state(), State::Cold);
    assert_eq!(*log.lock().unwrap(), vec!["next(\"hello bob\")", "complete"]);

    assert!(matches!(second.run().await, Err(Error::AlreadyStarted)));
}

#[tokio::test]
async fn test_run_on_worker_pool() {
    let (a, b) = (Log::default(), Log::default());
    let observable = one_two_three();
    observable.subscribe(recorder(&a));
    observable.subscribe(recorder(&b));

    let pool = WorkerPool::new(2).unwrap();
    assert!(observable.run_on(&pool).await.unwrap().is_completed());
    assert_eq!(a.lock().unwrap().len(), 4);
    assert_eq!(*a.lock().unwrap(), *b.lock().unwrap());
}

#[tokio::test]
async fn test_cancel_from_another_task() {
    let log = Log::default();
    let observable = as_observable(Source::stream(|_: ()| {
        stream::unfold(0u32, |n| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Some((Signal::Value(n), n + 1))
        })
    }))
    .call(());
    observable.subscribe(recorder(&log));

    let handle = observable.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();
    });

    assert_eq!(observable.run().await.unwrap(), Termination::Cancelled);
    assert!(!log.lock().unwrap().iter().any(|line| line == "complete"));
}

#[test]
fn test_scope_runs_exactly_once_on_every_exit() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = runs.clone();
    let factory = as_observable(Source::call(move |_: ()| {
        r.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    // explicit finish
    let observable = factory.call(());
    futures_executor::block_on(observable.enter().finish()).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // plain drop
    let observable = factory.call(());
    drop(observable.enter());
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // panic inside the scope
    let observable = factory.call(());
    let o = observable.clone();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        let _scope = o.enter();
        panic!("caller bug");
    }));
    assert!(outcome.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(observable.state(), State::Completed);

    // drop inside a future polled by a blocking executor
    let observable = factory.call(());
    futures_executor::block_on(async {
        let scope = observable.enter();
        scope.subscribe(Observer::new());
    });
    assert_eq!(runs.load(Ordering::SeqCst), 4);

    // drop inside a handler dispatched inline
    let observable = factory.call(());
    let registry = Registry::default();
    let o = observable.clone();
    registry
        .subscribe(
            ["open"],
            Workflow::new(move |_| {
                let _scope = o.enter();
                Ok(())
            }),
        )
        .unwrap();
    Emitter::new(registry).emit_name("open");
    assert_eq!(runs.load(Ordering::SeqCst), 5);
    assert_eq!(observable.state(), State::Completed);
}

#[test]
fn test_run_on_inline_inside_blocking_executor() {
    let log = Log::default();
    let observable = one_two_three();
    observable.subscribe(recorder(&log));

    let outcome = futures_executor::block_on(observable.run_on(&Inline)).unwrap();
    assert!(outcome.is_completed());
    assert_eq!(
        *log.lock().unwrap(),
        vec!["next(1)", "next(2)", "next(3)", "complete"]
    );
}

#[tokio::test]
async fn test_stream_context_is_transactional() {
    let observable = one_two_three();
    let log = Log::default();

    let aborted = observable.context().enter(|scope| {
        scope.on_next(|_| {});
        Err::<(), _>(Error::NoKeys)
    });
    assert!(aborted.is_err());
    assert_eq!(observable.observer_count(), 0);

    let (n, c) = (log.clone(), log.clone());
    let subscription = observable
        .context()
        .enter_stateful(|scope| {
            scope
                .on_complete(move || c.lock().unwrap().push("complete".into()))
                .on_next(move |v| n.lock().unwrap().push(format!("next({v})")));
            Ok::<_, Error>(())
        })
        .unwrap();
    assert!(subscription.is_subscribed());

    observable.run().await.unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["next(1)", "next(2)", "next(3)", "complete"]
    );
}
