use std::time::Duration;

use fanout::{
    Error, Observer, Signal, Source, WorkerPool, as_observable,
    observable::Termination,
};
use futures_util::stream;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    // An async generator: `count` ticks, then done
    let ticker = as_observable(Source::stream(|count: u32| {
        stream::unfold(0, move |n| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let signal = if n < count { Signal::Value(n) } else { Signal::Completed };
            Some((signal, n + 1))
        })
    }));

    let observable = ticker.call(5);
    let outcome = observable
        .scoped(|scope| {
            scope.subscribe(Observer::new().on_next(|n: &u32| println!("[a] tick {n}")));
            scope.subscribe(
                Observer::new()
                    .on_next(|n: &u32| println!("[b] tick {n}"))
                    .on_complete(|| println!("[b] done")),
            );
        })
        .await?;
    println!("first run: {outcome:?}");

    // Same source, produced on a worker pool, delivered here
    let pool = WorkerPool::new(2)?;
    let squares = as_observable(Source::generate(|upto: u64| {
        (1..=upto).map(|n| Signal::Value(n * n))
    }))
    .call(4);
    squares.subscribe(
        Observer::new()
            .on_next(|sq: &u64| println!("square {sq}"))
            .on_error(|err| println!("failed: {err}")),
    );
    let outcome = squares.run_on(&pool).await?;
    assert_eq!(outcome, Termination::Completed);
    Ok(())
}
