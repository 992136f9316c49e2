use std::{
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use futures_util::{
    FutureExt, Stream, StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};

use crate::{HandlerError, StreamError};

/// One item produced by a stream source.
///
/// `Completed` ends the stream cleanly and is not an error. A source that simply
/// runs out of items completes the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T> {
    Value(T),
    Completed,
    Errored(StreamError),
}

impl<T> Signal<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Value(_))
    }
}

impl<T> From<Result<T, StreamError>> for Signal<T> {
    fn from(result: Result<T, StreamError>) -> Self {
        match result {
            Ok(value) => Signal::Value(value),
            Err(err) => Signal::Errored(err),
        }
    }
}

type CallFn<A, T> = Arc<dyn Fn(A) -> Result<T, StreamError> + Send + Sync>;
type CallAsyncFn<A, T> =
    Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, StreamError>> + Send + Sync>;
type GenerateFn<A, T> =
    Arc<dyn Fn(A) -> Box<dyn Iterator<Item = Signal<T>> + Send> + Send + Sync>;
type StreamFn<A, T> = Arc<dyn Fn(A) -> BoxStream<'static, Signal<T>> + Send + Sync>;

enum Producer<A, T> {
    Call(CallFn<A, T>),
    CallAsync(CallAsyncFn<A, T>),
    Generate(GenerateFn<A, T>),
    Stream(StreamFn<A, T>),
}

/// The unit of work behind an observable, taking arguments of type `A`.
///
/// | constructor            | produces                  | runs   |
/// |------------------------|---------------------------|--------|
/// | [`Source::call`]       | one value, then completes | sync   |
/// | [`Source::call_async`] | one value, then completes | async  |
/// | [`Source::generate`]   | a sequence of [`Signal`]s | sync   |
/// | [`Source::stream`]     | a sequence of [`Signal`]s | async  |
///
/// A panic inside the source ends the stream as an error.
pub struct Source<A, T> {
    producer: Producer<A, T>,
}

impl<A, T> Source<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub fn call<F>(f: F) -> Self
    where
        F: Fn(A) -> Result<T, StreamError> + Send + Sync + 'static,
    {
        Self {
            producer: Producer::Call(Arc::new(f)),
        }
    }

    pub fn call_async<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StreamError>> + Send + 'static,
    {
        Self {
            producer: Producer::CallAsync(Arc::new(move |args| f(args).boxed())),
        }
    }

    /// Synchronous generator. Items are pulled one at a time, between deliveries.
    pub fn generate<F, I>(f: F) -> Self
    where
        F: Fn(A) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Signal<T>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            producer: Producer::Generate(Arc::new(
                move |args| -> Box<dyn Iterator<Item = Signal<T>> + Send> {
                    Box::new(f(args).into_iter())
                },
            )),
        }
    }

    pub fn stream<F, S>(f: F) -> Self
    where
        F: Fn(A) -> S + Send + Sync + 'static,
        S: Stream<Item = Signal<T>> + Send + 'static,
    {
        Self {
            producer: Producer::Stream(Arc::new(move |args| f(args).boxed())),
        }
    }

    /// Whether the source yields a single value (as opposed to a sequence).
    pub fn is_plain(&self) -> bool {
        matches!(self.producer, Producer::Call(_) | Producer::CallAsync(_))
    }

    /// Start the source and return its signals. Nothing runs before this call.
    pub(crate) fn open(&self, args: A) -> BoxStream<'static, Signal<T>> {
        let opened = catch_unwind(AssertUnwindSafe(|| match &self.producer {
            Producer::Call(f) => stream::iter(settle(f(args))).boxed(),
            Producer::CallAsync(f) => stream::once(f(args))
                .flat_map(|result| stream::iter(settle(result)))
                .boxed(),
            Producer::Generate(f) => stream::iter(f(args)).boxed(),
            Producer::Stream(f) => f(args),
        }));
        match opened {
            Ok(signals) => AssertUnwindSafe(signals)
                .catch_unwind()
                .map(|item| {
                    item.unwrap_or_else(|panic| Signal::Errored(HandlerError::from_panic(panic)))
                })
                .boxed(),
            Err(panic) => stream::iter([Signal::Errored(HandlerError::from_panic(panic))]).boxed(),
        }
    }
}

impl<A, T> Clone for Source<A, T> {
    fn clone(&self) -> Self {
        let producer = match &self.producer {
            Producer::Call(f) => Producer::Call(f.clone()),
            Producer::CallAsync(f) => Producer::CallAsync(f.clone()),
            Producer::Generate(f) => Producer::Generate(f.clone()),
            Producer::Stream(f) => Producer::Stream(f.clone()),
        };
        Self { producer }
    }
}

impl<A, T> std::fmt::Debug for Source<A, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.producer {
            Producer::Call(_) => "call",
            Producer::CallAsync(_) => "call_async",
            Producer::Generate(_) => "generate",
            Producer::Stream(_) => "stream",
        };
        f.debug_tuple("Source").field(&kind).finish()
    }
}

/// A plain result as a finished sequence.
fn settle<T>(result: Result<T, StreamError>) -> Vec<Signal<T>> {
    match result {
        Ok(value) => vec![Signal::Value(value), Signal::Completed],
        Err(err) => vec![Signal::Errored(err)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<T: Send + 'static>(signals: BoxStream<'static, Signal<T>>) -> Vec<Signal<T>> {
        futures_executor::block_on(signals.collect())
    }

    #[test]
    fn test_plain_call_completes_after_value() {
        let source = Source::call(|n: u32| Ok(n * 2));
        assert!(source.is_plain());
        assert_eq!(
            collect(source.open(21)),
            vec![Signal::Value(42), Signal::Completed]
        );
    }

    #[test]
    fn test_plain_call_error() {
        let source = Source::<(), u8>::call(|_| Err(HandlerError::msg("nope")));
        let signals = collect(source.open(()));
        assert_eq!(signals.len(), 1);
        assert!(matches!(&signals[0], Signal::Errored(e) if e.to_string() == "nope"));
    }

    #[test]
    fn test_async_call() {
        let source = Source::call_async(|name: &'static str| async move { Ok(name.len()) });
        assert_eq!(
            collect(source.open("four")),
            vec![Signal::Value(4), Signal::Completed]
        );
    }

    #[test]
    fn test_generator_is_lazy_per_open() {
        let source = Source::generate(|n: u8| (1..=n).map(Signal::Value));
        assert!(!source.is_plain());
        assert_eq!(
            collect(source.open(3)),
            vec![Signal::Value(1), Signal::Value(2), Signal::Value(3)]
        );
        assert_eq!(collect(source.open(1)), vec![Signal::Value(1)]);
    }

    #[test]
    fn test_async_stream() {
        let source = Source::stream(|_: ()| stream::iter([Signal::Value('a'), Signal::Completed]));
        assert_eq!(
            collect(source.open(())),
            vec![Signal::Value('a'), Signal::Completed]
        );
    }

    #[test]
    fn test_panics_become_errors() {
        let source = Source::<(), u8>::call(|_| panic!("at open"));
        let signals = collect(source.open(()));
        assert!(matches!(&signals[..], [Signal::Errored(e)] if e.is_panic()));

        let source = Source::generate(|_: ()| {
            (0..3u8).map(|i| if i == 1 { panic!("mid-stream") } else { Signal::Value(i) })
        });
        let signals = collect(source.open(()));
        assert_eq!(signals[0], Signal::Value(0));
        assert!(matches!(&signals[1], Signal::Errored(e) if e.is_panic()));
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn test_signal_from_result() {
        assert_eq!(Signal::from(Ok::<_, StreamError>(1)), Signal::Value(1));
        assert!(Signal::<u8>::from(Err(HandlerError::msg("x"))).is_terminal());
        assert!(Signal::<u8>::Completed.is_terminal());
    }
}
