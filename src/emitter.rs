use std::sync::Arc;

use crate::{
    Args, Emission, Event, EventKey, Kind, Registry,
    executor::{Executor, Inline},
    trace::Tracer,
};

/// Publishes emissions to the subscribers of a [`Registry`].
///
/// - `emit(key, args)`: emit under any key.
/// - `emit_event(event, args)`: emit an event instance under its kind.
/// - `emit_name(key)` / `trigger(event)`: the same without extra payload.
///
/// Every `emit*` call resolves its subscribers once, consuming `once`
/// subscribers as it does, and then submits one job per subscriber to the
/// emitter's [`Executor`]. It returns the number of subscribers the emission
/// was dispatched to and never waits for them, nor reports their errors.
///
/// ```rust
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// use fanout::{Emitter, Registry, Workflow, args};
///
/// let registry = Registry::default();
/// let total = Arc::new(AtomicUsize::new(0));
/// let t = total.clone();
/// registry
///     .subscribe(["Deposit"], Workflow::new(move |e| {
///         t.fetch_add(*e.arg::<usize>(0).unwrap_or(&0), Ordering::SeqCst);
///         Ok(())
///     }))
///     .unwrap();
///
/// let emitter = Emitter::new(registry);
/// assert_eq!(emitter.emit("Deposit", args![5usize]), 1);
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// ```
#[derive(Clone)]
pub struct Emitter {
    registry: Registry,
    executor: Arc<dyn Executor>,
    tracer: Tracer,
}

impl Emitter {
    /// Emitter that runs handlers inline on the emitting thread.
    pub fn new(registry: Registry) -> Self {
        Self::builder(registry).build()
    }

    pub fn builder(registry: Registry) -> EmitterBuilder {
        EmitterBuilder {
            registry,
            executor: None,
            debug: None,
        }
    }

    pub fn emit<K, A>(&self, key: K, args: A) -> usize
    where
        K: Into<EventKey>,
        A: Into<Args>,
    {
        let key = key.into();
        let subscribers = self.registry.resolve(key.clone(), true, &self.tracer);
        self.dispatch(Emission::new(key, args.into(), subscribers))
    }

    /// Emit `event` under its [`Kind`]. Subscribers of the kind's ancestors match too.
    ///
    /// The instance is available to handlers as [`Emission::event`] and as the
    /// first positional argument, ahead of `args`.
    pub fn emit_event<E, A>(&self, event: E, args: A) -> usize
    where
        E: Event,
        A: Into<Args>,
    {
        let subscribers = self.registry.resolve(Kind::of::<E>().into(), true, &self.tracer);
        self.dispatch(Emission::with_event(event, args.into(), subscribers))
    }

    /// Emit `key` without payload.
    pub fn emit_name<K: Into<EventKey>>(&self, key: K) -> usize {
        self.emit(key, Args::new())
    }

    /// Emit `event` without extra payload.
    pub fn trigger<E: Event>(&self, event: E) -> usize {
        self.emit_event(event, Args::new())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn dispatch(&self, emission: Emission) -> usize {
        let emission = Arc::new(emission);
        let matched = emission.subscribers().len();
        self.tracer
            .emitted(emission.key(), emission.meta().id(), matched);

        for subscriber in emission.subscribers() {
            self.tracer
                .dispatched(subscriber.id(), emission.meta().id());
            let job = subscriber.bind(
                emission.clone(),
                self.executor.clone(),
                self.tracer.clone(),
            );
            self.executor.submit(job);
        }
        matched
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("registry", &self.registry)
            .field("debug", &self.tracer.enabled())
            .finish()
    }
}

/// Configures an [`Emitter`]. Obtained from [`Emitter::builder`].
pub struct EmitterBuilder {
    registry: Registry,
    executor: Option<Arc<dyn Executor>>,
    debug: Option<bool>,
}

impl EmitterBuilder {
    /// Back-end that runs handler jobs. Default: [`Inline`].
    pub fn executor<X: Executor + 'static>(self, executor: X) -> Self {
        self.shared_executor(Arc::new(executor))
    }

    /// Like [`executor`](Self::executor), for a back-end shared with other emitters.
    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Force debug tracing on or off for this emitter, over the registry setting.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn build(self) -> Emitter {
        let tracer = self.registry.tracer().with_override(self.debug);
        Emitter {
            executor: self.executor.unwrap_or_else(|| Arc::new(Inline)),
            registry: self.registry,
            tracer,
        }
    }
}
