use std::sync::Arc;

use crate::{
    Emission, Error, EventKey, HandlerError, Observable, Observer, Registry, Result, StreamError,
    StreamSubscription, Subscriber, Workflow,
    workflow::{Entry, FailureFn, SuccessFn},
};

/// Scoped, transactional builder for one subscription.
///
/// Open it with [`Registry::context`] (event mode, scope [`EventScope`]) or
/// [`Observable::context`] (stream mode, scope [`StreamScope`]). Inside
/// [`enter`](Self::enter), declare the callbacks on the scope in any order.
/// When the closure returns `Ok`, everything declared is subscribed in one call.
/// When it returns `Err` or panics, nothing is subscribed.
///
/// ```rust
/// use fanout::{Emitter, Error, Registry};
///
/// let registry = Registry::default();
/// registry.context(["Greet"]).enter(|scope| {
///     scope
///         .on_event(|e| Ok(format!("hello {}", e.arg::<&str>(0).unwrap_or(&"?"))))
///         .on_success(|greeting| {
///             println!("{greeting}");
///             Ok(())
///         });
///     Ok::<_, Error>(())
/// })?;
///
/// assert_eq!(Emitter::new(registry).emit("Greet", fanout::args!["ann"]), 1);
/// # Ok::<_, Error>(())
/// ```
pub struct SubscriptionContext<S> {
    scope: S,
}

/// What a [`SubscriptionContext`] scope turns into when it is committed.
pub trait Commit {
    /// Handle of the created subscription.
    type Handle;

    fn commit(self) -> Result<Self::Handle>;
}

impl<S: Commit> SubscriptionContext<S> {
    pub(crate) fn new(scope: S) -> Self {
        Self { scope }
    }

    /// Run `f` on the scope, then commit. The subscription handle is discarded.
    pub fn enter<F, E>(self, f: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&mut S) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        self.enter_stateful(f).map(drop)
    }

    /// Like [`enter`](Self::enter), returning the created subscription handle.
    pub fn enter_stateful<F, E>(mut self, f: F) -> std::result::Result<S::Handle, E>
    where
        F: FnOnce(&mut S) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        f(&mut self.scope)?;
        Ok(self.scope.commit()?)
    }
}

/// Event-mode scope: collects the callbacks and flags of one [`Workflow`].
pub struct EventScope<R> {
    registry: Registry,
    keys: Vec<EventKey>,
    entry: Option<Entry<R>>,
    success: Option<SuccessFn<R>>,
    failure: Option<FailureFn>,
    once: bool,
    force_offload: bool,
    label: Option<Arc<str>>,
}

impl<R: Send + 'static> EventScope<R> {
    pub(crate) fn new(registry: Registry, keys: Vec<EventKey>) -> Self {
        Self {
            registry,
            keys,
            entry: None,
            success: None,
            failure: None,
            once: false,
            force_offload: false,
            label: None,
        }
    }

    pub fn on_event<F>(&mut self, entry: F) -> &mut Self
    where
        F: Fn(&Emission) -> std::result::Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.entry = Some(Workflow::new(entry).entry);
        self
    }

    pub fn on_event_async<F, Fut>(&mut self, entry: F) -> &mut Self
    where
        F: Fn(Arc<Emission>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, HandlerError>> + Send + 'static,
    {
        self.entry = Some(Workflow::new_async(entry).entry);
        self
    }

    pub fn on_success<F>(&mut self, success: F) -> &mut Self
    where
        F: Fn(R) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.success = Some(Arc::new(success));
        self
    }

    pub fn on_failure<F>(&mut self, failure: F) -> &mut Self
    where
        F: Fn(HandlerError) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.failure = Some(Arc::new(failure));
        self
    }

    pub fn once(&mut self) -> &mut Self {
        self.once = true;
        self
    }

    pub fn force_offload(&mut self) -> &mut Self {
        self.force_offload = true;
        self
    }

    pub fn label<N: Into<Arc<str>>>(&mut self, label: N) -> &mut Self {
        self.label = Some(label.into());
        self
    }
}

impl<R: Send + 'static> Commit for EventScope<R> {
    type Handle = Subscriber;

    fn commit(self) -> Result<Subscriber> {
        let entry = self
            .entry
            .ok_or_else(|| Error::IncompleteWorkflow("no event callback was set".into()))?;
        let workflow = Workflow {
            success: self.success,
            failure: self.failure,
            once: self.once,
            force_offload: self.force_offload,
            label: self.label,
            ..Workflow::from_entry(entry)
        };
        self.registry.subscribe(self.keys, workflow)
    }
}

/// Stream-mode scope: collects the callbacks of one [`Observer`].
pub struct StreamScope<T: Send + 'static> {
    observable: Observable<T>,
    observer: Observer<T>,
}

impl<T: Send + 'static> StreamScope<T> {
    pub(crate) fn new(observable: Observable<T>) -> Self {
        Self {
            observable,
            observer: Observer::new(),
        }
    }

    pub fn on_next<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observer = std::mem::take(&mut self.observer).on_next(f);
        self
    }

    pub fn on_error<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.observer = std::mem::take(&mut self.observer).on_error(f);
        self
    }

    pub fn on_complete<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observer = std::mem::take(&mut self.observer).on_complete(f);
        self
    }
}

impl<T: Send + 'static> Commit for StreamScope<T> {
    type Handle = StreamSubscription;

    fn commit(self) -> Result<StreamSubscription> {
        Ok(self.observable.subscribe(self.observer))
    }
}
