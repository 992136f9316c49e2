use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Weak},
};

use crate::StreamError;

type NextFn<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&StreamError) + Send + Sync>;
type CompleteFn = Arc<dyn Fn() + Send + Sync>;

/// Callbacks of one stream subscriber. All of them are optional.
///
/// Values are handed out by reference, so every observer of a multicast
/// stream sees the same instance without the item type having to be `Clone`.
pub struct Observer<T> {
    next: Option<NextFn<T>>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

impl<T> Observer<T> {
    pub fn new() -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
        }
    }

    pub fn on_next<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.complete = Some(Arc::new(f));
        self
    }

    pub(crate) fn next(&self, value: &T) {
        if let Some(f) = &self.next {
            contained("next", || f(value));
        }
    }

    pub(crate) fn error(&self, err: &StreamError) {
        if let Some(f) = &self.error {
            contained("error", || f(err));
        }
    }

    pub(crate) fn complete(&self) {
        if let Some(f) = &self.complete {
            contained("complete", || f());
        }
    }
}

impl<T> Default for Observer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .finish()
    }
}

/// A panicking observer must not take delivery to the others down with it.
fn contained(callback: &'static str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let error = crate::HandlerError::from_panic(panic);
        tracing::error!(callback, %error, "observer panicked");
    }
}

/// Where a [`StreamSubscription`] points back to.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64) -> bool;
    fn is_attached(&self, id: u64) -> bool;
}

/// Handle of one observer attached to an observable.
///
/// Dropping the handle does not detach the observer.
#[derive(Clone)]
pub struct StreamSubscription {
    id: u64,
    observable: Weak<dyn Detach>,
}

impl StreamSubscription {
    pub(crate) fn new(id: u64, observable: Weak<dyn Detach>) -> Self {
        Self { id, observable }
    }

    /// Detach the observer. Returns whether it was still attached.
    pub fn unsubscribe(&self) -> bool {
        self.observable
            .upgrade()
            .is_some_and(|observable| observable.detach(self.id))
    }

    pub fn is_subscribed(&self) -> bool {
        self.observable
            .upgrade()
            .is_some_and(|observable| observable.is_attached(self.id))
    }
}

impl fmt::Debug for StreamSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("id", &self.id)
            .finish()
    }
}
