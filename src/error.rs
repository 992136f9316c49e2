use std::{any::Any, error::Error as StdError, fmt, sync::Arc};

use crate::EventKey;

/// Errors surfaced synchronously by registration, lookup and executor setup.
///
/// Anything that goes wrong *inside* a dispatched handler or a stream source is
/// a [`HandlerError`] instead, and never comes back through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Key '{key}' already has the maximum of {limit} subscribers.")]
    LimitExceeded { key: EventKey, limit: usize },

    #[error("Execution backend is unavailable: {0}")]
    BackendUnavailable(Arc<str>),

    #[error("Observable has already been started.")]
    AlreadyStarted,

    #[error("Subscription is incomplete: {0}")]
    IncompleteWorkflow(Arc<str>),

    #[error("A subscription needs at least one key.")]
    NoKeys,

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

/// An error raised while running a handler body or producing stream values.
///
/// Cheap to clone: every continuation that receives it sees the *same*
/// underlying error instance, which can be checked with [`HandlerError::ptr_eq`].
///
/// Any `std::error::Error` converts into it, so handler bodies can use `?`.
#[derive(Clone)]
pub struct HandlerError(Arc<dyn StdError + Send + Sync + 'static>);

/// Failure raised by an observable source.
pub type StreamError = HandlerError;

impl HandlerError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Build an error from a plain message.
    pub fn msg<M: Into<String>>(message: M) -> Self {
        Self(Arc::new(Message(message.into())))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let text = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self(Arc::new(Panicked(text)))
    }

    /// Attempt to view the underlying error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// True when the handler panicked rather than returning an error.
    pub fn is_panic(&self) -> bool {
        self.0.is::<Panicked>()
    }

    /// Whether both values wrap the very same error instance.
    pub fn ptr_eq(&self, other: &HandlerError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        HandlerError::new(error)
    }
}

/// Two handler errors are equal when they are the same instance.
impl PartialEq for HandlerError {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerError").field(&self.0).finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
struct Panicked(String);
