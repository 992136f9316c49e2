use std::{future::Future, sync::Arc};

use futures_util::{FutureExt, future::BoxFuture};

use crate::{Emission, HandlerError};

pub(crate) type EntryFn<R> = Arc<dyn Fn(&Emission) -> Result<R, HandlerError> + Send + Sync>;
pub(crate) type AsyncEntryFn<R> =
    Arc<dyn Fn(Arc<Emission>) -> BoxFuture<'static, Result<R, HandlerError>> + Send + Sync>;
pub(crate) type SuccessFn<R> = Arc<dyn Fn(R) -> Result<(), HandlerError> + Send + Sync>;
pub(crate) type FailureFn = Arc<dyn Fn(HandlerError) -> Result<(), HandlerError> + Send + Sync>;

pub(crate) enum Entry<R> {
    Blocking(EntryFn<R>),
    Async(AsyncEntryFn<R>),
}

impl<R> Clone for Entry<R> {
    fn clone(&self) -> Self {
        match self {
            Entry::Blocking(f) => Entry::Blocking(f.clone()),
            Entry::Async(f) => Entry::Async(f.clone()),
        }
    }
}

/// The callbacks and flags of one subscription.
///
/// - `entry`: runs for every matching emission. Its `Ok` value feeds `on_success`.
/// - `on_success`: continuation for a successful entry.
/// - `on_failure`: receives the error of a failed entry (or a failed `on_success`).
/// - `once`: the subscriber is removed as soon as one emission matches it.
/// - `force_offload`: the entry always runs off the cooperative scheduler.
///
/// When an error has no `on_failure` to go to, it is written to the debug trace
/// and dropped. Emitting never reports handler errors to the emitting code.
///
/// # Examples
///
/// ```rust
/// use fanout::{HandlerError, Workflow};
///
/// let workflow = Workflow::new(|emission| Ok(emission.arg::<u32>(0).copied().unwrap_or(0)))
///     .on_success(|total| {
///         println!("total = {total}");
///         Ok(())
///     })
///     .on_failure(|err: HandlerError| {
///         eprintln!("failed: {err}");
///         Ok(())
///     })
///     .once();
/// assert!(workflow.is_once());
/// ```
pub struct Workflow<R> {
    pub(crate) entry: Entry<R>,
    pub(crate) success: Option<SuccessFn<R>>,
    pub(crate) failure: Option<FailureFn>,
    pub(crate) once: bool,
    pub(crate) force_offload: bool,
    pub(crate) label: Option<Arc<str>>,
}

impl<R: Send + 'static> Workflow<R> {
    /// Workflow with a synchronous entry callback.
    pub fn new<F>(entry: F) -> Self
    where
        F: Fn(&Emission) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        Self::from_entry(Entry::Blocking(Arc::new(entry)))
    }

    /// Workflow with an asynchronous entry callback.
    ///
    /// The future may suspend; under a cooperative executor it interleaves with
    /// the other handlers of the same emission at its `.await` points.
    pub fn new_async<F, Fut>(entry: F) -> Self
    where
        F: Fn(Arc<Emission>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        Self::from_entry(Entry::Async(Arc::new(move |emission| entry(emission).boxed())))
    }

    pub(crate) fn from_entry(entry: Entry<R>) -> Self {
        Self {
            entry,
            success: None,
            failure: None,
            once: false,
            force_offload: false,
            label: None,
        }
    }

    pub fn on_success<F>(mut self, success: F) -> Self
    where
        F: Fn(R) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.success = Some(Arc::new(success));
        self
    }

    pub fn on_failure<F>(mut self, failure: F) -> Self
    where
        F: Fn(HandlerError) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.failure = Some(Arc::new(failure));
        self
    }

    /// Remove the subscriber after the first emission that matches it.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Run the entry on a blocking thread even under a cooperative executor.
    ///
    /// Use it for entries that block (sync IO, heavy computation), so they don't
    /// stall sibling handlers scheduled on the same runtime threads.
    pub fn force_offload(mut self) -> Self {
        self.force_offload = true;
        self
    }

    /// Name shown in debug traces and [`Subscriber::label`](crate::Subscriber::label).
    pub fn label<N: Into<Arc<str>>>(mut self, label: N) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    pub fn is_force_offload(&self) -> bool {
        self.force_offload
    }

    pub fn has_success(&self) -> bool {
        self.success.is_some()
    }

    pub fn has_failure(&self) -> bool {
        self.failure.is_some()
    }
}

impl<R> std::fmt::Debug for Workflow<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("label", &self.label)
            .field(
                "entry",
                &match self.entry {
                    Entry::Blocking(_) => "blocking",
                    Entry::Async(_) => "async",
                },
            )
            .field("success", &self.success.is_some())
            .field("failure", &self.failure.is_some())
            .field("once", &self.once)
            .field("force_offload", &self.force_offload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let workflow = Workflow::new(|_| Ok(()));
        assert!(!workflow.is_once());
        assert!(!workflow.is_force_offload());
        assert!(!workflow.has_success());
        assert!(!workflow.has_failure());
        assert!(matches!(workflow.entry, Entry::Blocking(_)));
    }

    #[test]
    fn test_builder_flags() {
        let workflow = Workflow::new_async(|_| async { Ok(1u8) })
            .on_success(|_| Ok(()))
            .on_failure(|_| Ok(()))
            .once()
            .force_offload()
            .label("audit");
        assert!(workflow.is_once());
        assert!(workflow.is_force_offload());
        assert!(workflow.has_success());
        assert!(workflow.has_failure());
        assert!(matches!(workflow.entry, Entry::Async(_)));
        assert!(format!("{workflow:?}").contains("audit"));
    }
}
