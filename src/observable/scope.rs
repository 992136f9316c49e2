use tokio::runtime::Handle;

use super::{Observable, Observer, StreamSubscription, Termination};
use crate::{Result, executor::outside_executor};

/// An open scope over an [`Observable`] whose run is still pending.
///
/// Attach observers through the scope, then call [`finish`](Self::finish). If the
/// scope is dropped instead (early return, `?`, panic), the drop performs the
/// run: it is spawned on the current tokio runtime when there is one, and
/// otherwise driven to completion before the drop returns (on a helper thread
/// if the dropping thread is already inside a blocking executor). Either way
/// the observable runs exactly once per scope.
///
/// A run started by drop reports nothing back; outcomes still reach the
/// observers. Without a runtime, a source that needs tokio timers or IO must be
/// finished explicitly.
#[must_use = "the observable runs when the scope ends"]
pub struct ObservableScope<T: Send + 'static> {
    observable: Observable<T>,
    pending: bool,
}

impl<T: Send + 'static> ObservableScope<T> {
    pub(crate) fn new(observable: Observable<T>) -> Self {
        Self {
            observable,
            pending: true,
        }
    }

    pub fn subscribe(&self, observer: Observer<T>) -> StreamSubscription {
        self.observable.subscribe(observer)
    }

    /// Close the scope and run the observable in the calling task.
    pub async fn finish(mut self) -> Result<Termination> {
        self.pending = false;
        self.observable.run().await
    }
}

impl<T: Send + 'static> Drop for ObservableScope<T> {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        let observable = self.observable.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = observable.run().await {
                        tracing::debug!(error = %err, "scoped observable did not run");
                    }
                });
            }
            Err(_) => {
                let outcome =
                    outside_executor(move || futures_executor::block_on(observable.run()));
                if let Err(err) = outcome {
                    tracing::debug!(error = %err, "scoped observable did not run");
                }
            }
        }
    }
}
