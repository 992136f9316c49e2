use std::sync::Arc;

use crate::{EmissionId, EventKey, HandlerError, SubscriberId};

/// Which callback of a workflow an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Entry,
    Success,
    Failure,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Entry => "entry",
            Stage::Success => "success",
            Stage::Failure => "failure",
        }
    }
}

/// Debug trace of one registry namespace (or one emitter).
///
/// When no explicit override is set, tracing follows whatever the installed
/// `tracing` subscriber wants at DEBUG level for this crate.
#[derive(Debug, Clone)]
pub(crate) struct Tracer {
    namespace: Arc<str>,
    debug: Option<bool>,
}

impl Tracer {
    pub fn new(namespace: Arc<str>, debug: Option<bool>) -> Self {
        Self { namespace, debug }
    }

    /// Same namespace, with `debug` taking precedence when set.
    pub fn with_override(&self, debug: Option<bool>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            debug: debug.or(self.debug),
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.debug
            .unwrap_or_else(|| tracing::enabled!(tracing::Level::DEBUG))
    }

    pub fn subscribed(&self, subscriber: SubscriberId, keys: &[EventKey], once: bool) {
        if self.enabled() {
            tracing::debug!(
                namespace = %self.namespace,
                %subscriber,
                keys = ?keys,
                once,
                "subscribed"
            );
        }
    }

    pub fn unsubscribed(&self, subscriber: SubscriberId, reason: &'static str) {
        if self.enabled() {
            tracing::debug!(namespace = %self.namespace, %subscriber, reason, "unsubscribed");
        }
    }

    pub fn unlinked(&self, subscriber: SubscriberId, key: &EventKey) {
        if self.enabled() {
            tracing::debug!(namespace = %self.namespace, %subscriber, %key, "key unlinked");
        }
    }

    pub fn emitted(&self, key: &EventKey, emission: EmissionId, matched: usize) {
        if self.enabled() {
            tracing::debug!(
                namespace = %self.namespace,
                %key,
                emission,
                matched,
                "emitted"
            );
        }
    }

    pub fn dispatched(&self, subscriber: SubscriberId, emission: EmissionId) {
        if self.enabled() {
            tracing::debug!(
                namespace = %self.namespace,
                %subscriber,
                emission,
                "dispatched"
            );
        }
    }

    /// An error nobody is going to see otherwise.
    pub fn swallowed(&self, subscriber: SubscriberId, stage: Stage, error: &HandlerError) {
        if self.enabled() {
            tracing::debug!(
                namespace = %self.namespace,
                %subscriber,
                stage = stage.as_str(),
                %error,
                "handler error discarded"
            );
        } else {
            tracing::trace!(
                namespace = %self.namespace,
                %subscriber,
                stage = stage.as_str(),
                %error,
                "handler error discarded"
            );
        }
    }

    pub fn panicked(&self, subscriber: SubscriberId, stage: Stage, error: &HandlerError) {
        tracing::error!(
            namespace = %self.namespace,
            %subscriber,
            stage = stage.as_str(),
            %error,
            "handler panicked"
        );
    }
}

/// Runs `f` with a fmt subscriber installed on this thread and returns what it logged.
#[cfg(test)]
pub(crate) fn captured(f: impl FnOnce()) -> String {
    use std::{io, sync::Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::TRACE)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
