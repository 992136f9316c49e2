use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    Emission, EventKey, Registry, Workflow,
    executor::{Executor, Job},
    internal::{Invocation, Invoke},
    registry::RegistryShared,
    trace::Tracer,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered workflow.
///
/// Returned by [`Registry::subscribe`]. Handles are cheap to clone; all clones
/// refer to the same subscription. The registry decides the subscriber's
/// lifetime: the handle only keeps a weak link back to it, so holding a handle
/// neither keeps the registry alive nor keeps the subscription registered.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

struct SubscriberInner {
    id: SubscriberId,
    label: Option<Arc<str>>,
    once: bool,
    force_offload: bool,
    has_success: bool,
    has_failure: bool,
    invoke: Box<dyn Invoke>,
    registry: Weak<RegistryShared>,
}

impl Subscriber {
    pub(crate) fn new<R: Send + 'static>(
        workflow: Workflow<R>,
        registry: Weak<RegistryShared>,
    ) -> Self {
        let inner = SubscriberInner {
            id: SubscriberId::next(),
            label: workflow.label.clone(),
            once: workflow.once,
            force_offload: workflow.force_offload,
            has_success: workflow.success.is_some(),
            has_failure: workflow.failure.is_some(),
            invoke: Box::new(Invocation::from(workflow)),
            registry,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    #[inline]
    pub fn is_once(&self) -> bool {
        self.inner.once
    }

    #[inline]
    pub fn is_force_offload(&self) -> bool {
        self.inner.force_offload
    }

    pub fn has_success(&self) -> bool {
        self.inner.has_success
    }

    pub fn has_failure(&self) -> bool {
        self.inner.has_failure
    }

    /// The registry this subscriber was created by, if it still exists.
    pub fn registry(&self) -> Option<Registry> {
        self.inner.registry.upgrade().map(Registry::from_shared)
    }

    /// Remove this subscriber from every key it's linked to.
    ///
    /// Returns `false` if it was already removed or the registry is gone.
    pub fn unsubscribe(&self) -> bool {
        self.registry()
            .map(|registry| registry.unsubscribe(self))
            .unwrap_or(false)
    }

    /// Whether the subscriber is still linked to at least one key.
    pub fn is_subscribed(&self) -> bool {
        self.registry()
            .map(|registry| !registry.keys_of(self).is_empty())
            .unwrap_or(false)
    }

    /// Keys the subscriber is currently linked to.
    pub fn keys(&self) -> Vec<EventKey> {
        self.registry()
            .map(|registry| registry.keys_of(self))
            .unwrap_or_default()
    }

    /// Build the bound invocation of this subscriber for one emission.
    pub(crate) fn bind(
        &self,
        emission: Arc<Emission>,
        executor: Arc<dyn Executor>,
        tracer: Tracer,
    ) -> Job {
        self.inner
            .invoke
            .bind(emission, executor, tracer, self.inner.id, self.inner.force_offload)
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Subscriber {}

impl Hash for Subscriber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("once", &self.inner.once)
            .field("force_offload", &self.inner.force_offload)
            .finish()
    }
}

impl fmt::Display for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.label {
            Some(label) => write!(f, "{label}{}", self.inner.id),
            None => write!(f, "{}", self.inner.id),
        }
    }
}
