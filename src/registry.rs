use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    Error, EventKey, RegistryConfig, Result, Subscriber, SubscriptionContext, Workflow,
    context::EventScope, internal::Index, trace::Tracer,
};

/// The subscription registry: which subscribers listen to which keys.
///
/// A `Registry` is a cheap, cloneable handle; clones share the same state. Every
/// `Registry::new` creates an independent namespace, so separate parts of an
/// application can keep their subscriptions apart simply by holding different
/// registries.
///
/// - `subscribe(keys, workflow)`: register a [`Workflow`] under one or more keys.
/// - `unsubscribe(&subscriber)` / `remove(key, &subscriber)`: drop all / one link.
/// - `remove_key(key)` / `remove_all()`: bulk removal.
/// - `matching_subscribers(key, consume_once)`: what an emission of `key` reaches.
///
/// All operations are serialized by one lock. In particular, resolving the
/// subscribers of an emission and removing the `once` subscribers among them
/// happen under the same lock, so a `once` subscriber is handed to exactly one
/// emission even when several race.
///
/// See also: [`Emitter`](crate::Emitter), [`EventKey`].
#[derive(Clone)]
pub struct Registry {
    shared: Arc<RegistryShared>,
}

pub(crate) struct RegistryShared {
    config: RegistryConfig,
    tracer: Tracer,
    index: Mutex<Index>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        let tracer = Tracer::new(config.namespace_arc(), config.debug());
        Self {
            shared: Arc::new(RegistryShared {
                config,
                tracer,
                index: Mutex::new(Index::default()),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<RegistryShared>) -> Self {
        Self { shared }
    }

    /// Register `workflow` under every key in `keys`.
    ///
    /// Fails with [`Error::LimitExceeded`] if a per-key cap is configured and any
    /// of the keys is already full; in that case nothing is registered. Duplicate
    /// keys are collapsed.
    pub fn subscribe<K, R>(&self, keys: K, workflow: Workflow<R>) -> Result<Subscriber>
    where
        K: IntoIterator,
        K::Item: Into<EventKey>,
        R: Send + 'static,
    {
        let mut keys: Vec<EventKey> = keys.into_iter().map(Into::into).collect();
        dedup(&mut keys);
        if keys.is_empty() {
            return Err(Error::NoKeys);
        }

        let mut index = self.lock();
        index.check_capacity(&keys, self.shared.config.max_subscribers_per_key())?;
        let subscriber = Subscriber::new(workflow, Arc::downgrade(&self.shared));
        index.insert(&subscriber, &keys);
        drop(index);

        self.shared
            .tracer
            .subscribed(subscriber.id(), &keys, subscriber.is_once());
        Ok(subscriber)
    }

    /// Remove `subscriber` from every key. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscriber: &Subscriber) -> bool {
        let removed = self.lock().remove_subscriber(subscriber.id());
        if removed {
            self.shared.tracer.unsubscribed(subscriber.id(), "unsubscribe");
        }
        removed
    }

    /// Remove the link between `key` and `subscriber` only.
    ///
    /// The subscriber stays registered under its other keys; removing its last
    /// key unsubscribes it completely.
    pub fn remove<K: Into<EventKey>>(&self, key: K, subscriber: &Subscriber) -> bool {
        let key = key.into();
        let mut index = self.lock();
        let removed = index.remove_link(&key, subscriber.id());
        let orphaned = removed && index.keys_of(subscriber.id()).is_empty();
        drop(index);

        if removed {
            self.shared.tracer.unlinked(subscriber.id(), &key);
        }
        if orphaned {
            self.shared.tracer.unsubscribed(subscriber.id(), "last key removed");
        }
        removed
    }

    /// Remove every subscriber from `key`. Returns the number of links removed.
    pub fn remove_key<K: Into<EventKey>>(&self, key: K) -> usize {
        let key = key.into();
        let (removed, orphaned) = self.lock().remove_key(&key);
        for id in orphaned {
            self.shared.tracer.unsubscribed(id, "key removed");
        }
        removed
    }

    /// Remove everything. Returns the number of links removed.
    pub fn remove_all(&self) -> usize {
        let (removed, ids) = self.lock().clear();
        for id in ids {
            self.shared.tracer.unsubscribed(id, "registry cleared");
        }
        removed
    }

    /// Subscribers an emission of `key` reaches.
    ///
    /// The result is the union, in this order, of:
    /// 1. subscribers registered on exactly `key` (for a kind key, on the kind
    ///    itself or else on its nearest ancestor that has any subscribers);
    /// 2. wildcard subscribers.
    ///
    /// A subscriber appears at most once. With `consume_once`, every `once`
    /// subscriber in the result is removed from the registry before this returns.
    pub fn matching_subscribers<K: Into<EventKey>>(
        &self,
        key: K,
        consume_once: bool,
    ) -> Vec<Subscriber> {
        self.resolve(key.into(), consume_once, &self.shared.tracer)
    }

    /// [`matching_subscribers`](Self::matching_subscribers), reporting consumed
    /// `once` subscribers through `tracer`.
    pub(crate) fn resolve(
        &self,
        key: EventKey,
        consume_once: bool,
        tracer: &Tracer,
    ) -> Vec<Subscriber> {
        let mut index = self.lock();
        let matched = index.resolve(&key);
        let consumed: Vec<_> = if consume_once {
            matched
                .iter()
                .filter(|s| s.is_once() && index.remove_subscriber(s.id()))
                .map(Subscriber::id)
                .collect()
        } else {
            Vec::new()
        };
        drop(index);

        for id in consumed {
            tracer.unsubscribed(id, "once");
        }
        matched
    }

    /// Open a scoped builder for a subscription on `keys`.
    /// See [`SubscriptionContext`].
    pub fn context<K, R>(&self, keys: K) -> SubscriptionContext<EventScope<R>>
    where
        K: IntoIterator,
        K::Item: Into<EventKey>,
        R: Send + 'static,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        SubscriptionContext::new(EventScope::new(self.clone(), keys))
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `subscriber` is currently registered under `key`.
    pub fn are_linked<K: Into<EventKey>>(&self, key: K, subscriber: &Subscriber) -> bool {
        self.lock().is_linked(&key.into(), subscriber.id())
    }

    /// Number of distinct registered subscribers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn subscriber_count<K: Into<EventKey>>(&self, key: K) -> usize {
        self.lock().count(&key.into())
    }

    /// Keys that currently have at least one subscriber.
    pub fn keys(&self) -> Vec<EventKey> {
        self.lock().keys()
    }

    pub fn keys_of(&self, subscriber: &Subscriber) -> Vec<EventKey> {
        self.lock().keys_of(subscriber.id())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    pub fn namespace(&self) -> &str {
        self.shared.config.namespace()
    }

    pub(crate) fn tracer(&self) -> &Tracer {
        &self.shared.tracer
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        // No user code runs under this lock, so a poisoned index is still consistent.
        self.shared
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.shared.config)
            .field("subscribers", &self.len())
            .finish()
    }
}

fn dedup(keys: &mut Vec<EventKey>) {
    let mut unique = Vec::with_capacity(keys.len());
    for key in keys.drain(..) {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    *keys = unique;
}
