use std::collections::{HashMap, HashSet};

use crate::{Error, EventKey, Result, Subscriber, SubscriberId};

/// Bidirectional subscriber index.
///
/// `by_key` keeps subscribers of each key in registration order, and never holds
/// an empty list. `by_subscriber` holds exactly the subscribers that appear in at
/// least one `by_key` list, together with the keys they appear under.
#[derive(Debug, Default)]
pub(crate) struct Index {
    by_key: HashMap<EventKey, Vec<Subscriber>>,
    by_subscriber: HashMap<SubscriberId, Vec<EventKey>>,
}

impl Index {
    /// Fails if adding one subscriber to any of `keys` would exceed `limit`.
    pub fn check_capacity(&self, keys: &[EventKey], limit: Option<usize>) -> Result<()> {
        let Some(limit) = limit else {
            return Ok(());
        };
        match keys.iter().find(|key| self.count(key) >= limit) {
            Some(key) => Err(Error::LimitExceeded {
                key: key.clone(),
                limit,
            }),
            None => Ok(()),
        }
    }

    pub fn insert(&mut self, subscriber: &Subscriber, keys: &[EventKey]) {
        let linked = self.by_subscriber.entry(subscriber.id()).or_default();
        for key in keys {
            if linked.contains(key) {
                continue;
            }
            linked.push(key.clone());
            self.by_key
                .entry(key.clone())
                .or_default()
                .push(subscriber.clone());
        }
    }

    /// Unlink a subscriber from every key. Returns `false` if it wasn't linked.
    pub fn remove_subscriber(&mut self, id: SubscriberId) -> bool {
        let Some(keys) = self.by_subscriber.remove(&id) else {
            return false;
        };
        for key in keys {
            self.detach(&key, id);
        }
        true
    }

    /// Unlink one key from a subscriber, dropping the subscriber with its last key.
    pub fn remove_link(&mut self, key: &EventKey, id: SubscriberId) -> bool {
        let Some(keys) = self.by_subscriber.get_mut(&id) else {
            return false;
        };
        let Some(pos) = keys.iter().position(|k| k == key) else {
            return false;
        };
        keys.remove(pos);
        if keys.is_empty() {
            self.by_subscriber.remove(&id);
        }
        self.detach(key, id);
        true
    }

    /// Drop a key and all its links. Returns the ids that lost their last key.
    pub fn remove_key(&mut self, key: &EventKey) -> (usize, Vec<SubscriberId>) {
        let Some(subscribers) = self.by_key.remove(key) else {
            return (0, Vec::new());
        };
        let mut orphaned = Vec::new();
        for subscriber in &subscribers {
            let id = subscriber.id();
            if let Some(keys) = self.by_subscriber.get_mut(&id) {
                keys.retain(|k| k != key);
                if keys.is_empty() {
                    self.by_subscriber.remove(&id);
                    orphaned.push(id);
                }
            }
        }
        (subscribers.len(), orphaned)
    }

    /// Drop everything. Returns the number of links removed and the ids that
    /// were registered.
    pub fn clear(&mut self) -> (usize, Vec<SubscriberId>) {
        let links = self.by_key.values().map(Vec::len).sum();
        self.by_key.clear();
        let ids = self.by_subscriber.drain().map(|(id, _)| id).collect();
        (links, ids)
    }

    /// Subscribers matching an emitted key, in resolution order:
    /// exact match (or nearest ancestor with subscribers, for kinds), then wildcard.
    pub fn resolve(&self, key: &EventKey) -> Vec<Subscriber> {
        let direct = match key {
            EventKey::Kind(kind) => kind
                .lineage()
                .find_map(|k| self.by_key.get(&EventKey::Kind(k))),
            other => self.by_key.get(other),
        };
        let wildcard = if key.is_wildcard() {
            None
        } else {
            self.by_key.get(&EventKey::Any)
        };

        let mut seen = HashSet::new();
        direct
            .into_iter()
            .chain(wildcard)
            .flatten()
            .filter(|s| seen.insert(s.id()))
            .cloned()
            .collect()
    }

    pub fn is_linked(&self, key: &EventKey, id: SubscriberId) -> bool {
        self.by_subscriber
            .get(&id)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn is_empty(&self) -> bool {
        self.by_subscriber.is_empty()
    }

    /// Number of distinct subscribers.
    pub fn len(&self) -> usize {
        self.by_subscriber.len()
    }

    pub fn count(&self, key: &EventKey) -> usize {
        self.by_key.get(key).map_or(0, Vec::len)
    }

    pub fn keys(&self) -> Vec<EventKey> {
        self.by_key.keys().cloned().collect()
    }

    pub fn keys_of(&self, id: SubscriberId) -> Vec<EventKey> {
        self.by_subscriber.get(&id).cloned().unwrap_or_default()
    }

    fn detach(&mut self, key: &EventKey, id: SubscriberId) {
        if let Some(subscribers) = self.by_key.get_mut(key) {
            subscribers.retain(|s| s.id() != id);
            if subscribers.is_empty() {
                self.by_key.remove(key);
            }
        }
    }
}
