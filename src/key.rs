use std::{fmt, sync::Arc};

use crate::{Event, Kind};

/// What an emission is matched against.
///
/// - `Name`: an opaque string, matched by equality.
/// - `Kind`: an [`Event`] type. Emitting a kind matches subscribers registered on the
///   kind itself or, failing that, on its nearest ancestor that has subscribers.
/// - `Any`: the global wildcard. Subscribers on `Any` receive every emission.
///
/// Keys convert from `&str`, `String` and [`Kind`], so most call sites can pass
/// those directly:
///
/// ```rust
/// use fanout::EventKey;
///
/// let key: EventKey = "Greet".into();
/// assert_eq!(key, EventKey::name("Greet"));
/// assert!(EventKey::Any.is_wildcard());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Name(Arc<str>),
    /// Matched against the emitted kind, then its ancestors one level at a
    /// time. The first level with subscribers is the only one that matches, so
    /// a base-kind subscriber misses a derived emission whenever a nearer
    /// kind in the lineage has subscribers of its own.
    Kind(Kind),
    Any,
}

impl EventKey {
    pub fn name<N: Into<Arc<str>>>(name: N) -> Self {
        EventKey::Name(name.into())
    }

    /// Key for the event type `T`.
    pub fn of<T: Event>() -> Self {
        EventKey::Kind(Kind::of::<T>())
    }

    #[inline]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, EventKey::Any)
    }

    pub fn as_kind(&self) -> Option<&Kind> {
        match self {
            EventKey::Kind(kind) => Some(kind),
            _ => None,
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        EventKey::Name(Arc::from(name))
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        EventKey::Name(Arc::from(name))
    }
}

impl From<Arc<str>> for EventKey {
    fn from(name: Arc<str>) -> Self {
        EventKey::Name(name)
    }
}

impl From<Kind> for EventKey {
    fn from(kind: Kind) -> Self {
        EventKey::Kind(kind)
    }
}

impl From<&EventKey> for EventKey {
    fn from(key: &EventKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Name(name) => f.write_str(name),
            EventKey::Kind(kind) => write!(f, "<{kind}>"),
            EventKey::Any => f.write_str("*"),
        }
    }
}
