use std::{any::Any, collections::BTreeMap, fmt, sync::Arc};

use crate::{DynEvent, Event, EventKey, Meta, Subscriber};

/// A single payload value. Shared, type-erased and safe to move across threads.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Positional and named payload of an emission.
///
/// Values are type-erased; handlers read them back with [`Args::get`] and
/// [`Args::named`], which return `None` on a missing slot or a type mismatch.
///
/// ```rust
/// use fanout::{Args, args};
///
/// let payload = args!["alice", 42u32].with_named("retries", 3u8);
/// assert_eq!(payload.get::<&str>(0), Some(&"alice"));
/// assert_eq!(payload.get::<u32>(1), Some(&42));
/// assert_eq!(payload.named::<u8>("retries"), Some(&3));
/// assert_eq!(payload.get::<u64>(1), None);
/// ```
#[derive(Clone, Default)]
pub struct Args {
    positional: Vec<Value>,
    named: BTreeMap<Arc<str>, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    pub fn with<V: Any + Send + Sync>(mut self, value: V) -> Self {
        self.positional.push(Arc::new(value));
        self
    }

    pub fn with_named<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<Arc<str>>,
        V: Any + Send + Sync,
    {
        self.named.insert(name.into(), Arc::new(value));
        self
    }

    pub fn push_value(&mut self, value: Value) {
        self.positional.push(value);
    }

    pub(crate) fn prepend_value(&mut self, value: Value) {
        self.positional.insert(0, value);
    }

    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.positional.get(index)?.downcast_ref::<T>()
    }

    pub fn named<T: Any>(&self, name: &str) -> Option<&T> {
        self.named.get(name)?.downcast_ref::<T>()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(|k| k.as_ref())
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Args::new()
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("positional", &self.positional.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Build [`Args`] from a list of positional values.
#[macro_export]
macro_rules! args {
    () => { $crate::Args::new() };
    ($($value:expr),+ $(,)?) => { $crate::Args::new()$(.with($value))+ };
}

/// Immutable unit of one `emit` call.
///
/// Holds the emitted key, the payload and the snapshot of subscribers that was
/// taken when the emission was resolved. Every bound invocation of the emission
/// shares the same instance.
///
/// For emissions of an [`Event`] the emitted instance is available through
/// [`Emission::event`] and is also the first positional argument.
pub struct Emission {
    meta: Meta,
    key: EventKey,
    args: Args,
    event: Option<Arc<dyn DynEvent>>,
    subscribers: Vec<Subscriber>,
}

impl Emission {
    pub(crate) fn new(key: EventKey, args: Args, subscribers: Vec<Subscriber>) -> Self {
        Self {
            meta: Meta::new(),
            key,
            args,
            event: None,
            subscribers,
        }
    }

    pub(crate) fn with_event<E: Event>(
        event: E,
        mut args: Args,
        subscribers: Vec<Subscriber>,
    ) -> Self {
        let event = Arc::new(event);
        let key = EventKey::Kind(event.kind());
        args.prepend_value(event.clone());
        Self {
            meta: Meta::new(),
            key,
            args,
            event: Some(event),
            subscribers,
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The key the emission was made with (not the key a subscriber matched on).
    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Shorthand for `self.args().get(index)`.
    pub fn arg<T: Any>(&self, index: usize) -> Option<&T> {
        self.args.get(index)
    }

    /// Shorthand for `self.args().named(name)`.
    pub fn named<T: Any>(&self, name: &str) -> Option<&T> {
        self.args.named(name)
    }

    /// The emitted event instance, for emissions made with an event value.
    pub fn event(&self) -> Option<&Arc<dyn DynEvent>> {
        self.event.as_ref()
    }

    /// The emitted event as its concrete type.
    pub fn event_as<E: Event>(&self) -> Option<&E> {
        self.event.as_deref()?.downcast_ref::<E>()
    }

    /// Subscribers this emission was dispatched to, in dispatch order.
    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }
}

impl fmt::Debug for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emission")
            .field("meta", &self.meta)
            .field("key", &self.key)
            .field("args", &self.args)
            .field("event", &self.event)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Greeting(&'static str);
    impl Event for Greeting {}

    #[test]
    fn test_args_macro() {
        let args = args![1u8, "two"];
        assert_eq!(args.len(), 2);
        assert_eq!(args.get::<u8>(0), Some(&1));
        assert_eq!(args.get::<&str>(1), Some(&"two"));
        assert!(args![].is_empty());
    }

    #[test]
    fn test_named_args() {
        let args = Args::new().with_named("user", String::from("bob"));
        assert_eq!(args.named::<String>("user").map(String::as_str), Some("bob"));
        assert!(args.named::<String>("missing").is_none());
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["user"]);
        assert!(!args.is_empty());
        assert_eq!(args.len(), 0);
    }

    #[test]
    fn test_event_is_first_positional_argument() {
        let emission = Emission::with_event(Greeting("hi"), args![7i32], Vec::new());
        assert_eq!(emission.key(), &EventKey::of::<Greeting>());
        assert_eq!(emission.arg::<Greeting>(0), Some(&Greeting("hi")));
        assert_eq!(emission.arg::<i32>(1), Some(&7));
        assert_eq!(emission.event_as::<Greeting>(), Some(&Greeting("hi")));
    }

    #[test]
    fn test_plain_emission_has_no_event() {
        let emission = Emission::new(EventKey::from("Greet"), Args::new(), Vec::new());
        assert!(emission.event().is_none());
        assert!(emission.event_as::<Greeting>().is_none());
        assert!(emission.subscribers().is_empty());
    }
}
