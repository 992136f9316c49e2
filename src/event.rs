use std::{
    any::{Any, TypeId},
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
};

/// Upper bound on hierarchy depth, so a cyclic `parent_kind` can't spin forever.
const MAX_LINEAGE_DEPTH: usize = 64;

/// A structured payload that can be emitted under its own type key.
///
/// Events must be `Send + Sync + 'static` because the emitted instance is shared
/// (behind an `Arc`) by every subscriber of an emission, and those subscribers may
/// run on other threads.
///
/// # Hierarchy
///
/// Rust has no subclassing, so the type hierarchy is declared explicitly via
/// [`Event::parent_kind`]. An emitted kind reaches the subscribers of the kind
/// itself or, when it has none, those of its nearest ancestor that has any.
/// Only that one level matches: with subscribers on both `IoFailure` and
/// `Failure`, a `DiskFull` emission reaches the `IoFailure` ones only.
///
/// ```rust,ignore
/// #[derive(Debug, Event)]
/// struct IoFailure;
///
/// #[derive(Debug, Event)]
/// #[event(extends = IoFailure)]
/// struct DiskFull;
/// ```
///
/// # Event Names
///
/// `name()` returns a human-readable name used in debug traces. The default
/// implementation returns the full type name via `std::any::type_name`. When using
/// `#[derive(Event)]` on an enum, `name()` returns the variant name.
pub trait Event: Any + Send + Sync + fmt::Debug {
    /// The direct parent in the event hierarchy, if any.
    ///
    /// Emissions of this kind fall through to the parent's subscribers only
    /// when no subscriber is registered on this kind itself, and so on upward.
    fn parent_kind() -> Option<Kind>
    where
        Self: Sized,
    {
        None
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Object-safe view of an [`Event`], as stored inside an emission.
pub trait DynEvent: Any + Send + Sync + fmt::Debug {
    fn kind(&self) -> Kind;
    fn event_name(&self) -> Cow<'static, str>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Event> DynEvent for T {
    fn kind(&self) -> Kind {
        Kind::of::<T>()
    }

    fn event_name(&self) -> Cow<'static, str> {
        self.name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DynEvent {
    /// Downcast to the concrete event type.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether the concrete type is `kind` or descends from it.
    pub fn is_a(&self, kind: &Kind) -> bool {
        self.kind().is_a(kind)
    }
}

/// Runtime descriptor of an [`Event`] type, including its link to the parent kind.
///
/// Two kinds are equal when they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct Kind {
    id: TypeId,
    name: &'static str,
    parent: fn() -> Option<Kind>,
}

impl Kind {
    pub fn of<T: Event>() -> Kind {
        Kind {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            parent: <T as Event>::parent_kind,
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Full type name, as given by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<Kind> {
        (self.parent)()
    }

    /// This kind followed by its ancestors, nearest first.
    pub fn lineage(&self) -> Lineage {
        Lineage {
            next: Some(*self),
            depth: 0,
        }
    }

    /// Whether `self` is `ancestor` or one of its descendants.
    pub fn is_a(&self, ancestor: &Kind) -> bool {
        self.lineage().any(|k| k == *ancestor)
    }

    /// Number of steps from `self` up to `ancestor`, if it is one.
    pub fn distance_to(&self, ancestor: &Kind) -> Option<usize> {
        self.lineage().position(|k| k == *ancestor)
    }
}

impl PartialEq for Kind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Kind {}

impl Hash for Kind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Kind").field(&self.name).finish()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a kind and its ancestors. See [`Kind::lineage`].
pub struct Lineage {
    next: Option<Kind>,
    depth: usize,
}

impl Iterator for Lineage {
    type Item = Kind;

    fn next(&mut self) -> Option<Kind> {
        if self.depth >= MAX_LINEAGE_DEPTH {
            return None;
        }
        let current = self.next.take()?;
        self.depth += 1;
        self.next = current.parent();
        Some(current)
    }
}
