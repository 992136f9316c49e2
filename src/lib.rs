//! Fanout: in-process subscriptions, event dispatch and cold multicast streams.
//!
//! - [`Registry`] keeps track of which [`Subscriber`]s listen to which [`EventKey`]s.
//! - [`Emitter`] publishes emissions and hands one job per matched subscriber to
//!   an [`Executor`](executor::Executor).
//! - [`Observable`] wraps a [`Source`] into a cold stream that many [`Observer`]s
//!   can watch.
//! - [`SubscriptionContext`] declares a subscription step by step and commits it
//!   in one go.
//!
//! Handler failures never come back to the emitting code: they go to the
//! workflow's `on_failure` callback or, without one, to the debug trace.
//!
//! ```rust
//! use fanout::{Emitter, Registry, Workflow, args};
//!
//! let registry = Registry::default();
//! registry.subscribe(
//!     ["Greet"],
//!     Workflow::new(|e| Ok(format!("hello {}", e.arg::<&str>(0).unwrap_or(&"world"))))
//!         .on_success(|greeting| {
//!             println!("{greeting}");
//!             Ok(())
//!         }),
//! )?;
//!
//! let emitter = Emitter::new(registry);
//! assert_eq!(emitter.emit("Greet", args!["alice"]), 1);
//! # Ok::<_, fanout::Error>(())
//! ```

extern crate self as fanout;

mod config;
mod context;
mod emission;
mod emitter;
mod error;
mod event;
mod key;
mod meta;
mod registry;
mod subscriber;
mod trace;
mod workflow;

pub(crate) mod internal;

pub mod executor;
pub mod observable;

pub use config::RegistryConfig;
pub use context::{Commit, EventScope, StreamScope, SubscriptionContext};
pub use emission::{Args, Emission, Value};
pub use emitter::{Emitter, EmitterBuilder};
pub use error::{Error, HandlerError, StreamError};
pub use event::{DynEvent, Event, Kind, Lineage};
pub use executor::{Executor, Inline, JobQueue, JobReceiver, TokioExecutor, WorkerPool};
pub use key::EventKey;
pub use meta::Meta;
pub use observable::{
    Observable, ObservableFactory, ObservableScope, Observer, Signal, Source, StreamSubscription,
    Termination, as_observable,
};
pub use registry::Registry;
pub use subscriber::{Subscriber, SubscriberId};
pub use workflow::Workflow;

#[cfg(feature = "macros")]
pub use fanout_macros::Event;

/// Identifier of one emission, shared by every invocation it triggers.
pub type EmissionId = u128;

pub type Result<T = ()> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::args;
    pub use crate::error::{Error as FanoutError, HandlerError};
    pub use crate::{Event, Kind};
    pub use crate::{
        Emission, Emitter, EventKey, Observable, Observer, Registry, Signal, Source, Subscriber,
        Workflow, as_observable,
    };
}
