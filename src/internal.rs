mod index;
mod invocation;

pub(crate) use index::Index;
pub(crate) use invocation::{Invocation, Invoke};
