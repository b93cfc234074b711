//! Request dispatch: cache lookup, single-flight coordination, backend
//! invocation, and per-request measurement.

mod builder;
mod dispatcher;

pub use builder::{Mimir, MimirBuilder};
pub use dispatcher::Dispatcher;
