//! Query dispatch module
//!
//! Runs routed queries against plugins in two waves, supersedes stale
//! rounds and feeds the result aggregator.

mod dispatcher;
mod session;

pub use dispatcher::{DispatchHandle, DispatchOptions, DispatchOutcome, Dispatcher};
pub use session::{DispatchState, QuerySession};
