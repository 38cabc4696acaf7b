//! Plugin system
//!
//! Plugins are search providers registered by the host at startup. Each one
//! exposes static metadata, a fast query and an optional delayed query.

mod registry;
mod traits;

pub mod catalog;

pub use registry::{PluginRegistry, RegisteredPlugin};
pub use traits::*;
