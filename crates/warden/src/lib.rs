//! Warden - named long-running subprocess management
//!
//! Wraps shell commands in [`ManagedProcess`] instances whose combined
//! stdout/stderr is continuously drained into a line buffer by a dedicated
//! reader, and tracks them by caller-chosen name in a [`ProcessRegistry`].
//! Registry operations report human-readable status strings so they can be
//! relayed verbatim to a tool-calling agent.

mod managed;
mod registry;
mod shell;

pub use managed::ManagedProcess;
pub use registry::ProcessRegistry;

// Re-export core types
pub use warden_core::{
    DEFAULT_OUTPUT_TIMEOUT_MS, RegistryConfig, RegistryConfigBuilder, Result, WardenError,
};
