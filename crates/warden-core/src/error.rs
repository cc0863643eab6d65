use thiserror::Error;

/// Error types for managed-process operations.
///
/// Registry-level "expected" outcomes (a name already registered, a name not
/// found) are reported as status strings by the registry, not as errors; this
/// enum covers the failures that genuinely abort an operation.
#[derive(Debug, Error)]
pub enum WardenError {
    /// `start` was called on a process object that already has a live child.
    #[error("process is already running")]
    AlreadyRunning,

    /// The OS refused to create the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Pipe setup or child wait failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The output reader task terminated abnormally instead of joining.
    #[error("output reader task terminated abnormally")]
    ReaderPanicked,
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WardenError>;
