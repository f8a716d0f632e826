//! Side-effect error types.

use std::path::PathBuf;

/// Errors from materializing a file block.
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// Path is empty or escapes the project directory.
    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    /// Writing to disk failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from invoking an action.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The payload is not a JSON array of arguments.
    #[error("Malformed action payload: {0}")]
    MalformedPayload(String),

    /// No handler is registered for the pair.
    #[error("Unsupported operation: {module}.{action}")]
    Unsupported { module: String, action: String },

    /// Wrong number of positional arguments.
    #[error("Expected {expected} arguments, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// The handler reported a failure.
    #[error("Action failed: {0}")]
    Failed(String),

    /// The remote data layer rejected or failed the call.
    #[error("Remote call failed: {0}")]
    Remote(String),
}

/// Errors from registering a capability.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Module or action name is not a valid identifier.
    #[error("Invalid capability name: {0:?}")]
    InvalidName(String),

    /// The pair was already registered.
    #[error("Capability already registered: {module}.{action}")]
    Duplicate { module: String, action: String },

    /// The HTTP client for remote capabilities could not be built.
    #[error("Failed to build remote client: {0}")]
    Client(String),
}
