//! Side-effect dispatchers: file writes and action invocations.

mod error;
mod registry;
mod remote;
mod writer;

pub use error::{ActionError, RegistryError, WriteError};
pub use registry::{ActionHandler, CapabilityRegistry};
pub use remote::{register_remote_capabilities, RemoteAction};
pub use writer::{normalize_path, DryRunWriter, FileWriter, FsWriter};
