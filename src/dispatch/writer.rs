//! Path-normalizing file writer for completed file blocks.

use std::path::PathBuf;

use async_trait::async_trait;

use super::WriteError;
use crate::config::OutputConfig;

/// Destination for completed file blocks.
#[async_trait]
pub trait FileWriter: Send + Sync {
    /// Normalize a path as written by the model into the path that will be
    /// written and reported.
    ///
    /// # Errors
    ///
    /// Returns `WriteError::InvalidPath` if the path cannot be written.
    fn resolve(&self, path: &str) -> Result<String, WriteError>;

    /// Write `content` to a path previously returned by [`FileWriter::resolve`].
    ///
    /// # Errors
    ///
    /// Returns `WriteError::Io` if the write fails.
    async fn write(&self, path: &str, content: &str) -> Result<(), WriteError>;
}

/// Normalize `path` under `source_root`.
///
/// Leading `./` and `/` are dropped, backslashes become `/`, and a path not
/// already under `source_root` is prefixed with it.
///
/// # Errors
///
/// Returns `WriteError::InvalidPath` for empty paths and paths with `..`.
pub fn normalize_path(path: &str, source_root: &str) -> Result<String, WriteError> {
    let unified = path.trim().replace('\\', "/");
    let mut components = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => return Err(WriteError::InvalidPath(path.to_string())),
            other => components.push(other),
        }
    }
    if components.is_empty() {
        return Err(WriteError::InvalidPath(path.to_string()));
    }

    let root: Vec<&str> = source_root
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if components.starts_with(&root) {
        return Ok(components.join("/"));
    }

    let mut prefixed = root;
    prefixed.extend(components);
    Ok(prefixed.join("/"))
}

/// Writes files beneath a project directory, creating directories as needed.
#[derive(Debug, Clone)]
pub struct FsWriter {
    project_dir: PathBuf,
    source_root: String,
}

impl FsWriter {
    /// Create a writer rooted at `project_dir`.
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>, source_root: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            source_root: source_root.into(),
        }
    }

    /// Create a writer from output configuration.
    #[must_use]
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.project_dir, &config.source_root)
    }
}

#[async_trait]
impl FileWriter for FsWriter {
    fn resolve(&self, path: &str) -> Result<String, WriteError> {
        normalize_path(path, &self.source_root)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), WriteError> {
        let full_path = self.project_dir.join(path);
        let io_error = |source| WriteError::Io {
            path: full_path.clone(),
            source,
        };

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&full_path, content)
            .await
            .map_err(io_error)?;

        tracing::info!(path = %full_path.display(), bytes = content.len(), "Wrote file");
        Ok(())
    }
}

/// Resolves paths like [`FsWriter`] but writes nothing.
#[derive(Debug, Clone)]
pub struct DryRunWriter {
    source_root: String,
}

impl DryRunWriter {
    #[must_use]
    pub fn new(source_root: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }
}

#[async_trait]
impl FileWriter for DryRunWriter {
    fn resolve(&self, path: &str) -> Result<String, WriteError> {
        normalize_path(path, &self.source_root)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), WriteError> {
        tracing::info!(path, bytes = content.len(), "Dry run, skipping write");
        Ok(())
    }
}
