//! Aggregate outcome of one generation.

use serde::{Deserialize, Serialize};

/// Files written and errors collected over one generation.
///
/// Both lists are append-only; the aggregate is returned once by
/// `StreamProcessor::finalize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Normalized paths of files written, in completion order.
    pub files_written: Vec<String>,
    /// Formatted errors from failed writes and actions.
    pub errors: Vec<String>,
    /// Number of files written.
    pub total_files: usize,
}

impl GenerationResult {
    pub(crate) fn record_file(&mut self, path: &str) {
        self.files_written.push(path.to_string());
        self.total_files = self.files_written.len();
    }

    pub(crate) fn record_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Whether any side effect failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
