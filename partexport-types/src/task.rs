use std::path::PathBuf;

use serde::Serialize;

/// One fully specified export: a label for reporting, the renderer command
/// line, and the temporary copy to delete once the renderer returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub label: String,
    pub command: String,
    /// `None` for tasks that render the original input directly.
    pub cleanup_path: Option<PathBuf>,
}

impl Task {
    pub fn new(label: impl Into<String>, command: impl Into<String>, cleanup_path: Option<PathBuf>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            cleanup_path,
        }
    }
}
