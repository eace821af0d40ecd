//! Fatal error type for reading and rewriting score files.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoreError>;

/// Any of these aborts the whole run before a single task is dispatched.
/// Failures reading the input score are all `Malformed`; the other
/// variants come from writing temp copies.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("mixer settings error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed score: {0}")]
    Malformed(String),
}

impl ScoreError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ScoreError::Malformed(msg.into())
    }
}
