//! Document collaborator seams.
//!
//! [`ScoreSource`] turns a score file into a [`ScoreDocument`] and, for every
//! variant, serializes the mutated [`Score`] back into the file's own format.
//! [`VariantSink`] persists such a snapshot as a temporary copy the renderer
//! can read. [`MsczContainer`] implements both for `.mscz` archives.

mod mscz;

pub use mscz::{MsczContainer, MsczVariantWriter};

use std::path::PathBuf;

use crate::error::Result;
use crate::score::{Score, ScoreDocument};

/// Serialized state of one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub score: Vec<u8>,
    /// Rewritten mixer settings, for files that keep them separately.
    pub mixer: Option<Vec<u8>>,
}

pub trait ScoreSource {
    fn document(&self) -> Result<ScoreDocument>;
    fn snapshot(&self, score: &Score) -> Result<Snapshot>;
}

pub trait VariantSink {
    /// Write the variant's temporary copy and return its path. `file_name`
    /// is unique within one plan, so each copy gets its own path.
    fn write_variant(&mut self, file_name: &str, snapshot: &Snapshot) -> Result<PathBuf>;
}
