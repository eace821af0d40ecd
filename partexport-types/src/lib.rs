//! # partexport-types
//!
//! Shared type definitions for partexport.
//! These are plain data structures used by partexport-core and the CLI:
//! parts and their mixer controllers, the optional per-part mixer tracks of
//! newer score files, and the immutable export tasks handed to the dispatcher.

mod mixer;
mod part;
mod task;

pub use mixer::{volume_to_db, MixerTrack, Sound, VolumeMix};
pub use part::{
    Controller, FormatVersion, Part, PartKind, CTRL_BANK, CTRL_VOLUME, DEFAULT_BANK,
    DEFAULT_VOLUME, UNPARSED_CTRL,
};
pub use task::Task;
