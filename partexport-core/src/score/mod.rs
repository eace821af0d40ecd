//! Typed score model: classified parts with addressable mixer controllers.
//!
//! Built once per input document from the collaborator-provided
//! [`ScoreDocument`]. The planner mutates controller values and program
//! numbers in place; the set of parts and mixer tracks never changes.

mod classify;

pub use classify::VoiceRules;

use partexport_types::{
    volume_to_db, Controller, FormatVersion, MixerTrack, Part, Sound, VolumeMix, CTRL_VOLUME,
    DEFAULT_VOLUME,
};

use crate::error::{Result, ScoreError};

/// What the document collaborator hands over before any classification.
#[derive(Debug, Clone, Default)]
pub struct ScoreDocument {
    pub format_version: String,
    pub parts: Vec<RawPart>,
    /// Present only for newer files that keep a separate mixer.
    pub mixer_tracks: Option<Vec<MixerTrack>>,
}

#[derive(Debug, Clone, Default)]
pub struct RawPart {
    pub declared_id: Option<String>,
    pub long_name: String,
    pub instrument_id: String,
    pub controllers: Vec<Controller>,
    pub program: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    version: FormatVersion,
    parts: Vec<Part>,
    mixer_tracks: Option<Vec<MixerTrack>>,
}

impl Score {
    pub fn build(doc: ScoreDocument, rules: &VoiceRules) -> Result<Self> {
        let version = FormatVersion::parse(&doc.format_version)
            .ok_or_else(|| ScoreError::malformed("missing file version"))?;
        if doc.parts.is_empty() {
            return Err(ScoreError::malformed("score has no parts"));
        }

        let parts = doc
            .parts
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let kind = rules.classify(&version, &raw.instrument_id, &raw.long_name);
                let mut part = Part {
                    id: resolve_part_id(raw.declared_id.as_deref(), index),
                    index,
                    long_name: raw.long_name,
                    instrument_id: raw.instrument_id,
                    kind,
                    controllers: raw.controllers,
                    volume_ctrl_idx: 0,
                    bank_ctrl_idx: None,
                    program: raw.program,
                };
                part.volume_ctrl_idx = part.ensure_controller(CTRL_VOLUME, DEFAULT_VOLUME);
                part
            })
            .collect();

        Ok(Self {
            version,
            parts,
            mixer_tracks: doc.mixer_tracks,
        })
    }

    pub fn version(&self) -> &FormatVersion {
        &self.version
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn mixer_tracks(&self) -> Option<&[MixerTrack]> {
        self.mixer_tracks.as_deref()
    }

    pub fn voice_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_voice()).count()
    }

    /// Set the volume of every part for the next variant. `focus` is the
    /// index of the featured voice part, `None` when no part is featured.
    /// Mixer tracks, when present, follow through [`volume_to_db`].
    pub fn set_volumes(&mut self, focus: Option<usize>, mix: VolumeMix) {
        for part in &mut self.parts {
            part.set_volume(mix_for(part, focus, mix));
        }

        if let Some(tracks) = self.mixer_tracks.as_mut() {
            for track in tracks.iter_mut() {
                let percent = match self.parts.iter().find(|p| p.id == track.part_id) {
                    Some(part) => mix_for(part, focus, mix),
                    None => mix.instruments,
                };
                track.volume_db = volume_to_db(percent);
            }
        }
    }

    /// Switch every voice part to `sound`. Other parts keep their own sound.
    pub fn assign_sound(&mut self, sound: Sound) {
        for part in self.parts.iter_mut().filter(|p| p.is_voice()) {
            part.program = sound.program;
            part.set_bank(sound.bank);
        }
    }

    /// One info line per part, in score order.
    pub fn log_parts(&self) {
        for part in &self.parts {
            log::info!(
                target: "score",
                "Part #{}: {} ({}) (sound={}) (vol={})",
                part.index,
                part.long_name,
                if part.is_voice() { "voice" } else { "instrument" },
                part.program,
                part.volume(),
            );
        }
    }
}

fn mix_for(part: &Part, focus: Option<usize>, mix: VolumeMix) -> i32 {
    if !part.is_voice() {
        mix.instruments
    } else if focus == Some(part.index) {
        mix.this
    } else {
        mix.others
    }
}

/// Declared id if it parses to a non-zero integer, else the part's position.
fn resolve_part_id(declared: Option<&str>, index: usize) -> u32 {
    declared
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&id| id != 0)
        .unwrap_or(index as u32)
}
