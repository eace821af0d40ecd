use serde::{Deserialize, Serialize};

/// MIDI controller number for channel volume.
pub const CTRL_VOLUME: u8 = 7;
/// MIDI controller number for bank select (LSB).
pub const CTRL_BANK: u8 = 32;

/// Value given to a volume controller created for a part that had none.
pub const DEFAULT_VOLUME: i32 = 80;
/// Value given to a bank controller created for a part that had none.
pub const DEFAULT_BANK: i32 = 1;

/// Placeholder controller number for entries whose `ctrl` attribute could not be read.
/// Outside the MIDI range, so it never matches a lookup.
pub const UNPARSED_CTRL: u8 = u8::MAX;

/// One mixer parameter attached to a part's sound channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    pub ctrl: u8,
    pub value: i32,
}

impl Controller {
    pub fn new(ctrl: u8, value: i32) -> Self {
        Self { ctrl, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartKind {
    Voice,
    Instrument,
}

/// Score file format version as declared by the document (e.g. "3.02", "4.20").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatVersion(String);

impl FormatVersion {
    /// Returns `None` for an empty or whitespace-only tag.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn major(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }

    /// Generation 3 files tag sung parts through their instrument id.
    pub fn has_voice_instrument_ids(&self) -> bool {
        self.major() == "3"
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One instrument or voice line of a score, with its mixer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: u32,
    /// Position of the part within its score.
    pub index: usize,
    pub long_name: String,
    pub instrument_id: String,
    pub kind: PartKind,
    pub controllers: Vec<Controller>,
    pub volume_ctrl_idx: usize,
    /// Created on the first instrument switch.
    pub bank_ctrl_idx: Option<usize>,
    pub program: i32,
}

impl Part {
    pub fn is_voice(&self) -> bool {
        self.kind == PartKind::Voice
    }

    /// Index of the first controller with number `ctrl`, appending one with
    /// `default` when the part has none yet. Never appends a duplicate.
    pub fn ensure_controller(&mut self, ctrl: u8, default: i32) -> usize {
        if let Some(idx) = self.controllers.iter().position(|c| c.ctrl == ctrl) {
            return idx;
        }
        self.controllers.push(Controller::new(ctrl, default));
        self.controllers.len() - 1
    }

    pub fn volume(&self) -> i32 {
        self.controllers[self.volume_ctrl_idx].value
    }

    pub fn set_volume(&mut self, value: i32) {
        self.controllers[self.volume_ctrl_idx].value = value;
    }

    pub fn bank(&self) -> Option<i32> {
        self.bank_ctrl_idx.map(|idx| self.controllers[idx].value)
    }

    pub fn set_bank(&mut self, value: i32) {
        let idx = match self.bank_ctrl_idx {
            Some(idx) => idx,
            None => {
                let idx = self.ensure_controller(CTRL_BANK, DEFAULT_BANK);
                self.bank_ctrl_idx = Some(idx);
                idx
            }
        };
        self.controllers[idx].value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(controllers: Vec<Controller>) -> Part {
        Part {
            id: 1,
            index: 0,
            long_name: "Soprano".to_string(),
            instrument_id: "voice.soprano".to_string(),
            kind: PartKind::Voice,
            controllers,
            volume_ctrl_idx: 0,
            bank_ctrl_idx: None,
            program: 52,
        }
    }

    #[test]
    fn ensure_controller_finds_existing() {
        let mut p = part(vec![Controller::new(10, 64), Controller::new(CTRL_VOLUME, 90)]);
        assert_eq!(p.ensure_controller(CTRL_VOLUME, DEFAULT_VOLUME), 1);
        assert_eq!(p.controllers.len(), 2);
        assert_eq!(p.controllers[1].value, 90);
    }

    #[test]
    fn ensure_controller_is_idempotent() {
        let mut p = part(vec![Controller::new(10, 64)]);
        let first = p.ensure_controller(CTRL_VOLUME, DEFAULT_VOLUME);
        let second = p.ensure_controller(CTRL_VOLUME, 12);
        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(p.controllers.len(), 2);
        assert_eq!(p.controllers[1], Controller::new(CTRL_VOLUME, DEFAULT_VOLUME));
    }

    #[test]
    fn set_bank_creates_controller_once() {
        let mut p = part(vec![Controller::new(CTRL_VOLUME, 80)]);
        assert_eq!(p.bank(), None);
        p.set_bank(0);
        p.set_bank(3);
        assert_eq!(p.bank(), Some(3));
        assert_eq!(p.controllers.iter().filter(|c| c.ctrl == CTRL_BANK).count(), 1);
    }

    #[test]
    fn format_version_major() {
        let v = FormatVersion::parse("3.02").unwrap();
        assert_eq!(v.major(), "3");
        assert!(v.has_voice_instrument_ids());
        let v = FormatVersion::parse("4.20").unwrap();
        assert!(!v.has_voice_instrument_ids());
        let v = FormatVersion::parse("30.1").unwrap();
        assert!(!v.has_voice_instrument_ids());
        assert_eq!(FormatVersion::parse("  "), None);
    }
}
