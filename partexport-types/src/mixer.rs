use serde::{Deserialize, Serialize};

/// Per-part output gain of newer score files, keyed by part id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerTrack {
    pub part_id: u32,
    pub volume_db: f64,
}

/// Program/bank pair selecting the sound of a part's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    pub program: i32,
    pub bank: i32,
}

impl Sound {
    /// Choir Aahs
    pub const CHOIR: Sound = Sound { program: 52, bank: 0 };
    /// Acoustic Grand Piano
    pub const GRAND_PIANO: Sound = Sound { program: 0, bank: 0 };
}

/// Volume percentages for one variant: the focused voice, the other voices,
/// and every non-voice part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMix {
    pub this: i32,
    pub others: i32,
    pub instruments: i32,
}

impl VolumeMix {
    pub const fn new(this: i32, others: i32, instruments: i32) -> Self {
        Self { this, others, instruments }
    }

    /// Everything at full volume.
    pub const FULL: VolumeMix = VolumeMix::new(100, 100, 100);
}

/// Coarse percent to decibel step used for mixer tracks. Not interpolated.
pub fn volume_to_db(percent: i32) -> f64 {
    if percent < 5 {
        -60.0
    } else if percent < 60 {
        -9.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_to_db_steps() {
        assert_eq!(volume_to_db(0), -60.0);
        assert_eq!(volume_to_db(4), -60.0);
        assert_eq!(volume_to_db(5), -9.0);
        assert_eq!(volume_to_db(50), -9.0);
        assert_eq!(volume_to_db(59), -9.0);
        assert_eq!(volume_to_db(60), 0.0);
        assert_eq!(volume_to_db(100), 0.0);
    }
}
