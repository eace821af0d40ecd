use partexport_types::{FormatVersion, PartKind};

const VOICE_INSTRUMENT_PREFIX: &str = "voice.";

/// Long-name prefixes that mark a part as sung.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceRules {
    prefixes: Vec<String>,
}

impl Default for VoiceRules {
    fn default() -> Self {
        Self::new(["solo", "soprano", "alto", "tenor", "bass"])
    }
}

impl VoiceRules {
    pub fn new<'a>(prefixes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Case-insensitive prefix match of a part's long name.
    pub fn matches_name(&self, long_name: &str) -> bool {
        let lower = long_name.to_lowercase();
        self.prefixes.iter().any(|p| lower.starts_with(p.as_str()))
    }

    /// Generation 3 files carry a `voice.*` instrument id on sung parts;
    /// every other generation is classified by long name.
    pub fn classify(&self, version: &FormatVersion, instrument_id: &str, long_name: &str) -> PartKind {
        let voice = if version.has_voice_instrument_ids() {
            instrument_id.starts_with(VOICE_INSTRUMENT_PREFIX)
        } else {
            self.matches_name(long_name)
        };
        if voice {
            PartKind::Voice
        } else {
            PartKind::Instrument
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> FormatVersion {
        FormatVersion::parse(raw).unwrap()
    }

    #[test]
    fn v3_uses_instrument_id() {
        let rules = VoiceRules::default();
        assert_eq!(rules.classify(&v("3.02"), "voice.alto", "Organ"), PartKind::Voice);
        assert_eq!(rules.classify(&v("3.02"), "keyboard.piano", "Soprano"), PartKind::Instrument);
        assert_eq!(rules.classify(&v("3.01"), "voices", "Alto"), PartKind::Instrument);
    }

    #[test]
    fn other_versions_use_long_name() {
        let rules = VoiceRules::default();
        assert_eq!(rules.classify(&v("4.20"), "keyboard.piano", "SOPRANO 1"), PartKind::Voice);
        assert_eq!(rules.classify(&v("4.20"), "voice.alto", "Organ"), PartKind::Instrument);
        assert_eq!(rules.classify(&v("2.06"), "", "Bassoon"), PartKind::Voice);
        assert_eq!(rules.classify(&v("2.06"), "", "Piano"), PartKind::Instrument);
    }

    #[test]
    fn prefixes_are_normalized() {
        let rules = VoiceRules::new([" Alt ", "", "TENOR"]);
        assert_eq!(rules.prefixes(), &["alt".to_string(), "tenor".to_string()]);
        assert!(rules.matches_name("Altstimme"));
        assert!(rules.matches_name("tenor II"));
    }
}
