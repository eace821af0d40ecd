//! `.mscz` archives: a zip holding `META-INF/container.xml`, the `.mscx`
//! score body it points at, and (newer files) `audiosettings.json`.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use xmltree::{Element, EmitterConfig, XMLNode};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use super::{ScoreSource, Snapshot, VariantSink};
use crate::error::{Result, ScoreError};
use crate::paths;
use crate::score::{RawPart, Score, ScoreDocument};
use partexport_types::{Controller, MixerTrack, Part, CTRL_BANK, CTRL_VOLUME, UNPARSED_CTRL};

const CONTAINER_ENTRY: &str = "META-INF/container.xml";
const AUDIO_SETTINGS_ENTRY: &str = "audiosettings.json";
const EXCERPTS_DIR: &str = "Excerpts/";

/// A parsed score archive. Holds the original bytes so variants can be
/// written as full copies with only the score (and mixer) entries replaced.
pub struct MsczContainer {
    archive_bytes: Vec<u8>,
    score_entry: String,
    score: Element,
    audio_settings: Option<Value>,
}

impl MsczContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            ScoreError::malformed(format!("error reading file \"{}\": {}", path.display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(archive_bytes: Vec<u8>) -> Result<Self> {
        let (score_entry, score, audio_settings) = {
            let mut archive = ZipArchive::new(Cursor::new(archive_bytes.as_slice()))
                .map_err(|e| ScoreError::malformed(format!("not a score archive: {}", e)))?;

            let meta = read_entry(&mut archive, CONTAINER_ENTRY)?.ok_or_else(|| {
                ScoreError::malformed("error reading content structure (missing file pointer)")
            })?;
            let index = Element::parse(meta.as_slice()).map_err(|e| {
                ScoreError::malformed(format!("error reading content structure (no valid XML): {}", e))
            })?;
            let score_entry = find_score_entry(&index)
                .ok_or_else(|| ScoreError::malformed("missing name of actual score file"))?;

            let body = read_entry(&mut archive, &score_entry)?.ok_or_else(|| {
                ScoreError::malformed(format!("error reading score from \"{}\"", score_entry))
            })?;
            let score = Element::parse(body.as_slice()).map_err(|e| {
                ScoreError::malformed(format!("error reading score (no valid XML): {}", e))
            })?;

            let audio_settings = match read_entry(&mut archive, AUDIO_SETTINGS_ENTRY)? {
                Some(bytes) => Some(serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                    ScoreError::malformed(format!("error reading mixer settings: {}", e))
                })?),
                None => None,
            };
            (score_entry, score, audio_settings)
        };

        log::debug!(target: "container", "score entry: {}", score_entry);

        Ok(Self {
            archive_bytes,
            score_entry,
            score,
            audio_settings,
        })
    }

    pub fn score_entry(&self) -> &str {
        &self.score_entry
    }

    pub fn has_mixer_settings(&self) -> bool {
        self.audio_settings.is_some()
    }

    /// Writer placing variant copies in `work_dir`, named after `input`.
    pub fn variant_writer(&self, input: &Path, work_dir: &Path) -> MsczVariantWriter<'_> {
        let (base_name, extension) = paths::stem_and_extension(input);
        MsczVariantWriter {
            container: self,
            work_dir: work_dir.to_path_buf(),
            base_name,
            extension,
        }
    }

    fn score_body(&self) -> Result<&Element> {
        self.score
            .get_child("Score")
            .ok_or_else(|| ScoreError::malformed("missing score body"))
    }
}

impl ScoreSource for MsczContainer {
    fn document(&self) -> Result<ScoreDocument> {
        let format_version = self.score.attributes.get("version").cloned().unwrap_or_default();
        let parts = child_elements(self.score_body()?, "Part").map(read_part).collect();
        let mixer_tracks = self.audio_settings.as_ref().map(read_mixer_tracks);

        Ok(ScoreDocument {
            format_version,
            parts,
            mixer_tracks,
        })
    }

    fn snapshot(&self, score: &Score) -> Result<Snapshot> {
        let mut root = self.score.clone();
        let body = root
            .get_mut_child("Score")
            .ok_or_else(|| ScoreError::malformed("missing score body"))?;

        let mut part_elements = body.children.iter_mut().filter_map(|node| match node {
            XMLNode::Element(e) if e.name == "Part" => Some(e),
            _ => None,
        });
        for part in score.parts() {
            let element = part_elements
                .next()
                .ok_or_else(|| ScoreError::malformed("part list no longer matches the score"))?;
            apply_part(element, part);
        }

        let mut xml = Vec::new();
        root.write_with_config(&mut xml, EmitterConfig::new().perform_indent(true))
            .map_err(|e| ScoreError::Xml(e.to_string()))?;

        let mixer = match (&self.audio_settings, score.mixer_tracks()) {
            (Some(settings), Some(tracks)) => {
                let mut settings = settings.clone();
                apply_mixer_tracks(&mut settings, tracks);
                Some(serde_json::to_vec_pretty(&settings)?)
            }
            _ => None,
        };

        Ok(Snapshot { score: xml, mixer })
    }
}

pub struct MsczVariantWriter<'a> {
    container: &'a MsczContainer,
    work_dir: PathBuf,
    base_name: String,
    extension: String,
}

impl MsczVariantWriter<'_> {
    /// `<work dir>/<base>-<file name>.<ext>`
    pub fn variant_path(&self, file_name: &str) -> PathBuf {
        self.work_dir.join(format!(
            "{}.{}",
            paths::variant_stem(&self.base_name, file_name),
            self.extension
        ))
    }
}

impl VariantSink for MsczVariantWriter<'_> {
    fn write_variant(&mut self, file_name: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.variant_path(file_name);
        let container = self.container;
        let mut archive = ZipArchive::new(Cursor::new(container.archive_bytes.as_slice()))?;
        let mut writer = ZipWriter::new(File::create(&path)?);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let name = entry.name();
            if name == container.score_entry
                || (snapshot.mixer.is_some() && name == AUDIO_SETTINGS_ENTRY)
            {
                continue;
            }
            writer.raw_copy_file(entry)?;
        }

        writer.start_file(container.score_entry.as_str(), FileOptions::default())?;
        writer.write_all(&snapshot.score)?;
        if let Some(mixer) = &snapshot.mixer {
            writer.start_file(AUDIO_SETTINGS_ENTRY, FileOptions::default())?;
            writer.write_all(mixer)?;
        }
        writer.finish()?;

        log::debug!(target: "container", "wrote variant copy {}", path.display());
        Ok(path)
    }
}

/// A missing entry is `None`; an entry that cannot be read makes the score malformed.
fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    let unreadable =
        |e: &dyn std::fmt::Display| ScoreError::malformed(format!("error reading \"{}\": {}", name, e));
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).map_err(|e| unreadable(&e))?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(unreadable(&e)),
    }
}

/// First `.mscx` root file outside the excerpts folder.
fn find_score_entry(index: &Element) -> Option<String> {
    let rootfiles = index.get_child("rootfiles")?;
    child_elements(rootfiles, "rootfile")
        .filter_map(|e| e.attributes.get("full-path"))
        .find(|path| path.ends_with(".mscx") && !path.starts_with(EXCERPTS_DIR))
        .cloned()
}

fn child_elements<'a>(parent: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    parent.children.iter().filter_map(move |node| match node {
        XMLNode::Element(e) if e.name == name => Some(e),
        _ => None,
    })
}

fn child_text(parent: &Element, name: &str) -> String {
    parent
        .get_child(name)
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn int_attr(element: &Element, name: &str) -> Option<i32> {
    element.attributes.get(name).and_then(|v| v.trim().parse().ok())
}

fn read_part(element: &Element) -> RawPart {
    let declared_id = element.attributes.get("id").cloned();
    let Some(instrument) = element.get_child("Instrument") else {
        return RawPart {
            declared_id,
            ..Default::default()
        };
    };

    let (controllers, program) = match instrument.get_child("Channel") {
        Some(channel) => {
            let controllers = child_elements(channel, "controller")
                .map(|c| {
                    let ctrl = c
                        .attributes
                        .get("ctrl")
                        .and_then(|v| v.trim().parse::<u8>().ok())
                        .unwrap_or(UNPARSED_CTRL);
                    Controller::new(ctrl, int_attr(c, "value").unwrap_or(0))
                })
                .collect();
            let program = channel
                .get_child("program")
                .and_then(|p| int_attr(p, "value"))
                .unwrap_or(0);
            (controllers, program)
        }
        None => (Vec::new(), 0),
    };

    RawPart {
        declared_id,
        long_name: child_text(instrument, "longName"),
        instrument_id: child_text(instrument, "instrumentId"),
        controllers,
        program,
    }
}

fn ensure_child<'a>(parent: &'a mut Element, name: &str) -> &'a mut Element {
    let pos = parent
        .children
        .iter()
        .position(|n| matches!(n, XMLNode::Element(e) if e.name == name));
    let pos = match pos {
        Some(pos) => pos,
        None => {
            parent.children.push(XMLNode::Element(Element::new(name)));
            parent.children.len() - 1
        }
    };
    match &mut parent.children[pos] {
        XMLNode::Element(e) => e,
        _ => unreachable!("position only matches elements"),
    }
}

/// Write a part's controller values and program onto its `Part` element.
/// Existing controllers are matched by position; only volume and bank
/// values are written back, the rest stay as they were read.
fn apply_part(element: &mut Element, part: &Part) {
    let channel = ensure_child(ensure_child(element, "Instrument"), "Channel");

    let existing: Vec<usize> = channel
        .children
        .iter()
        .enumerate()
        .filter(|(_, n)| matches!(n, XMLNode::Element(e) if e.name == "controller"))
        .map(|(i, _)| i)
        .collect();

    for (i, controller) in part.controllers.iter().enumerate() {
        match existing.get(i) {
            Some(&pos) => {
                if controller.ctrl != CTRL_VOLUME && controller.ctrl != CTRL_BANK {
                    continue;
                }
                if let XMLNode::Element(e) = &mut channel.children[pos] {
                    e.attributes.insert("value".to_string(), controller.value.to_string());
                }
            }
            None => {
                let mut e = Element::new("controller");
                e.attributes.insert("ctrl".to_string(), controller.ctrl.to_string());
                e.attributes.insert("value".to_string(), controller.value.to_string());
                channel.children.push(XMLNode::Element(e));
            }
        }
    }

    ensure_child(channel, "program")
        .attributes
        .insert("value".to_string(), part.program.to_string());
}

fn track_part_id(track: &Value) -> Option<u32> {
    match track.get("partId")? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }
}

fn read_mixer_tracks(settings: &Value) -> Vec<MixerTrack> {
    let Some(tracks) = settings.get("tracks").and_then(Value::as_array) else {
        return Vec::new();
    };
    tracks
        .iter()
        .filter_map(|track| {
            let part_id = track_part_id(track)?;
            let volume_db = track
                .get("out")
                .and_then(|o| o.get("volumeDb"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            Some(MixerTrack { part_id, volume_db })
        })
        .collect()
}

/// Tracks are matched in the same order [`read_mixer_tracks`] produced them.
fn apply_mixer_tracks(settings: &mut Value, tracks: &[MixerTrack]) {
    let Some(entries) = settings.get_mut("tracks").and_then(Value::as_array_mut) else {
        return;
    };
    let mut model = tracks.iter();
    for entry in entries.iter_mut() {
        if track_part_id(entry).is_none() {
            continue;
        }
        let Some(track) = model.next() else { break };
        let Some(object) = entry.as_object_mut() else { continue };
        let out = object
            .entry("out")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(out) = out.as_object_mut() {
            out.insert("volumeDb".to_string(), Value::from(track.volume_db));
        }
    }
}
