use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use partexport_core::config::Settings;
use partexport_core::container::{MsczContainer, ScoreSource};
use partexport_core::dispatch::ExecutionMode;
use partexport_core::export::{dry_run, run_export};
use partexport_core::render::{RenderError, Renderer};
use partexport_core::score::VoiceRules;
use partexport_core::ScoreError;
use partexport_types::Sound;
use zip::write::FileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container>
  <rootfiles>
    <rootfile full-path="Hymn.mscx"/>
  </rootfiles>
</container>"#;

const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<museScore version="3.02">
  <Score>
    <Part>
      <Instrument>
        <longName>Soprano</longName>
        <instrumentId>voice.soprano</instrumentId>
        <Channel><program value="52"/><controller ctrl="7" value="90"/></Channel>
      </Instrument>
    </Part>
    <Part>
      <Instrument>
        <longName>Bass</longName>
        <instrumentId>voice.bass</instrumentId>
        <Channel><program value="52"/></Channel>
      </Instrument>
    </Part>
    <Part>
      <Instrument>
        <longName>Piano</longName>
        <instrumentId>keyboard.piano</instrumentId>
        <Channel><program value="0"/><controller ctrl="7" value="70"/></Channel>
      </Instrument>
    </Part>
  </Score>
</museScore>"#;

/// What the renderer saw for one command.
#[derive(Debug, Clone)]
struct Seen {
    command: String,
    /// Volume of each part in the file the command pointed at.
    volumes: Vec<Option<i32>>,
}

impl Seen {
    fn piano_volume(&self) -> i32 {
        self.volumes[2].unwrap()
    }
}

#[derive(Default)]
struct InspectingRenderer {
    seen: Mutex<Vec<Seen>>,
}

impl Renderer for InspectingRenderer {
    fn run(&self, command: &str) -> Result<String, RenderError> {
        let target = command.trim_end_matches('"').rsplit('"').next().unwrap();
        let container = MsczContainer::open(Path::new(target)).unwrap();
        let doc = container.document().unwrap();
        let volumes = doc
            .parts
            .iter()
            .map(|p| p.controllers.iter().find(|c| c.ctrl == 7).map(|c| c.value))
            .collect();
        self.seen.lock().unwrap().push(Seen {
            command: command.to_string(),
            volumes,
        });
        Ok("done".to_string())
    }
}

fn write_score(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("Hymn.mscz");
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    let bytes = writer.finish().unwrap().into_inner();
    File::create(&path).unwrap().write_all(&bytes).unwrap();
    path
}

fn settings(root: &Path, mode: ExecutionMode) -> Settings {
    Settings {
        renderer: "mscore".to_string(),
        work_dir: root.join("work"),
        export_dir: root.join("export"),
        voice_rules: VoiceRules::default(),
        voice_sound: Sound::CHOIR,
        piano_sound: Sound::GRAND_PIANO,
        mode,
        copy_source: true,
        switch_instruments: true,
    }
}

/// A directory that was never created counts as empty.
fn dir_is_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !dir.exists(),
    }
}

#[test]
fn serial_export_renders_every_variant_in_order() {
    let root = tempfile::tempdir().unwrap();
    let input = write_score(root.path(), &[("META-INF/container.xml", CONTAINER_XML), ("Hymn.mscx", SCORE)]);
    let settings = settings(root.path(), ExecutionMode::Serial);
    let renderer = Arc::new(InspectingRenderer::default());

    let report = run_export(&input, &settings, renderer.clone()).unwrap();

    assert_eq!(
        report.labels(),
        vec![
            "Soprano",
            "Soprano (Karaoke)",
            "Soprano (Solo)",
            "Soprano (Piano)",
            "Bass",
            "Bass (Karaoke)",
            "Bass (Solo)",
            "Bass (Piano)",
            "All (mix)",
            "All (Piano)",
            "Hymn.pdf",
        ]
    );

    let seen = renderer.seen.lock().unwrap();
    let piano: Vec<i32> = seen.iter().map(Seen::piano_volume).collect();
    // instruments follow the mix on every variant; the print layout reads the untouched input
    assert_eq!(piano, vec![100, 100, 100, 50, 100, 100, 100, 50, 100, 100, 70]);

    assert!(seen[0].command.starts_with("mscore -o \""));
    assert!(seen[0].command.contains("Hymn-Soprano.mp3"));
    assert!(seen[10].command.starts_with("mscore --export-score-parts -o \""));
    assert!(seen[10].command.ends_with(&format!("\"{}\"", input.display())));

    assert!(dir_is_empty(&settings.work_dir));
    assert!(settings.export_dir.join("Hymn.mscz").exists());
}

#[test]
fn pooled_export_runs_each_task_once() {
    let root = tempfile::tempdir().unwrap();
    let input = write_score(root.path(), &[("META-INF/container.xml", CONTAINER_XML), ("Hymn.mscx", SCORE)]);
    let settings = settings(root.path(), ExecutionMode::Pooled { max_workers: 3 });
    let renderer = Arc::new(InspectingRenderer::default());

    let report = run_export(&input, &settings, renderer.clone()).unwrap();

    let mut labels = report.labels();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), 11);
    assert_eq!(renderer.seen.lock().unwrap().len(), 11);
    assert!(dir_is_empty(&settings.work_dir));
}

#[test]
fn malformed_score_aborts_before_rendering() {
    let root = tempfile::tempdir().unwrap();
    let input = write_score(root.path(), &[("Hymn.mscx", SCORE)]);
    let settings = settings(root.path(), ExecutionMode::Serial);
    let renderer = Arc::new(InspectingRenderer::default());

    let result = run_export(&input, &settings, renderer.clone());
    assert!(matches!(result, Err(ScoreError::Malformed(_))));
    assert!(renderer.seen.lock().unwrap().is_empty());
    assert!(dir_is_empty(&settings.work_dir));
    assert!(!settings.export_dir.join("Hymn.mscz").exists());
}

#[test]
fn non_archive_input_is_malformed() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("Hymn.mscz");
    fs::write(&input, SCORE).unwrap();
    let settings = settings(root.path(), ExecutionMode::Serial);

    let result = run_export(&input, &settings, Arc::new(InspectingRenderer::default()));
    assert!(matches!(result, Err(ScoreError::Malformed(_))));
    assert!(dir_is_empty(&settings.export_dir));
}

#[test]
fn duplicate_voice_names_render_their_own_mix() {
    let root = tempfile::tempdir().unwrap();
    let twins = SCORE.replace("<longName>Bass</longName>", "<longName>Soprano</longName>");
    let input = write_score(
        root.path(),
        &[("META-INF/container.xml", CONTAINER_XML), ("Hymn.mscx", twins.as_str())],
    );
    let settings = settings(root.path(), ExecutionMode::Serial);
    let renderer = Arc::new(InspectingRenderer::default());

    let report = run_export(&input, &settings, renderer.clone()).unwrap();
    assert_eq!(report.labels()[0], "Soprano");
    assert_eq!(report.labels()[4], "Soprano");

    let seen = renderer.seen.lock().unwrap();
    assert_eq!(seen.len(), 11);
    assert_eq!(seen[0].volumes, vec![Some(100), Some(50), Some(100)]);
    assert_eq!(seen[4].volumes, vec![Some(50), Some(100), Some(100)]);
    assert!(seen[4].command.contains("Hymn-Soprano (2).mp3"));

    let mut commands: Vec<&str> = seen.iter().map(|s| s.command.as_str()).collect();
    commands.sort();
    commands.dedup();
    assert_eq!(commands.len(), 11);
    assert!(dir_is_empty(&settings.work_dir));
}

#[test]
fn empty_part_list_is_malformed() {
    let root = tempfile::tempdir().unwrap();
    let empty = r#"<museScore version="3.02"><Score></Score></museScore>"#;
    let input = write_score(root.path(), &[("META-INF/container.xml", CONTAINER_XML), ("Hymn.mscx", empty)]);
    let settings = settings(root.path(), ExecutionMode::Serial);

    let result = run_export(&input, &settings, Arc::new(InspectingRenderer::default()));
    assert!(matches!(result, Err(ScoreError::Malformed(_))));
}

#[test]
fn dry_run_plans_without_leaving_temp_copies() {
    let root = tempfile::tempdir().unwrap();
    let input = write_score(root.path(), &[("META-INF/container.xml", CONTAINER_XML), ("Hymn.mscx", SCORE)]);
    let settings = settings(root.path(), ExecutionMode::Serial);

    let tasks = dry_run(&input, &settings).unwrap();
    assert_eq!(tasks.len(), 11);
    assert!(tasks[..10].iter().all(|t| t.cleanup_path.is_some()));
    assert!(tasks[10].cleanup_path.is_none());
    assert!(dir_is_empty(&settings.work_dir));
}
