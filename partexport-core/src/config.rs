use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dispatch::ExecutionMode;
use crate::paths;
use crate::score::VoiceRules;
use partexport_types::Sound;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Upper bound for the worker pool size.
pub const MAX_WORKERS: usize = 64;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    renderer: RendererConfig,
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    voices: VoicesConfig,
    #[serde(default)]
    sounds: SoundsConfig,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    export: ExportConfig,
}

#[derive(Deserialize, Default)]
struct RendererConfig {
    path: Option<String>,
}

#[derive(Deserialize, Default)]
struct PathsConfig {
    work_dir: Option<PathBuf>,
    export_dir: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct VoicesConfig {
    prefixes: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct SoundsConfig {
    voice_program: Option<i32>,
    voice_bank: Option<i32>,
    piano_program: Option<i32>,
    piano_bank: Option<i32>,
}

#[derive(Deserialize, Default)]
struct DispatchConfig {
    mode: Option<String>,
    max_workers: Option<usize>,
}

#[derive(Deserialize, Default)]
struct ExportConfig {
    copy_source: Option<bool>,
    switch_instruments: Option<bool>,
}

pub struct Config {
    file: ConfigFile,
}

impl Config {
    /// Embedded defaults merged with the user config file, if any.
    /// `explicit` replaces the default user config location.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = Self::embedded();

        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => paths::user_config_path(),
        };
        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => {
                        if let Err(e) = config.merge_str(&contents) {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    }
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            } else if explicit.is_some() {
                log::warn!(target: "config", "config file {} does not exist", path.display());
            }
        }

        config
    }

    pub fn embedded() -> Self {
        let file: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config { file }
    }

    /// Overlay keys from a TOML document onto the current values.
    pub fn merge_str(&mut self, contents: &str) -> Result<(), toml::de::Error> {
        let user: ConfigFile = toml::from_str(contents)?;
        merge(&mut self.file, user);
        Ok(())
    }

    pub fn renderer_path(&self) -> String {
        self.file
            .renderer
            .path
            .clone()
            .unwrap_or_else(|| "mscore".to_string())
    }

    pub fn work_dir(&self) -> PathBuf {
        self.file
            .paths
            .work_dir
            .clone()
            .unwrap_or_else(paths::default_work_dir)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.file
            .paths
            .export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("export"))
    }

    pub fn voice_rules(&self) -> VoiceRules {
        match &self.file.voices.prefixes {
            Some(prefixes) => VoiceRules::new(prefixes.iter().map(String::as_str)),
            None => VoiceRules::default(),
        }
    }

    pub fn voice_sound(&self) -> Sound {
        Sound {
            program: self.file.sounds.voice_program.unwrap_or(Sound::CHOIR.program),
            bank: self.file.sounds.voice_bank.unwrap_or(Sound::CHOIR.bank),
        }
    }

    pub fn piano_sound(&self) -> Sound {
        Sound {
            program: self.file.sounds.piano_program.unwrap_or(Sound::GRAND_PIANO.program),
            bank: self.file.sounds.piano_bank.unwrap_or(Sound::GRAND_PIANO.bank),
        }
    }

    /// Worker pool size (clamped to 1..=64).
    pub fn max_workers(&self) -> usize {
        self.file.dispatch.max_workers.unwrap_or(4).clamp(1, MAX_WORKERS)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        let mode = self.file.dispatch.mode.as_deref().unwrap_or("parallel");
        match parse_mode(mode) {
            Some(true) => ExecutionMode::Serial,
            Some(false) => ExecutionMode::Pooled {
                max_workers: self.max_workers(),
            },
            None => {
                log::warn!(target: "config", "unknown dispatch mode {:?}, using parallel", mode);
                ExecutionMode::Pooled {
                    max_workers: self.max_workers(),
                }
            }
        }
    }

    pub fn copy_source(&self) -> bool {
        self.file.export.copy_source.unwrap_or(true)
    }

    pub fn switch_instruments(&self) -> bool {
        self.file.export.switch_instruments.unwrap_or(true)
    }

    /// Resolve every key into the explicit settings value used by a run.
    pub fn settings(&self) -> Settings {
        Settings {
            renderer: self.renderer_path(),
            work_dir: self.work_dir(),
            export_dir: self.export_dir(),
            voice_rules: self.voice_rules(),
            voice_sound: self.voice_sound(),
            piano_sound: self.piano_sound(),
            mode: self.execution_mode(),
            copy_source: self.copy_source(),
            switch_instruments: self.switch_instruments(),
        }
    }
}

/// Everything one export run needs, resolved from config and command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub renderer: String,
    pub work_dir: PathBuf,
    pub export_dir: PathBuf,
    pub voice_rules: VoiceRules,
    pub voice_sound: Sound,
    pub piano_sound: Sound,
    pub mode: ExecutionMode,
    pub copy_source: bool,
    pub switch_instruments: bool,
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.renderer.path.is_some() {
        base.renderer.path = user.renderer.path;
    }
    if user.paths.work_dir.is_some() {
        base.paths.work_dir = user.paths.work_dir;
    }
    if user.paths.export_dir.is_some() {
        base.paths.export_dir = user.paths.export_dir;
    }
    if user.voices.prefixes.is_some() {
        base.voices.prefixes = user.voices.prefixes;
    }
    if user.sounds.voice_program.is_some() {
        base.sounds.voice_program = user.sounds.voice_program;
    }
    if user.sounds.voice_bank.is_some() {
        base.sounds.voice_bank = user.sounds.voice_bank;
    }
    if user.sounds.piano_program.is_some() {
        base.sounds.piano_program = user.sounds.piano_program;
    }
    if user.sounds.piano_bank.is_some() {
        base.sounds.piano_bank = user.sounds.piano_bank;
    }
    if user.dispatch.mode.is_some() {
        base.dispatch.mode = user.dispatch.mode;
    }
    if user.dispatch.max_workers.is_some() {
        base.dispatch.max_workers = user.dispatch.max_workers;
    }
    if user.export.copy_source.is_some() {
        base.export.copy_source = user.export.copy_source;
    }
    if user.export.switch_instruments.is_some() {
        base.export.switch_instruments = user.export.switch_instruments;
    }
}

/// `Some(true)` for serial, `Some(false)` for parallel.
fn parse_mode(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "serial" | "single" | "single-threaded" => Some(true),
        "parallel" | "pooled" | "multi-threaded" => Some(false),
        _ => None,
    }
}
