//! Variant planning: walks the score through every export configuration in
//! a fixed order and emits one immutable [`Task`] per variant.
//!
//! Per voice part (score order): `<name>`, `<name> (Karaoke)`,
//! `<name> (Solo)`, `<name> (Piano)`. Then `All (mix)`, `All (Piano)` and
//! the print layout of the untouched input. A score with `v` voice parts
//! therefore yields `4v + 3` tasks.
//!
//! Every task gets its own file name. Labels that collide, case-insensitively
//! after sanitizing, are numbered `<label> (2)`, `<label> (3)`, ...

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use partexport_types::{Sound, Task, VolumeMix};

use crate::container::{ScoreSource, VariantSink};
use crate::error::Result;
use crate::paths;
use crate::score::Score;

pub const MIX_FOCUS: VolumeMix = VolumeMix::new(100, 50, 100);
pub const MIX_KARAOKE: VolumeMix = VolumeMix::new(0, 100, 100);
pub const MIX_SOLO: VolumeMix = VolumeMix::new(100, 0, 100);
pub const MIX_PIANO: VolumeMix = VolumeMix::new(100, 50, 50);

pub const LABEL_ALL_MIX: &str = "All (mix)";
pub const LABEL_ALL_PIANO: &str = "All (Piano)";

/// Everything the command lines and sound switches depend on.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub renderer: String,
    pub export_dir: PathBuf,
    /// The original score file, rendered as-is for the print layout.
    pub input: PathBuf,
    pub voice_sound: Sound,
    pub piano_sound: Sound,
    /// When false the planner leaves program and bank untouched.
    pub switch_instruments: bool,
}

impl PlanContext {
    fn base_name(&self) -> String {
        paths::stem_and_extension(&self.input).0
    }

    /// `<renderer> -o "<export>/<base>-<file name>.mp3" "<temp copy>"`
    pub fn audio_command(&self, file_name: &str, temp_copy: &Path) -> String {
        let output = self
            .export_dir
            .join(format!("{}.mp3", paths::variant_stem(&self.base_name(), file_name)));
        format!(
            "{} -o {} {}",
            self.renderer,
            quote_path(&output),
            quote_path(temp_copy)
        )
    }

    /// `<renderer> --export-score-parts -o "<export>/<base>.pdf" "<input>"`
    pub fn print_command(&self) -> String {
        let output = self.export_dir.join(format!("{}.pdf", self.base_name()));
        format!(
            "{} --export-score-parts -o {} {}",
            self.renderer,
            quote_path(&output),
            quote_path(&self.input)
        )
    }

    pub fn print_label(&self) -> String {
        format!("{}.pdf", self.base_name())
    }
}

fn quote_path(path: &Path) -> String {
    paths::shell_quote(&path.display().to_string())
}

pub struct VariantPlanner<'a> {
    ctx: &'a PlanContext,
    source: &'a dyn ScoreSource,
    sink: &'a mut dyn VariantSink,
    /// Lowercased file names handed out so far.
    file_names: HashSet<String>,
}

impl<'a> VariantPlanner<'a> {
    pub fn new(ctx: &'a PlanContext, source: &'a dyn ScoreSource, sink: &'a mut dyn VariantSink) -> Self {
        Self {
            ctx,
            source,
            sink,
            file_names: HashSet::new(),
        }
    }

    /// Build the full task list. On failure every temp copy written so far
    /// is removed before the error is returned.
    pub fn plan(&mut self, score: &mut Score) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(4 * score.voice_count() + 3);
        match self.plan_into(score, &mut tasks) {
            Ok(()) => Ok(tasks),
            Err(e) => {
                discard_temp_copies(&tasks);
                Err(e)
            }
        }
    }

    fn plan_into(&mut self, score: &mut Score, tasks: &mut Vec<Task>) -> Result<()> {
        log::info!(target: "plan", "preparing source files...");

        for index in 0..score.parts().len() {
            let (is_voice, name) = match score.part(index) {
                Some(part) => (part.is_voice(), part.long_name.clone()),
                None => continue,
            };
            if !is_voice {
                log::info!(target: "plan", "skipping instrument {}", name);
                continue;
            }

            self.switch(score, self.ctx.voice_sound);
            score.set_volumes(Some(index), MIX_FOCUS);
            tasks.push(self.emit(score, name.clone())?);

            score.set_volumes(Some(index), MIX_KARAOKE);
            tasks.push(self.emit(score, format!("{} (Karaoke)", name))?);

            score.set_volumes(Some(index), MIX_SOLO);
            tasks.push(self.emit(score, format!("{} (Solo)", name))?);

            self.switch(score, self.ctx.piano_sound);
            score.set_volumes(Some(index), MIX_PIANO);
            tasks.push(self.emit(score, format!("{} (Piano)", name))?);
        }

        self.switch(score, self.ctx.voice_sound);
        score.set_volumes(None, VolumeMix::FULL);
        tasks.push(self.emit(score, LABEL_ALL_MIX.to_string())?);

        self.switch(score, self.ctx.piano_sound);
        score.set_volumes(None, VolumeMix::FULL);
        tasks.push(self.emit(score, LABEL_ALL_PIANO.to_string())?);

        tasks.push(Task::new(self.ctx.print_label(), self.ctx.print_command(), None));
        Ok(())
    }

    fn switch(&self, score: &mut Score, sound: Sound) {
        if self.ctx.switch_instruments {
            score.assign_sound(sound);
        }
    }

    /// Sanitized `label`, numbered if an earlier task already uses that name.
    fn claim_file_name(&mut self, label: &str) -> String {
        let base = paths::sanitize_file_component(label);
        let mut name = base.clone();
        let mut n = 2;
        while !self.file_names.insert(name.to_lowercase()) {
            name = format!("{} ({})", base, n);
            n += 1;
        }
        name
    }

    /// Snapshot the current mixer state into a temp copy and describe its render.
    fn emit(&mut self, score: &Score, label: String) -> Result<Task> {
        let file_name = self.claim_file_name(&label);
        let snapshot = self.source.snapshot(score)?;
        let temp_copy = self.sink.write_variant(&file_name, &snapshot)?;
        let command = self.ctx.audio_command(&file_name, &temp_copy);
        log::debug!(target: "plan", "task {}: {}", label, command);
        Ok(Task::new(label, command, Some(temp_copy)))
    }
}

/// Remove the temp copies of tasks that will never be dispatched.
pub fn discard_temp_copies(tasks: &[Task]) {
    for path in tasks.iter().filter_map(|t| t.cleanup_path.as_ref()) {
        if let Err(e) = fs::remove_file(path) {
            log::debug!(target: "plan", "could not remove {}: {}", path.display(), e);
        }
    }
}
