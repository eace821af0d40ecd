//! One complete export run: open the score, plan every variant, render them.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use partexport_types::Task;

use crate::config::Settings;
use crate::container::{MsczContainer, ScoreSource};
use crate::dispatch::{DispatchReport, RenderRunner, TaskDispatcher};
use crate::error::{Result, ScoreError};
use crate::paths;
use crate::plan::{discard_temp_copies, PlanContext, VariantPlanner};
use crate::render::Renderer;
use crate::score::Score;

impl Settings {
    pub fn plan_context(&self, input: &Path) -> PlanContext {
        PlanContext {
            renderer: self.renderer.clone(),
            export_dir: self.export_dir.clone(),
            input: input.to_path_buf(),
            voice_sound: self.voice_sound,
            piano_sound: self.piano_sound,
            switch_instruments: self.switch_instruments,
        }
    }
}

/// Read `input`, then plan its variants, writing a temp copy for each.
/// Any failure here is fatal and leaves no temp copies behind. The source
/// copy in the export dir is only made once the score has been read.
pub fn prepare(input: &Path, settings: &Settings) -> Result<Vec<Task>> {
    if input.as_os_str().is_empty() {
        return Err(ScoreError::malformed("missing name of score file"));
    }

    let container = MsczContainer::open(input)?;
    let mut score = Score::build(container.document()?, &settings.voice_rules)?;
    log::info!(target: "score", "file version: {}", score.version());
    score.log_parts();

    fs::create_dir_all(&settings.work_dir)?;
    fs::create_dir_all(&settings.export_dir)?;

    if settings.copy_source {
        let (stem, ext) = paths::stem_and_extension(input);
        let target = settings.export_dir.join(format!("{}.{}", stem, ext));
        if !same_file(input, &target) {
            fs::copy(input, &target).map_err(|e| {
                ScoreError::malformed(format!("error reading file \"{}\": {}", input.display(), e))
            })?;
        }
    }

    let ctx = settings.plan_context(input);
    let mut writer = container.variant_writer(input, &settings.work_dir);
    VariantPlanner::new(&ctx, &container, &mut writer).plan(&mut score)
}

/// Full export: prepare, then dispatch in the configured mode.
pub fn run_export(input: &Path, settings: &Settings, renderer: Arc<dyn Renderer>) -> Result<DispatchReport> {
    let start = Instant::now();
    let tasks = prepare(input, settings)?;
    log::info!(
        target: "dispatch",
        "preparing '{}' ({} tasks)...",
        input.display(),
        tasks.len()
    );

    let dispatcher = TaskDispatcher::new(settings.mode, Arc::new(RenderRunner::new(renderer)));
    let report = dispatcher.run(tasks);
    log::info!(target: "dispatch", "export finished in {}s", start.elapsed().as_secs());
    Ok(report)
}

/// Plan only: returns the tasks that would run and removes their temp copies.
pub fn dry_run(input: &Path, settings: &Settings) -> Result<Vec<Task>> {
    let tasks = prepare(input, settings)?;
    discard_temp_copies(&tasks);
    Ok(tasks)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
