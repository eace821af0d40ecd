//! External renderer: runs one command line synchronously and hands back
//! its textual result. The output is reported, never judged.

use std::fs;
use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;

use partexport_types::Task;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not start renderer: {0}")]
    Spawn(#[from] io::Error),
}

pub trait Renderer: Send + Sync {
    /// Run `command` to completion. `Err` means it did not run at all.
    fn run(&self, command: &str) -> Result<String, RenderError>;
}

/// Runs commands through the platform shell, so the quoting produced by the
/// planner's command templates is interpreted the usual way.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRenderer;

impl ShellRenderer {
    fn shell(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

impl Renderer for ShellRenderer {
    fn run(&self, command: &str) -> Result<String, RenderError> {
        let output = Self::shell(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            log::debug!(
                target: "render",
                "renderer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(last_line(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Last non-empty line of `text`, trimmed.
fn last_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("")
        .to_string()
}

/// Render one task, then delete its temp copy whatever the renderer did.
pub fn execute_task(task: &Task, renderer: &dyn Renderer) {
    log::debug!(target: "render", "run {}", task.label);
    match renderer.run(&task.command) {
        Ok(result) => log::info!(target: "render", "{}: result: {}", task.label, result),
        Err(e) => log::warn!(target: "render", "{}: {}", task.label, e),
    }

    if let Some(path) = &task.cleanup_path {
        if let Err(e) = fs::remove_file(path) {
            log::debug!(target: "render", "could not remove {}: {}", path.display(), e);
        }
    }
}
