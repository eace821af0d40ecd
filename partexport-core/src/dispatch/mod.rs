//! Task dispatch: runs the planner's task list to exhaustion, either strictly
//! in order on the calling thread or on a bounded pool of worker slots.
//!
//! There are no timeouts. A renderer call that never returns keeps its slot
//! busy forever and the run never finishes; that is accepted behavior.

mod pool;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use partexport_types::Task;

use crate::render::{execute_task, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Planner order on the calling thread.
    Serial,
    /// At most `max_workers` tasks running at once, completion order unspecified.
    Pooled { max_workers: usize },
}

impl ExecutionMode {
    pub fn max_workers(&self) -> usize {
        match self {
            ExecutionMode::Serial => 1,
            ExecutionMode::Pooled { max_workers } => (*max_workers).max(1),
        }
    }
}

/// Executes a single task. Must be callable from several threads at once.
pub trait TaskRunner: Send + Sync {
    fn run_task(&self, task: &Task);
}

/// Production runner: render through `renderer`, then clean up.
pub struct RenderRunner {
    renderer: Arc<dyn Renderer>,
}

impl RenderRunner {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }
}

impl TaskRunner for RenderRunner {
    fn run_task(&self, task: &Task) {
        execute_task(task, self.renderer.as_ref());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub slot: usize,
    pub label: String,
    pub elapsed: Duration,
    /// The runner panicked; the task still counts as done.
    pub panicked: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// In the order tasks finished.
    pub completions: Vec<Completion>,
    pub total: Duration,
}

impl DispatchReport {
    pub fn labels(&self) -> Vec<&str> {
        self.completions.iter().map(|c| c.label.as_str()).collect()
    }
}

pub struct TaskDispatcher {
    mode: ExecutionMode,
    runner: Arc<dyn TaskRunner>,
}

impl TaskDispatcher {
    pub fn new(mode: ExecutionMode, runner: Arc<dyn TaskRunner>) -> Self {
        Self { mode, runner }
    }

    /// Run every task exactly once and block until all have finished.
    pub fn run(&self, tasks: Vec<Task>) -> DispatchReport {
        let start = Instant::now();
        let count = tasks.len();
        log::info!(target: "dispatch", "running {} tasks ({:?})", count, self.mode);

        let completions = match self.mode {
            ExecutionMode::Serial => run_serial(tasks, self.runner.as_ref()),
            ExecutionMode::Pooled { .. } => {
                pool::run_pooled(tasks, self.mode.max_workers(), Arc::clone(&self.runner))
            }
        };

        let total = start.elapsed();
        if completions.len() != count {
            log::error!(
                target: "dispatch",
                "{} of {} tasks did not run",
                count - completions.len(),
                count
            );
        }
        log::info!(target: "dispatch", "[ready] total time: {}s", total.as_secs());
        DispatchReport { completions, total }
    }
}

/// Run one task, turning a panic into a flag.
fn run_guarded(runner: &dyn TaskRunner, task: &Task) -> bool {
    let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run_task(task)));
    if result.is_err() {
        log::error!(target: "dispatch", "task {} panicked", task.label);
    }
    result.is_err()
}

fn run_serial(tasks: Vec<Task>, runner: &dyn TaskRunner) -> Vec<Completion> {
    tasks
        .into_iter()
        .map(|task| {
            log::info!(target: "dispatch", "{}...", task.label);
            let started = Instant::now();
            let panicked = run_guarded(runner, &task);
            let elapsed = started.elapsed();
            log::info!(target: "dispatch", "{} [finished] ({}s)", task.label, elapsed.as_secs());
            Completion {
                slot: 0,
                label: task.label,
                elapsed,
                panicked,
            }
        })
        .collect()
}
