//! Bounded worker pool.
//!
//! The control loop below is the only code that advances the task cursor.
//! Each slot owns one worker thread fed through its own job channel; all
//! workers report on a shared completion channel, which the loop blocks on
//! between passes.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use partexport_types::Task;

use super::{run_guarded, Completion, TaskRunner};

#[derive(Debug)]
enum SlotState {
    Idle,
    Running { label: String, started: Instant },
    Retired,
}

struct Finished {
    slot: usize,
    panicked: bool,
}

struct Slot {
    index: usize,
    state: SlotState,
    job_tx: Option<Sender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl Slot {
    fn new(index: usize) -> Self {
        Self {
            index,
            state: SlotState::Idle,
            job_tx: None,
            handle: None,
        }
    }

    fn is_retired(&self) -> bool {
        matches!(self.state, SlotState::Retired)
    }

    /// Hand `task` to this slot's worker, spawning it on first use.
    /// Gives the task back if the worker is gone.
    fn start(
        &mut self,
        task: Task,
        runner: &Arc<dyn TaskRunner>,
        done_tx: &Sender<Finished>,
    ) -> Result<(), Task> {
        if self.job_tx.is_none() {
            let (tx, rx) = crossbeam_channel::unbounded();
            self.handle = Some(spawn_worker(self.index, rx, Arc::clone(runner), done_tx.clone()));
            self.job_tx = Some(tx);
        }

        let label = task.label.clone();
        match &self.job_tx {
            Some(tx) => tx.send(task).map_err(|e| e.into_inner())?,
            None => return Err(task),
        }
        log::debug!(target: "dispatch", "slot {} running {}", self.index, label);
        self.state = SlotState::Running {
            label,
            started: Instant::now(),
        };
        Ok(())
    }

    /// Close the job channel and wait for the (idle) worker to exit.
    fn retire(&mut self) {
        self.state = SlotState::Retired;
        self.job_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!(target: "dispatch", "worker {} exited abnormally", self.index);
            }
        }
    }
}

fn spawn_worker(
    slot: usize,
    jobs: Receiver<Task>,
    runner: Arc<dyn TaskRunner>,
    done_tx: Sender<Finished>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for task in jobs.iter() {
            let panicked = run_guarded(runner.as_ref(), &task);
            if done_tx.send(Finished { slot, panicked }).is_err() {
                break;
            }
        }
    })
}

pub(super) fn run_pooled(tasks: Vec<Task>, max_workers: usize, runner: Arc<dyn TaskRunner>) -> Vec<Completion> {
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<Finished>();
    let mut slots: Vec<Slot> = (0..max_workers.max(1)).map(Slot::new).collect();
    let mut pending = tasks.into_iter();
    let mut next: Option<Task> = pending.next();
    let mut completions = Vec::new();

    loop {
        for slot in slots.iter_mut() {
            if !matches!(slot.state, SlotState::Idle) {
                continue;
            }
            match next.take() {
                Some(task) => match slot.start(task, &runner, &done_tx) {
                    Ok(()) => next = pending.next(),
                    Err(task) => {
                        log::error!(target: "dispatch", "worker {} is gone, retiring slot", slot.index);
                        next = Some(task);
                        slot.retire();
                    }
                },
                // Nothing left to claim.
                None => slot.retire(),
            }
        }

        if slots.iter().all(Slot::is_retired) {
            break;
        }

        let finished = match done_rx.recv() {
            Ok(f) => f,
            Err(_) => break,
        };
        let slot = &mut slots[finished.slot];
        let state = std::mem::replace(&mut slot.state, SlotState::Idle);
        if let SlotState::Running { label, started } = state {
            let elapsed = started.elapsed();
            log::info!(target: "dispatch", "finished: {} ({}s)", label, elapsed.as_secs());
            completions.push(Completion {
                slot: finished.slot,
                label,
                elapsed,
                panicked: finished.panicked,
            });
        }
        if next.is_none() {
            slot.retire();
        }
    }

    // Only reachable with tasks left when every worker died.
    if let Some(task) = next {
        log::error!(target: "dispatch", "not dispatched: {}", task.label);
        for task in pending {
            log::error!(target: "dispatch", "not dispatched: {}", task.label);
        }
    }
    completions
}
