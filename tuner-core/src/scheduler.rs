//! # Tuning Loop Scheduler
//!
//! Runs the analysis cycle on a dedicated worker thread. The cycle is a
//! task that re-enqueues itself after a short delay for as long as the
//! running flag is set. Stopping just clears the flag: the next cycle sees it,
//! does nothing, and does not reschedule. Starting sets the flag and kicks
//! off the first cycle.
//!
//! ## Architecture
//! - **Worker thread**: owns the audio source, the pipeline and the verdict board
//! - **Control channel**: `Start` / `Shutdown` messages from the display
//! - **Update channel**: one [`VerdictUpdate`] per matched string

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::audio::AudioSource;
use crate::config::TunerConfig;
use crate::error::Result;
use crate::pipeline::{CycleOutcome, Pipeline};
use crate::state::{RunningFlag, VerdictBoard, VerdictUpdate};

/// Messages from the display to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Run a cycle now and keep rescheduling while the flag is set.
    Start,
    /// Leave the loop and release the audio source.
    Shutdown,
}

/// Handle held by the display to drive the tuning loop.
#[derive(Debug)]
pub struct TunerHandle {
    control: Sender<Control>,
    updates: Receiver<VerdictUpdate>,
    running: RunningFlag,
    /// Set while the worker is inside a cycle.
    busy: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TunerHandle {
    /// Sets the running flag and triggers the first cycle.
    ///
    /// The flag is cleared again if the worker has already exited.
    pub fn start(&self) {
        self.running.set(true);
        if self.control.send(Control::Start).is_err() {
            log::error!("[SCHEDULER] Tuning loop is gone, cannot start");
            self.running.set(false);
        }
    }

    /// Clears the running flag. A cycle already capturing finishes first.
    pub fn stop(&self) {
        self.running.set(false);
    }

    /// Flips between running and stopped, returning the new state.
    pub fn toggle(&self) -> bool {
        if self.is_running() {
            self.stop();
            false
        } else {
            self.start();
            self.is_running()
        }
    }

    /// True while the flag is set and the worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.running.is_running()
            && self
                .thread_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// True while a cycle is in progress, including one that was already
    /// capturing when [`TunerHandle::stop`] was called. Once this reads
    /// false, every update from finished cycles is in the update channel.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Collects every update produced since the last call.
    pub fn drain_updates(&self) -> Vec<VerdictUpdate> {
        self.updates.try_iter().collect()
    }

    /// Receiver of verdict updates, for callers that want to block.
    pub fn updates(&self) -> &Receiver<VerdictUpdate> {
        &self.updates
    }

    /// Stops the loop and waits for the worker to exit.
    pub fn shutdown(&mut self) {
        self.running.set(false);
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            log::info!("[SCHEDULER] Waiting for tuning thread to finish...");
            if handle.join().is_err() {
                log::error!("[SCHEDULER] Tuning thread panicked");
            }
        }
    }
}

impl Drop for TunerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns the tuning loop.
///
/// The configuration is validated here, so a bad cutoff or reference table
/// fails before any thread starts. The audio source is opened on the worker
/// thread by `open_source`, because device streams are not always `Send`.
/// The loop stays idle until [`TunerHandle::start`].
pub fn spawn<S, F>(config: TunerConfig, open_source: F) -> Result<TunerHandle>
where
    S: AudioSource + 'static,
    F: FnOnce(&TunerConfig) -> anyhow::Result<S> + Send + 'static,
{
    let pipeline = Pipeline::new(config)?;
    let running = RunningFlag::new();
    let (control_tx, control_rx) = crossbeam_channel::unbounded();
    let (update_tx, update_rx) = crossbeam_channel::unbounded();

    let busy = Arc::new(AtomicBool::new(false));
    let worker_flag = running.clone();
    let worker_busy = busy.clone();
    let thread_handle = thread::Builder::new()
        .name("tuning-loop".to_string())
        .spawn(move || {
            log::info!("[SCHEDULER] Starting tuning thread...");
            let mut source = match open_source(pipeline.config()) {
                Ok(source) => source,
                Err(e) => {
                    log::error!("[SCHEDULER] Fatal error opening audio source: {:#}", e);
                    return;
                }
            };
            run_loop(
                &pipeline,
                &mut source,
                &worker_flag,
                &worker_busy,
                &control_rx,
                &update_tx,
            );
            log::info!("[SCHEDULER] Tuning thread finished");
        })?;

    Ok(TunerHandle {
        control: control_tx,
        updates: update_rx,
        running,
        busy,
        thread_handle: Some(thread_handle),
    })
}

/// The event loop: wait for a control message or the reschedule timer, then
/// run a cycle if one is due.
fn run_loop(
    pipeline: &Pipeline,
    source: &mut dyn AudioSource,
    running: &RunningFlag,
    busy: &AtomicBool,
    control: &Receiver<Control>,
    updates: &Sender<VerdictUpdate>,
) {
    let delay = pipeline.config().reschedule_delay();
    let mut board = VerdictBoard::new(&pipeline.config().references);
    let mut scheduled = false;

    loop {
        match next_event(control, scheduled, delay) {
            Event::Control(Control::Start) => scheduled = true,
            Event::Control(Control::Shutdown) | Event::Disconnected => break,
            Event::Timer => {}
        }
        if !scheduled {
            continue;
        }

        busy.store(true, Ordering::SeqCst);
        let outcome = pipeline.run_cycle(source, running, &mut board);
        scheduled = outcome.reschedule();
        let delivered = match outcome {
            CycleOutcome::Updated(update) => updates.send(update).is_ok(),
            CycleOutcome::Stopped => {
                log::info!("[SCHEDULER] Tuning stopped");
                true
            }
            CycleOutcome::NoDetection | CycleOutcome::Skipped(_) => true,
        };
        busy.store(false, Ordering::SeqCst);
        if !delivered {
            log::warn!("[SCHEDULER] Display went away, leaving loop");
            break;
        }
    }
}

enum Event {
    Control(Control),
    Timer,
    Disconnected,
}

fn next_event(control: &Receiver<Control>, scheduled: bool, delay: Duration) -> Event {
    if scheduled {
        match control.recv_timeout(delay) {
            Ok(msg) => Event::Control(msg),
            Err(RecvTimeoutError::Timeout) => Event::Timer,
            Err(RecvTimeoutError::Disconnected) => Event::Disconnected,
        }
    } else {
        match control.recv() {
            Ok(msg) => Event::Control(msg),
            Err(_) => Event::Disconnected,
        }
    }
}
