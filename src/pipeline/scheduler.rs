//! Frame scheduling with keep-latest backpressure
//!
//! The camera offers frames from its own thread at whatever rate it runs.
//! One worker thread takes frames out of a single-slot intake and awaits each
//! recognition before taking the next, so at most one recognition is in
//! flight. A frame offered while another still waits in the slot replaces it,
//! and the replaced frame is released unprocessed.
//!
//! Release hooks never run under the intake lock.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::capture::frame::Frame;
use crate::pipeline::dispatcher::{DispatchOutcome, RecognitionDispatcher};

/// Lifecycle of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Created, worker not started
    Idle,
    /// Accepting and dispatching frames
    Running,
    /// Releasing every offered frame without processing
    Paused,
    /// Terminal; nothing is accepted
    ShutDown,
}

/// What happened to an offered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Placed in the empty slot
    Queued,
    /// Placed in the slot; the frame waiting there was released
    Replaced,
    /// Released immediately because the pipeline is paused
    DroppedPaused,
    /// Released immediately because the pipeline is idle or shut down
    Rejected,
}

/// Frame counters since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Frames offered by the producer
    pub delivered: u64,
    /// Frames handed to the dispatcher
    pub dispatched: u64,
    /// Frames released because a newer frame took their slot
    pub replaced: u64,
    /// Frames released while paused (including a slot cleared by `pause`)
    pub dropped_paused: u64,
    /// Frames released because the pipeline was idle or shut down
    pub rejected: u64,
}

struct Intake {
    state: PipelineState,
    pending: Option<Frame>,
    stats: SchedulerStats,
}

struct Shared {
    intake: Mutex<Intake>,
    wake: Condvar,
}

/// Single-worker frame scheduler
pub struct FrameScheduler {
    shared: Arc<Shared>,
    /// Dispatcher waiting for `start`
    dispatcher: Mutex<Option<RecognitionDispatcher>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FrameScheduler {
    /// Create an idle scheduler around `dispatcher`
    pub fn new(dispatcher: RecognitionDispatcher) -> Self {
        let cancel = dispatcher.cancellation_token();
        Self {
            shared: Arc::new(Shared {
                intake: Mutex::new(Intake {
                    state: PipelineState::Idle,
                    pending: None,
                    stats: SchedulerStats::default(),
                }),
                wake: Condvar::new(),
            }),
            dispatcher: Mutex::new(Some(dispatcher)),
            cancel,
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker thread and start accepting frames
    pub fn start(&self) -> Result<()> {
        let Some(dispatcher) = self.dispatcher.lock().take() else {
            anyhow::bail!("Frame scheduler was already started");
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create scheduler runtime")?;

        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("frame-scheduler".to_string())
            .spawn(move || run_worker(shared, dispatcher, runtime))
            .context("Failed to spawn scheduler worker")?;

        *self.worker.lock() = Some(handle);

        let mut intake = self.shared.intake.lock();
        if intake.state == PipelineState::Idle {
            intake.state = PipelineState::Running;
            info!("Frame scheduler running");
        }
        Ok(())
    }

    /// Hand a frame to the scheduler. Never blocks on recognition.
    pub fn offer(&self, frame: Frame) -> Admission {
        let frame_id = frame.id();
        let mut intake = self.shared.intake.lock();
        intake.stats.delivered += 1;

        let (admission, released) = match intake.state {
            PipelineState::Idle | PipelineState::ShutDown => {
                intake.stats.rejected += 1;
                (Admission::Rejected, Some(frame))
            }
            PipelineState::Paused => {
                intake.stats.dropped_paused += 1;
                (Admission::DroppedPaused, Some(frame))
            }
            PipelineState::Running => match intake.pending.replace(frame) {
                Some(previous) => {
                    intake.stats.replaced += 1;
                    (Admission::Replaced, Some(previous))
                }
                None => (Admission::Queued, None),
            },
        };
        drop(intake);

        if matches!(admission, Admission::Queued | Admission::Replaced) {
            self.shared.wake.notify_one();
        }
        if let Some(frame) = released {
            trace!("Frame {} offered ({:?}), releasing frame {}", frame_id, admission, frame.id());
            frame.release();
        }
        admission
    }

    /// Stop intake. A frame waiting in the slot is released; an in-flight
    /// recognition keeps running. Returns false unless the pipeline was running.
    pub fn pause(&self) -> bool {
        let mut intake = self.shared.intake.lock();
        if intake.state != PipelineState::Running {
            return false;
        }
        intake.state = PipelineState::Paused;
        let pending = intake.pending.take();
        if pending.is_some() {
            intake.stats.dropped_paused += 1;
        }
        drop(intake);

        info!("Frame scheduler paused");
        drop(pending);
        true
    }

    /// Resume intake. Returns false unless the pipeline was paused.
    pub fn resume(&self) -> bool {
        let mut intake = self.shared.intake.lock();
        if intake.state != PipelineState::Paused {
            return false;
        }
        intake.state = PipelineState::Running;
        drop(intake);

        info!("Frame scheduler resumed");
        true
    }

    /// Flip between running and paused, returning the resulting state
    pub fn toggle_pause(&self) -> PipelineState {
        if !self.pause() {
            self.resume();
        }
        self.state()
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.shared.intake.lock().state
    }

    /// Snapshot of the frame counters
    pub fn stats(&self) -> SchedulerStats {
        self.shared.intake.lock().stats
    }

    /// True once the worker thread has exited (or was never started)
    pub fn is_worker_finished(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Stop accepting frames and let the worker wind down.
    ///
    /// Does not wait for an in-flight recognition: it completes on the
    /// detached worker, its result is discarded and its frame still released.
    pub fn shutdown(&self) {
        let mut intake = self.shared.intake.lock();
        if intake.state == PipelineState::ShutDown {
            return;
        }
        intake.state = PipelineState::ShutDown;
        let pending = intake.pending.take();
        if pending.is_some() {
            intake.stats.rejected += 1;
        }
        let stats = intake.stats;
        drop(intake);

        self.cancel.cancel();
        self.shared.wake.notify_all();
        drop(pending);

        // Never started: drop the dispatcher so its services are released too
        self.dispatcher.lock().take();

        info!(
            "Frame scheduler shut down: {} delivered, {} dispatched, {} replaced, {} dropped while paused, {} rejected",
            stats.delivered, stats.dispatched, stats.replaced, stats.dropped_paused, stats.rejected
        );
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker loop: take the latest frame, await its recognition, repeat
fn run_worker(shared: Arc<Shared>, dispatcher: RecognitionDispatcher, runtime: Runtime) {
    debug!("Frame scheduler worker started");

    while let Some(frame) = next_frame(&shared) {
        let frame_id = frame.id();
        trace!("Dispatching frame {}", frame_id);

        match runtime.block_on(dispatcher.submit(frame)) {
            DispatchOutcome::Delivered(recognition) => {
                trace!("Frame {} delivered amount {}", frame_id, recognition.amount.value());
            }
            DispatchOutcome::Discarded(_) => debug!("Frame {} finished after shutdown", frame_id),
            DispatchOutcome::Malformed | DispatchOutcome::Failed => {
                trace!("Frame {} produced no result", frame_id);
            }
        }
    }

    if !dispatcher.cancellation_token().is_cancelled() {
        warn!("Frame scheduler worker exiting without shutdown");
    }
    debug!("Frame scheduler worker stopped");
}

/// Block until a frame is ready to dispatch; `None` once shut down
fn next_frame(shared: &Shared) -> Option<Frame> {
    let mut intake = shared.intake.lock();
    loop {
        match intake.state {
            PipelineState::ShutDown => return None,
            PipelineState::Running => {
                if let Some(frame) = intake.pending.take() {
                    intake.stats.dispatched += 1;
                    return Some(frame);
                }
            }
            PipelineState::Idle | PipelineState::Paused => {}
        }
        shared.wake.wait(&mut intake);
    }
}
