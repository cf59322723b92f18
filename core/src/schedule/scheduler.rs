//! Countdown then fixed-cadence capture ticks, gated by a generation number.

use log::{debug, info};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::prelude::ScheduleConfig;

/// Receives the scheduler's ticks. Called with the scheduler's lock held,
/// so implementations must return quickly (e.g. push onto a queue).
pub trait SchedulerDelegate: Send + Sync + 'static {
    fn on_countdown_complete(&self);

    fn on_photo_capture(&self, photos_taken: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Countdown,
    Capturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleSnapshot {
    pub phase: Phase,
    pub seconds_remaining: u32,
    pub photos_taken: u64,
    pub is_running: bool,
}

#[derive(Debug)]
struct CycleState {
    snapshot: ScheduleSnapshot,
    generation: u64,
}

fn lock(state: &Mutex<CycleState>) -> MutexGuard<'_, CycleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only view on the scheduler for observers.
#[derive(Clone)]
pub struct ScheduleObserver {
    state: Arc<Mutex<CycleState>>,
}

impl ScheduleObserver {
    pub fn snapshot(&self) -> ScheduleSnapshot {
        lock(&self.state).snapshot
    }
}

pub struct CaptureScheduler {
    config: ScheduleConfig,
    state: Arc<Mutex<CycleState>>,
    task: Option<JoinHandle<()>>,
}

impl CaptureScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        let snapshot = ScheduleSnapshot {
            phase: Phase::Idle,
            seconds_remaining: config.countdown_secs,
            photos_taken: 0,
            is_running: false,
        };
        Self {
            config,
            state: Arc::new(Mutex::new(CycleState {
                snapshot,
                generation: 0,
            })),
            task: None,
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        lock(&self.state).snapshot
    }

    pub fn observer(&self) -> ScheduleObserver {
        ScheduleObserver {
            state: self.state.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).snapshot.is_running
    }

    /// Starts (or restarts) the countdown. Must be called inside a Tokio runtime.
    pub fn start<D: SchedulerDelegate>(&mut self, delegate: D) {
        self.cancel_task();
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.snapshot = ScheduleSnapshot {
                phase: Phase::Countdown,
                seconds_remaining: self.config.countdown_secs,
                photos_taken: 0,
                is_running: true,
            };
            state.generation
        };
        info!(
            "capture countdown started: {}s, then every {:?}",
            self.config.countdown_secs,
            self.config.capture_interval()
        );

        let state = self.state.clone();
        let config = self.config.clone();
        self.task = Some(tokio::spawn(drive(state, generation, config, delegate)));
    }

    /// Cancels both timers. Counters stay as they were for display.
    pub fn stop(&mut self) {
        self.cancel_task();
        let mut state = lock(&self.state);
        state.generation += 1;
        if state.snapshot.is_running {
            info!("capture stopped after {} photos", state.snapshot.photos_taken);
        }
        state.snapshot.phase = Phase::Idle;
        state.snapshot.is_running = false;
    }

    /// `stop` plus zeroed counters.
    pub fn reset(&mut self) {
        self.stop();
        let mut state = lock(&self.state);
        state.snapshot.seconds_remaining = self.config.countdown_secs;
        state.snapshot.photos_taken = 0;
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

async fn drive<D: SchedulerDelegate>(
    state: Arc<Mutex<CycleState>>,
    generation: u64,
    config: ScheduleConfig,
    delegate: D,
) {
    let step = config.countdown_tick();
    let mut countdown = time::interval_at(Instant::now() + step, step);
    loop {
        {
            let mut guard = lock(&state);
            if guard.generation != generation {
                return;
            }
            if guard.snapshot.seconds_remaining == 0 {
                guard.snapshot.phase = Phase::Capturing;
                guard.snapshot.photos_taken = 0;
                delegate.on_countdown_complete();
                break;
            }
        }
        countdown.tick().await;
        let mut guard = lock(&state);
        if guard.generation != generation {
            return;
        }
        guard.snapshot.seconds_remaining = guard.snapshot.seconds_remaining.saturating_sub(1);
        debug!("countdown {}", guard.snapshot.seconds_remaining);
    }
    drop(countdown);
    info!("countdown complete, capturing every {:?}", config.capture_interval());

    let period = config.capture_interval();
    let mut capture = time::interval_at(Instant::now() + period, period);
    loop {
        capture.tick().await;
        let mut guard = lock(&state);
        if guard.generation != generation {
            return;
        }
        guard.snapshot.photos_taken += 1;
        let photos_taken = guard.snapshot.photos_taken;
        debug!("capture tick {}", photos_taken);
        delegate.on_photo_capture(photos_taken);
    }
}
