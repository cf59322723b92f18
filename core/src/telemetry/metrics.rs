use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Loop counters shared between the orchestrator and observers.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cycles_dispatched: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub results_discarded: u64,
    pub notifications_dispatched: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_dispatched(&self) {
        self.lock().cycles_dispatched += 1;
    }

    pub fn record_completed(&self) {
        self.lock().cycles_completed += 1;
    }

    pub fn record_error(&self) {
        self.lock().cycles_failed += 1;
    }

    pub fn record_discarded(&self) {
        self.lock().results_discarded += 1;
    }

    pub fn record_notification(&self) {
        self.lock().notifications_dispatched += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.lock()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = MetricsRecorder::new();
        metrics.record_dispatched();
        metrics.record_dispatched();
        metrics.record_error();
        metrics.record_notification();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_dispatched, 2);
        assert_eq!(snapshot.cycles_failed, 1);
        assert_eq!(snapshot.cycles_completed, 0);
        assert_eq!(snapshot.notifications_dispatched, 1);
    }
}
