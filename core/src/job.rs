//! The single global job slot and its lifecycle.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex,
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::error::{WordbreakError, WordbreakResult};

/// The lifecycle of the single search job.
///
/// `Idle → Running → {Found, Exhausted, TimedOut, Stopped} → Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Found,
    Exhausted,
    TimedOut,
    Stopped,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A read-only snapshot of the running (or last finished) job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub running: bool,
    /// Candidates hashed so far. Monotonically non-decreasing while the
    /// job runs, frozen once it terminates.
    pub tested: u64,
    /// Upper bound of the candidate space (words × rules, dedup can only
    /// shrink it).
    pub total: u64,
    /// Progress in percent, 0 to 100.
    pub progress: f64,
    pub elapsed: Duration,
}

#[derive(Default)]
struct JobInner {
    state: JobState,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// Owns the single global job slot: at most one search may be running
/// system-wide, and a second `start` fails fast with `AlreadyRunning`.
///
/// Counters are atomics so [`JobController::status`] is a lock-free
/// snapshot, safe to call concurrently with the running loop.
#[derive(Default)]
pub struct JobController {
    running: AtomicBool,
    stop: AtomicBool,
    tested: AtomicU64,
    total: AtomicU64,
    inner: Mutex<JobInner>,
}

impl JobController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims the job slot.
    ///
    /// The compare-and-set either claims the slot or fails without
    /// touching anything, so a rejected `start` can never disturb the
    /// job that is already running.
    pub(crate) fn acquire(&self, total: u64) -> WordbreakResult<()> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WordbreakError::AlreadyRunning)?;

        self.stop.store(false, Ordering::Release);
        self.tested.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);

        let mut inner = self.inner.lock().expect("job slot poisoned");
        inner.state = JobState::Running;
        inner.started_at = Some(Instant::now());
        inner.finished_at = None;

        Ok(())
    }

    /// Releases the slot. Called on every exit path of the search task,
    /// whatever the termination reason.
    pub(crate) fn release(&self) {
        let mut inner = self.inner.lock().expect("job slot poisoned");
        inner.state = JobState::Idle;
        inner.finished_at = Some(Instant::now());
        drop(inner);

        self.running.store(false, Ordering::Release);
    }

    /// Records one more hashed candidate.
    pub(crate) fn record_tested(&self) -> u64 {
        self.tested.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn tested(&self) -> u64 {
        self.tested.load(Ordering::Acquire)
    }

    /// Requests cooperative cancellation. The flag is observed at batch
    /// boundaries and in the innermost per-candidate loop; it does not
    /// preempt an in-flight hash computation.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Takes a snapshot of the job. Counters of a finished job stay
    /// readable until the next `start` resets them.
    pub fn status(&self) -> JobStatus {
        let running = self.is_running();
        let tested = self.tested.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);

        let progress = if total == 0 {
            0.
        } else {
            (tested as f64 / total as f64 * 100.).min(100.)
        };

        let inner = self.inner.lock().expect("job slot poisoned");
        let elapsed = match (inner.started_at, inner.finished_at) {
            (Some(started), Some(finished)) => finished.duration_since(started),
            (Some(started), None) => started.elapsed(),
            _ => Duration::ZERO,
        };

        JobStatus {
            running,
            tested,
            total,
            progress,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let controller = JobController::new();

        controller.acquire(10).unwrap();
        assert!(matches!(
            controller.acquire(10),
            Err(WordbreakError::AlreadyRunning)
        ));

        controller.release();
        controller.acquire(10).unwrap();
    }

    #[test]
    fn test_rejected_acquire_leaves_counters_alone() {
        let controller = JobController::new();

        controller.acquire(10).unwrap();
        controller.record_tested();
        controller.record_tested();

        assert!(controller.acquire(99).is_err());

        let status = controller.status();
        assert_eq!(2, status.tested);
        assert_eq!(10, status.total);
    }

    #[test]
    fn test_status_snapshot() {
        let controller = JobController::new();

        let idle = controller.status();
        assert!(!idle.running);
        assert_eq!(0., idle.progress);

        controller.acquire(4).unwrap();
        controller.record_tested();

        let status = controller.status();
        assert!(status.running);
        assert_eq!(1, status.tested);
        assert_eq!(25., status.progress);
    }

    #[test]
    fn test_counters_survive_release() {
        let controller = JobController::new();

        controller.acquire(2).unwrap();
        controller.record_tested();
        controller.release();

        let status = controller.status();
        assert!(!status.running);
        assert_eq!(1, status.tested);

        // the next start resets them
        controller.acquire(5).unwrap();
        assert_eq!(0, controller.status().tested);
    }

    #[test]
    fn test_stop_flag() {
        let controller = JobController::new();

        controller.acquire(1).unwrap();
        assert!(!controller.stop_requested());

        controller.stop();
        assert!(controller.stop_requested());

        // a new job starts with a clear flag
        controller.release();
        controller.acquire(1).unwrap();
        assert!(!controller.stop_requested());
    }
}
