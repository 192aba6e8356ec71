use crate::counter::IterationCounter;
use crate::workload::Workload;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// What one worker did during a level
#[derive(Debug)]
pub struct WorkerOutcome {
    pub worker_id: usize,
    pub iterations: u64,
    /// Error returned by the workload, which ended this worker early
    pub error: Option<anyhow::Error>,
}

/// Runs one workload inside one logical worker for a fixed wall-clock window.
pub struct TimedWorker<'a> {
    workload: &'a dyn Workload,
    worker_id: usize,
    duration: Duration,
}

impl<'a> TimedWorker<'a> {
    pub fn new(workload: &'a dyn Workload, worker_id: usize, duration: Duration) -> Self {
        Self {
            workload,
            worker_id,
            duration,
        }
    }

    /// Call `run_once` until the deadline passes, an error occurs, or `stop` is raised.
    ///
    /// The deadline is checked between iterations only: a call that is in flight
    /// when the window closes is allowed to finish and is counted. The local count
    /// is added to `counter` once, on the way out.
    pub fn run(self, counter: &IterationCounter, stop: &AtomicBool) -> WorkerOutcome {
        let deadline = Instant::now() + self.duration;
        let mut iterations: u64 = 0;
        let mut error = None;

        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
            if let Err(e) = self.workload.run_once(self.worker_id) {
                error = Some(e);
                break;
            }
            iterations += 1;
        }

        counter.add(iterations);

        tracing::debug!(
            worker_id = self.worker_id,
            iterations,
            failed = error.is_some(),
            "Worker finished"
        );

        WorkerOutcome {
            worker_id: self.worker_id,
            iterations,
            error,
        }
    }
}
