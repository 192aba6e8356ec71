use crate::config::FailurePolicy;
use crate::counter::IterationCounter;
use crate::error::{BenchError, Result};
use crate::worker::{TimedWorker, WorkerOutcome};
use crate::workload::Workload;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Aggregated outcome of one fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTally {
    pub total_iterations: u64,
    /// Workers that stopped early on a tolerated error
    pub failed_workers: usize,
}

/// Launches N timed workers in parallel and waits for all of them.
#[derive(Debug, Default)]
pub struct FanOut {
    counter: IterationCounter,
    policy: FailurePolicy,
}

impl FanOut {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            counter: IterationCounter::new(),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run `worker_count` workers with ids `0..worker_count` for `duration` each.
    ///
    /// Every worker is spawned before any of them starts working. Under
    /// [`FailurePolicy::AbortLevel`] the first failure stops the others and the
    /// partial count is discarded.
    pub fn run(
        &self,
        name: &str,
        workload: &dyn Workload,
        worker_count: usize,
        duration: Duration,
    ) -> Result<LevelTally> {
        self.counter.reset();

        let stop = AtomicBool::new(false);
        let gate = StartGate::new();
        let abort_on_error = self.policy == FailurePolicy::AbortLevel;

        let joined = thread::scope(|s| {
            let mut handles = Vec::with_capacity(worker_count);

            for worker_id in 0..worker_count {
                let (counter, stop, gate) = (&self.counter, &stop, &gate);

                let spawned = thread::Builder::new()
                    .name(format!("worker-{}", worker_id))
                    .spawn_scoped(s, move || {
                        if !gate.wait() {
                            return None;
                        }

                        let _guard = StopOnPanic(stop);
                        let outcome =
                            TimedWorker::new(workload, worker_id, duration).run(counter, stop);

                        if outcome.error.is_some() && abort_on_error {
                            stop.store(true, Ordering::Relaxed);
                        }
                        Some(outcome)
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        gate.release(false);
                        for handle in handles {
                            let _ = handle.join();
                        }
                        return Err(BenchError::Spawn(e));
                    }
                }
            }

            gate.release(true);

            Ok(handles
                .into_iter()
                .enumerate()
                .map(|(worker_id, handle)| (worker_id, handle.join()))
                .collect::<Vec<_>>())
        })?;

        let mut failed_workers = 0;
        let mut level_error: Option<BenchError> = None;

        for (worker_id, joined) in joined {
            match joined {
                Err(_) => {
                    if !matches!(level_error, Some(BenchError::WorkerPanicked { .. })) {
                        level_error = Some(BenchError::WorkerPanicked {
                            workload: name.to_string(),
                            worker_id,
                        });
                    }
                }
                Ok(Some(WorkerOutcome {
                    error: Some(err), ..
                })) => {
                    failed_workers += 1;
                    if abort_on_error {
                        level_error.get_or_insert_with(|| {
                            BenchError::operation(name, worker_id, &err)
                        });
                    } else {
                        tracing::warn!(
                            workload = name,
                            worker_id,
                            error = %format!("{:#}", err),
                            "Worker stopped early"
                        );
                    }
                }
                Ok(_) => {}
            }
        }

        if let Some(err) = level_error {
            self.counter.reset();
            return Err(err);
        }

        Ok(LevelTally {
            total_iterations: self.counter.take(),
            failed_workers,
        })
    }
}

/// Holds spawned workers until the whole level is ready to start.
struct StartGate {
    state: Mutex<Option<bool>>,
    cv: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    /// Blocks until released; returns whether the worker should run.
    fn wait(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if let Some(go) = *state {
                return go;
            }
            self.cv.wait(&mut state);
        }
    }

    fn release(&self, go: bool) {
        *self.state.lock() = Some(go);
        self.cv.notify_all();
    }
}

/// Raises the stop flag if the worker unwinds, so its peers do not run out the clock.
struct StopOnPanic<'a>(&'a AtomicBool);

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}
