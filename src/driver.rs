use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::fanout::FanOut;
use crate::report::{LevelResult, ResultAggregator, WorkloadSummary};
use crate::workload::{RegisteredWorkload, Workload};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Lifecycle of one workload inside a scaling run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadPhase {
    Pending,
    Resetting { level: usize },
    Running { level: usize },
    Complete,
    Failed,
}

impl WorkloadPhase {
    /// Whether `next` is a legal successor. There are no backward or retry transitions.
    pub fn can_advance_to(&self, next: &WorkloadPhase) -> bool {
        use WorkloadPhase::*;
        match (self, next) {
            (Pending, Resetting { .. }) => true,
            (Resetting { level: a }, Running { level: b }) => a == b,
            (Running { .. }, Resetting { .. }) => true,
            (Running { .. }, Complete) => true,
            (Pending | Resetting { .. } | Running { .. }, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkloadPhase::Complete | WorkloadPhase::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SuiteEvent {
    WorkloadStarted {
        name: String,
    },
    PhaseChanged {
        name: String,
        phase: WorkloadPhase,
    },
    LevelCompleted {
        name: String,
        result: LevelResult,
    },
    WorkloadFailed {
        name: String,
        error: String,
    },
    WorkloadFinished {
        name: String,
        levels_completed: usize,
    },
}

pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: SuiteEvent);
}

pub struct NoopObserver;
impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: SuiteEvent) {}
}

/// Runs one workload through every configured concurrency level, in order.
pub struct ScalingDriver<'a> {
    config: &'a BenchConfig,
    fanout: FanOut,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ScalingDriver<'a> {
    pub fn new(config: &'a BenchConfig, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            config,
            fanout: FanOut::new(config.failure_policy),
            observer,
        }
    }

    /// Measure `registered` at every level. Setup and operation errors end the
    /// workload early; the summary keeps the levels measured before the failure.
    /// An invalid config fails the workload before anything runs.
    pub fn run_scaling(&self, registered: &RegisteredWorkload) -> WorkloadSummary {
        let name = registered.name();
        let workload = registered.workload();
        let span = tracing::info_span!("workload", name = %name);
        let _enter = span.enter();

        let mut aggregator = ResultAggregator::new(name, self.config);
        let mut phase = WorkloadPhase::Pending;
        let mut failure: Option<BenchError> = self.config.validate().err();
        let levels: &[usize] = if failure.is_none() {
            &self.config.levels
        } else {
            &[]
        };

        for &level in levels {
            self.advance(name, &mut phase, WorkloadPhase::Resetting { level });
            if let Err(e) = reset_contained(name, workload) {
                failure = Some(e);
                break;
            }

            self.advance(name, &mut phase, WorkloadPhase::Running { level });
            let start = Instant::now();
            let tally = match self
                .fanout
                .run(name, workload, level, self.config.duration)
            {
                Ok(tally) => tally,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            let elapsed = start.elapsed();

            let result = aggregator.record(level, elapsed, tally).clone();
            tracing::info!(
                level,
                elapsed_secs = result.elapsed_secs,
                ops = result.total_iterations,
                ops_per_sec = result.ops_per_sec,
                speedup = ?result.speedup,
                "Level completed"
            );
            self.observer.on_event(SuiteEvent::LevelCompleted {
                name: name.to_string(),
                result,
            });
        }

        let summary = match failure {
            Some(err) => {
                tracing::error!(error = %err, "Workload aborted");
                self.advance(name, &mut phase, WorkloadPhase::Failed);
                self.observer.on_event(SuiteEvent::WorkloadFailed {
                    name: name.to_string(),
                    error: err.to_string(),
                });
                aggregator.finish(Some(&err))
            }
            None => {
                self.advance(name, &mut phase, WorkloadPhase::Complete);
                aggregator.finish(None)
            }
        };

        self.observer.on_event(SuiteEvent::WorkloadFinished {
            name: name.to_string(),
            levels_completed: summary.results.len(),
        });

        summary
    }

    fn advance(&self, name: &str, phase: &mut WorkloadPhase, next: WorkloadPhase) {
        debug_assert!(
            phase.can_advance_to(&next),
            "illegal phase transition {:?} -> {:?}",
            phase,
            next
        );
        *phase = next;
        self.observer.on_event(SuiteEvent::PhaseChanged {
            name: name.to_string(),
            phase: next,
        });
    }
}

/// Call `reset` outside the timed window. A panic is reported as a setup
/// failure so the rest of the suite still runs.
fn reset_contained(name: &str, workload: &dyn Workload) -> Result<(), BenchError> {
    match panic::catch_unwind(AssertUnwindSafe(|| workload.reset())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BenchError::setup(name, &e)),
        Err(payload) => Err(BenchError::setup(
            name,
            &anyhow::anyhow!("reset panicked: {}", panic_message(&*payload)),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
