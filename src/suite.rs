use crate::config::BenchConfig;
use crate::driver::{ProgressObserver, ScalingDriver, SuiteEvent};
use crate::error::{BenchError, Result};
use crate::report::WorkloadSummary;
use crate::workload::{RegisteredWorkload, Workload};
use std::iter::FusedIterator;
use std::slice;
use std::sync::Arc;

/// Ordered registry of workloads to benchmark
#[derive(Debug, Default, Clone)]
pub struct Suite {
    workloads: Vec<RegisteredWorkload>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<W: Workload + 'static>(&mut self, name: &str, workload: W) -> &mut Self {
        self.register_shared(name, Arc::new(workload))
    }

    pub fn register_shared(&mut self, name: &str, workload: Arc<dyn Workload>) -> &mut Self {
        self.workloads.push(RegisteredWorkload::new(name, workload));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.workloads.iter().map(|w| w.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Keep only the named workloads, preserving registration order
    pub fn select(&mut self, names: &[String]) -> Result<()> {
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.workloads.iter().any(|w| w.name() == name.as_str()))
        {
            return Err(BenchError::Config(format!(
                "unknown workload '{}' (available: {})",
                unknown,
                self.names().join(", ")
            )));
        }

        self.workloads
            .retain(|w| names.iter().any(|name| name == w.name()));
        Ok(())
    }

    /// Start a run. Summaries are produced lazily, one workload per `next()`;
    /// calling `run` again starts over from the first workload.
    pub fn run<'a>(
        &'a self,
        config: &'a BenchConfig,
        observer: &'a dyn ProgressObserver,
    ) -> Result<SuiteRun<'a>> {
        config.validate()?;
        Ok(SuiteRun {
            workloads: self.workloads.iter(),
            driver: ScalingDriver::new(config, observer),
            observer,
        })
    }
}

/// Lazy, ordered sequence of workload summaries
pub struct SuiteRun<'a> {
    workloads: slice::Iter<'a, RegisteredWorkload>,
    driver: ScalingDriver<'a>,
    observer: &'a dyn ProgressObserver,
}

impl Iterator for SuiteRun<'_> {
    type Item = WorkloadSummary;

    fn next(&mut self) -> Option<Self::Item> {
        let registered = self.workloads.next()?;

        tracing::info!(workload = registered.name(), "Starting workload");
        self.observer.on_event(SuiteEvent::WorkloadStarted {
            name: registered.name().to_string(),
        });

        Some(self.driver.run_scaling(registered))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.workloads.size_hint()
    }
}

impl ExactSizeIterator for SuiteRun<'_> {}
impl FusedIterator for SuiteRun<'_> {}
