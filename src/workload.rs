use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// A resettable, repeatable unit of benchmark work.
///
/// The same instance is shared by every worker of a level, so implementations
/// keep per-worker state keyed by the worker id (for example one connection per
/// worker) rather than behind a single shared handle.
pub trait Workload: Send + Sync {
    /// Prepare state before a concurrency level begins. Not timed.
    fn reset(&self) -> Result<()> {
        Ok(())
    }

    /// Perform one unit of work on behalf of `worker_id`.
    fn run_once(&self, worker_id: usize) -> Result<()>;
}

/// A workload together with the display name it was registered under
#[derive(Clone)]
pub struct RegisteredWorkload {
    name: String,
    workload: Arc<dyn Workload>,
}

impl RegisteredWorkload {
    pub fn new(name: impl Into<String>, workload: Arc<dyn Workload>) -> Self {
        Self {
            name: name.into(),
            workload,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workload(&self) -> &dyn Workload {
        self.workload.as_ref()
    }
}

impl fmt::Debug for RegisteredWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredWorkload")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Adapts a closure into a [`Workload`] with a no-op reset
pub struct FnWorkload<F> {
    run: F,
}

impl<F> FnWorkload<F>
where
    F: Fn(usize) -> Result<()> + Send + Sync,
{
    pub fn new(run: F) -> Self {
        Self { run }
    }
}

impl<F> Workload for FnWorkload<F>
where
    F: Fn(usize) -> Result<()> + Send + Sync,
{
    fn run_once(&self, worker_id: usize) -> Result<()> {
        (self.run)(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fn_workload_passes_worker_id() {
        let last = Arc::new(AtomicUsize::new(0));
        let workload = FnWorkload::new({
            let last = Arc::clone(&last);
            move |worker_id| {
                last.store(worker_id, Ordering::SeqCst);
                Ok(())
            }
        });

        workload.run_once(42).unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 42);
        assert!(workload.reset().is_ok());
    }

    #[test]
    fn test_registered_name_is_explicit() {
        let registered =
            RegisteredWorkload::new("CountToN", Arc::new(FnWorkload::new(|_| Ok(()))));
        assert_eq!(registered.name(), "CountToN");
        assert!(format!("{:?}", registered).contains("CountToN"));
    }
}
