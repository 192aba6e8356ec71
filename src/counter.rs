use parking_lot::Mutex;

/// Shared accumulator of completed iterations for the level currently running.
///
/// Workers batch their count locally and call [`IterationCounter::add`] once when
/// they finish, so the lock is taken at most once per worker per level.
#[derive(Debug, Default)]
pub struct IterationCounter {
    total: Mutex<u64>,
}

impl IterationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, iterations: u64) {
        let mut total = self.total.lock();
        *total = total.saturating_add(iterations);
    }

    pub fn get(&self) -> u64 {
        *self.total.lock()
    }

    /// Read the accumulated value and reset it to zero for the next level
    pub fn take(&self) -> u64 {
        std::mem::take(&mut *self.total.lock())
    }

    pub fn reset(&self) {
        *self.total.lock() = 0;
    }
}
