/// Built-in workloads against a key/value style HTTP service.
///
/// The target is expected to expose documents at `/{namespace}/{key}`, bulk
/// inserts at `POST /{namespace}/_bulk`, multi-gets at `POST /{namespace}/_mget`
/// and namespace removal at `DELETE /{namespace}`.
use crate::connection::{ConnectionPool, NamespaceMode};
use crate::constants::{LOOKUP_BATCH_SIZE, SEEDED_KEY_COUNT};
use crate::http::HttpSession;
use crate::suite::Suite;
use crate::workload::Workload;
use anyhow::{Context, Result};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Key stride between workers, so partitioned writers never collide
const WORKER_KEY_STRIDE: u64 = 1 << 32;

type Pool = Arc<ConnectionPool<HttpSession>>;

/// Register every built-in workload, in run order
pub fn builtin_suite(pool: Pool, mode: NamespaceMode) -> Suite {
    let mut suite = Suite::new();
    suite
        .register("Overhead", Overhead)
        .register("PointLookup", PointLookup::new(pool.clone(), mode))
        .register("BatchLookup", BatchLookup::new(pool.clone(), mode))
        .register("PartitionedInsert", PartitionedInsert::new(pool, mode));
    suite
}

/// Drop and re-seed every namespace with documents `0..SEEDED_KEY_COUNT`,
/// using the first worker's connection.
fn seed_namespaces(pool: &Pool, mode: NamespaceMode) -> Result<()> {
    let conn = pool.get(0)?;
    let docs: Vec<_> = (0..SEEDED_KEY_COUNT)
        .map(|key| json!({ "_id": key, "value": key }))
        .collect();

    for ns in mode.namespaces(pool.len()) {
        conn.delete(&ns)?;
        conn.post_json(&format!("{}/_bulk", ns), &docs)
            .with_context(|| format!("Seeding namespace {} failed", ns))?;
    }
    Ok(())
}

fn random_key() -> u64 {
    rand::random::<u64>() % SEEDED_KEY_COUNT
}

/// Does nothing; measures the cost of the harness itself
pub struct Overhead;

impl Workload for Overhead {
    fn run_once(&self, _worker_id: usize) -> Result<()> {
        std::hint::black_box(());
        Ok(())
    }
}

/// Fetch one seeded document by key
pub struct PointLookup {
    pool: Pool,
    mode: NamespaceMode,
}

impl PointLookup {
    pub fn new(pool: Pool, mode: NamespaceMode) -> Self {
        Self { pool, mode }
    }
}

impl Workload for PointLookup {
    fn reset(&self) -> Result<()> {
        seed_namespaces(&self.pool, self.mode)
    }

    fn run_once(&self, worker_id: usize) -> Result<()> {
        let conn = self.pool.get(worker_id)?;
        let path = format!("{}/{}", self.mode.namespace(worker_id), random_key());
        conn.get(&path)?;
        Ok(())
    }
}

/// Fetch a batch of seeded documents in one request, reading the full response
pub struct BatchLookup {
    pool: Pool,
    mode: NamespaceMode,
}

impl BatchLookup {
    pub fn new(pool: Pool, mode: NamespaceMode) -> Self {
        Self { pool, mode }
    }
}

impl Workload for BatchLookup {
    fn reset(&self) -> Result<()> {
        seed_namespaces(&self.pool, self.mode)
    }

    fn run_once(&self, worker_id: usize) -> Result<()> {
        let conn = self.pool.get(worker_id)?;
        let ids: Vec<u64> = (0..LOOKUP_BATCH_SIZE).map(|_| random_key()).collect();
        let path = format!("{}/_mget", self.mode.namespace(worker_id));
        conn.post_json(&path, &json!({ "ids": ids }))?;
        Ok(())
    }
}

/// Insert documents with keys from a range owned by the worker
pub struct PartitionedInsert {
    pool: Pool,
    mode: NamespaceMode,
    next_seq: Vec<AtomicU64>,
}

impl PartitionedInsert {
    pub fn new(pool: Pool, mode: NamespaceMode) -> Self {
        let next_seq = (0..pool.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            pool,
            mode,
            next_seq,
        }
    }

    fn next_key(&self, worker_id: usize) -> Result<u64> {
        let seq = self
            .next_seq
            .get(worker_id)
            .with_context(|| format!("no key range for worker {}", worker_id))?
            .fetch_add(1, Ordering::Relaxed);
        Ok(worker_id as u64 * WORKER_KEY_STRIDE + seq)
    }
}

impl Workload for PartitionedInsert {
    fn reset(&self) -> Result<()> {
        let conn = self.pool.get(0)?;
        for ns in self.mode.namespaces(self.pool.len()) {
            conn.delete(&ns)?;
        }
        for seq in &self.next_seq {
            seq.store(0, Ordering::Relaxed);
        }
        Ok(())
    }

    fn run_once(&self, worker_id: usize) -> Result<()> {
        let key = self.next_key(worker_id)?;
        let conn = self.pool.get(worker_id)?;
        let path = format!("{}/{}", self.mode.namespace(worker_id), key);
        conn.put_json(&path, &json!({ "_id": key, "worker": worker_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connector;
    use reqwest::blocking::Client;

    struct OfflineConnector;

    impl Connector for OfflineConnector {
        type Connection = HttpSession;

        fn endpoint(&self) -> &str {
            "http://127.0.0.1:9"
        }

        fn connect(&self, _worker_id: usize) -> Result<HttpSession> {
            Ok(HttpSession::offline(Client::new(), self.endpoint()))
        }
    }

    fn offline_pool(count: usize) -> Pool {
        Arc::new(ConnectionPool::establish(&OfflineConnector, count).unwrap())
    }

    #[test]
    fn test_builtin_registration_order() {
        let suite = builtin_suite(offline_pool(2), NamespaceMode::Shared);
        assert_eq!(
            suite.names(),
            vec!["Overhead", "PointLookup", "BatchLookup", "PartitionedInsert"]
        );
    }

    #[test]
    fn test_partitioned_keys_are_disjoint() {
        let insert = PartitionedInsert::new(offline_pool(3), NamespaceMode::PerWorker);

        let a0 = insert.next_key(0).unwrap();
        let a1 = insert.next_key(0).unwrap();
        let b0 = insert.next_key(1).unwrap();
        let c0 = insert.next_key(2).unwrap();

        assert_eq!(a1, a0 + 1);
        assert_eq!(b0, WORKER_KEY_STRIDE);
        assert_eq!(c0, 2 * WORKER_KEY_STRIDE);
        assert!(insert.next_key(3).is_err());
    }

    #[test]
    fn test_random_keys_stay_in_seeded_range() {
        for _ in 0..1000 {
            assert!(random_key() < SEEDED_KEY_COUNT);
        }
    }

    #[test]
    fn test_overhead_never_fails() {
        assert!(Overhead.reset().is_ok());
        assert!(Overhead.run_once(0).is_ok());
    }
}
