use crate::constants::NAMESPACE_PREFIX;
use crate::error::{BenchError, Result};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

/// Establishes one connection for one worker
pub trait Connector: Send + Sync {
    type Connection: Send;

    /// Human-readable target, used in error messages
    fn endpoint(&self) -> &str;

    fn connect(&self, worker_id: usize) -> anyhow::Result<Self::Connection>;
}

/// Per-worker connections, indexed by worker id.
///
/// Each slot is only ever used by the worker with the matching id, so the lock
/// around it is uncontended during a level.
pub struct ConnectionPool<C> {
    endpoint: String,
    slots: Vec<Mutex<C>>,
}

impl<C: Send> ConnectionPool<C> {
    /// Connect every worker id in `0..count` before anything runs. The first
    /// failure aborts provisioning.
    pub fn establish<K>(connector: &K, count: usize) -> Result<Self>
    where
        K: Connector<Connection = C>,
    {
        let endpoint = connector.endpoint().to_string();
        let mut slots = Vec::with_capacity(count);

        for worker_id in 0..count {
            let conn = connector
                .connect(worker_id)
                .map_err(|e| BenchError::Connection {
                    worker_id,
                    endpoint: endpoint.clone(),
                    reason: format!("{:#}", e),
                })?;
            slots.push(Mutex::new(conn));
        }

        tracing::info!(endpoint = %endpoint, connections = count, "Connections established");
        Ok(Self { endpoint, slots })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow the connection owned by `worker_id`
    pub fn get(&self, worker_id: usize) -> anyhow::Result<MutexGuard<'_, C>> {
        let slot = self.slots.get(worker_id).ok_or_else(|| {
            anyhow::anyhow!(
                "no connection provisioned for worker {} (pool size {})",
                worker_id,
                self.slots.len()
            )
        })?;
        Ok(slot.lock())
    }
}

/// Where each worker keeps its data on the target service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamespaceMode {
    /// Every worker reads and writes one namespace
    #[default]
    Shared,
    /// Each worker gets its own namespace
    PerWorker,
}

impl NamespaceMode {
    pub fn namespace(&self, worker_id: usize) -> String {
        match self {
            NamespaceMode::Shared => NAMESPACE_PREFIX.to_string(),
            NamespaceMode::PerWorker => format!("{}{}", NAMESPACE_PREFIX, worker_id),
        }
    }

    /// Every namespace touched by `worker_count` workers
    pub fn namespaces(&self, worker_count: usize) -> Vec<String> {
        match self {
            NamespaceMode::Shared => vec![self.namespace(0)],
            NamespaceMode::PerWorker => (0..worker_count).map(|id| self.namespace(id)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeConnector {
        fail_at: Option<usize>,
    }

    impl Connector for FakeConnector {
        type Connection = usize;

        fn endpoint(&self) -> &str {
            "fake://target"
        }

        fn connect(&self, worker_id: usize) -> anyhow::Result<usize> {
            if Some(worker_id) == self.fail_at {
                anyhow::bail!("refused");
            }
            Ok(worker_id * 10)
        }
    }

    #[test]
    fn test_one_connection_per_worker() {
        let pool = ConnectionPool::establish(&FakeConnector { fail_at: None }, 4).unwrap();
        assert_eq!(pool.len(), 4);
        assert_eq!(*pool.get(3).unwrap(), 30);
        assert_eq!(pool.endpoint(), "fake://target");
    }

    #[test]
    fn test_fail_fast_on_any_connection() {
        let err = ConnectionPool::establish(&FakeConnector { fail_at: Some(2) }, 4)
            .err()
            .unwrap();
        match err {
            BenchError::Connection {
                worker_id, reason, ..
            } => {
                assert_eq!(worker_id, 2);
                assert!(reason.contains("refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_worker() {
        let pool = ConnectionPool::establish(&FakeConnector { fail_at: None }, 1).unwrap();
        assert!(pool.get(1).is_err());
    }

    #[test]
    fn test_namespace_modes() {
        assert_eq!(NamespaceMode::Shared.namespace(7), "bench");
        assert_eq!(NamespaceMode::PerWorker.namespace(7), "bench7");
        assert_eq!(NamespaceMode::Shared.namespaces(3), vec!["bench"]);
        assert_eq!(
            NamespaceMode::PerWorker.namespaces(3),
            vec!["bench0", "bench1", "bench2"]
        );
    }
}
