/// scalebench error types and handling utilities
use thiserror::Error;

/// Main error type for harness operations
#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid run configuration (levels, duration, arguments)
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A worker connection could not be established before the run
    #[error("Connection error for worker {worker_id} to {endpoint}: {reason}")]
    Connection {
        worker_id: usize,
        endpoint: String,
        reason: String,
    },
    /// Workload reset failed; remaining levels of that workload are skipped
    #[error("Setup error in {workload}: {reason}")]
    Setup { workload: String, reason: String },
    /// A single unit of work failed inside a worker
    #[error("Operation error in {workload} (worker {worker_id}): {reason}")]
    Operation {
        workload: String,
        worker_id: usize,
        reason: String,
    },
    /// A worker thread panicked while running a workload
    #[error("Worker {worker_id} panicked while running {workload}")]
    WorkerPanicked { workload: String, worker_id: usize },
    /// The OS refused to start a worker thread
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// Result record could not be encoded or decoded
    #[error("Report encoding error: {0}")]
    Report(#[from] serde_json::Error),
    /// Writing results failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapped anyhow error for compatibility
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BenchError {
    pub fn setup(workload: &str, err: &anyhow::Error) -> Self {
        Self::Setup {
            workload: workload.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub fn operation(workload: &str, worker_id: usize, err: &anyhow::Error) -> Self {
        Self::Operation {
            workload: workload.to_string(),
            worker_id,
            reason: format!("{:#}", err),
        }
    }
}

/// Helper to determine whether an error must abort the whole run rather than
/// just the current workload
pub fn is_fatal(err: &BenchError) -> bool {
    match err {
        BenchError::Config(_) => true,
        BenchError::Connection { .. } => true,
        BenchError::Spawn(_) => true,
        BenchError::Report(_) => true,
        BenchError::Io(_) => true,
        BenchError::Setup { .. } => false,
        BenchError::Operation { .. } => false,
        BenchError::WorkerPanicked { .. } => false,
        BenchError::Other(_) => false,
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = BenchError::Connection {
            worker_id: 7,
            endpoint: "http://127.0.0.1:9".to_string(),
            reason: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("worker 7"));
        assert!(msg.contains("127.0.0.1:9"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_operation_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("socket closed").context("GET /bench/1 failed");
        let err = BenchError::operation("PointLookup", 3, &inner);
        let msg = err.to_string();
        assert!(msg.contains("PointLookup"));
        assert!(msg.contains("worker 3"));
        assert!(msg.contains("GET /bench/1 failed: socket closed"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(is_fatal(&BenchError::Config("no levels".to_string())));
        assert!(is_fatal(&BenchError::Connection {
            worker_id: 0,
            endpoint: "x".to_string(),
            reason: "y".to_string(),
        }));
        assert!(!is_fatal(&BenchError::setup(
            "Seeded",
            &anyhow::anyhow!("seed failed")
        )));
        assert!(!is_fatal(&BenchError::WorkerPanicked {
            workload: "Boom".to_string(),
            worker_id: 1,
        }));
    }
}
