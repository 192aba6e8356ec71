// Centralized constants for scalebench to avoid magic numbers

/// Default concurrency levels, in execution order. Starting at 1 makes the
/// reported speedup an absolute linear-scaling indicator.
pub const DEFAULT_CONCURRENCY_LEVELS: [usize; 7] = [1, 10, 20, 50, 100, 250, 500];

/// Default measured window per concurrency level, in seconds
pub const DEFAULT_LEVEL_DURATION_SECS: u64 = 5;

/// Default timeout for establishing a connection to the target endpoint
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Per-request timeout used by the HTTP transport
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Namespace used by every worker in shared mode; per-worker namespaces append the worker id
pub const NAMESPACE_PREFIX: &str = "bench";

/// Number of keys seeded by lookup workloads during reset
pub const SEEDED_KEY_COUNT: u64 = 1000;

/// Keys requested per batch lookup
pub const LOOKUP_BATCH_SIZE: usize = 100;

/// Default tracing filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "scalebench=info";
