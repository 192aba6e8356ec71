pub mod config;
pub mod connection;
pub mod constants;
pub mod counter;
pub mod driver;
pub mod error;
pub mod fanout;
pub mod http;
pub mod logging;
pub mod report;
pub mod suite;
pub mod worker;
pub mod workload;
pub mod workloads;

pub use config::{BenchConfig, FailurePolicy};
pub use driver::{NoopObserver, ProgressObserver, ScalingDriver, SuiteEvent, WorkloadPhase};
pub use error::BenchError;
pub use report::{LevelResult, WorkloadSummary};
pub use suite::Suite;
pub use workload::{FnWorkload, RegisteredWorkload, Workload};
