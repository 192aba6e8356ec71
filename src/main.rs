use anyhow::{Context, Result};
use clap::Parser;
use scalebench::config::{BenchConfig, FailurePolicy};
use scalebench::connection::{ConnectionPool, NamespaceMode};
use scalebench::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use scalebench::http::HttpConnector;
use scalebench::logging::{init_logging, LoggingObserver};
use scalebench::report::{JsonLinesSink, ReportSink};
use scalebench::workloads::builtin_suite;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "scalebench")]
#[command(about = "Drive built-in workloads against a service at increasing concurrency")]
struct Cli {
    /// Target endpoint, e.g. http://127.0.0.1:8080
    #[arg(env = "SCALEBENCH_ENDPOINT")]
    endpoint: String,

    /// Measured seconds per concurrency level
    #[arg(env = "SCALEBENCH_SECONDS")]
    seconds: u64,

    /// Give every worker its own data namespace instead of sharing one
    #[arg(long, env = "SCALEBENCH_PER_WORKER_NAMESPACE")]
    per_worker_namespace: bool,

    /// Concurrency levels, in execution order
    #[arg(
        long,
        env = "SCALEBENCH_LEVELS",
        value_delimiter = ',',
        default_value = "1,10,20,50,100,250,500"
    )]
    levels: Vec<usize>,

    /// Only run the named workload (repeatable)
    #[arg(short, long = "workload", env = "SCALEBENCH_WORKLOADS", value_delimiter = ',')]
    workloads: Vec<String>,

    /// Also append result records to this JSON-lines file
    #[arg(short, long, env = "SCALEBENCH_OUTPUT")]
    output: Option<PathBuf>,

    /// Label stamped into every result record
    #[arg(short, long, env = "SCALEBENCH_LABEL")]
    label: Option<String>,

    /// Keep a level running when a single worker fails
    #[arg(long, env = "SCALEBENCH_CONTINUE_ON_WORKER_ERROR")]
    continue_on_worker_error: bool,

    /// Emit diagnostics as JSON
    #[arg(long, env = "SCALEBENCH_JSON_LOGS")]
    json_logs: bool,

    #[arg(
        long,
        env = "SCALEBENCH_CONNECT_TIMEOUT_SECS",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS
    )]
    connect_timeout_secs: u64,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = init_logging(cli.json_logs) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Run aborted");
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = BenchConfig::new(cli.levels, Duration::from_secs(cli.seconds));
    if cli.continue_on_worker_error {
        config = config.with_failure_policy(FailurePolicy::LogAndContinue);
    }
    if let Some(label) = cli.label {
        config = config.with_label(label);
    }
    config.validate()?;

    let mode = if cli.per_worker_namespace {
        NamespaceMode::PerWorker
    } else {
        NamespaceMode::Shared
    };

    let connector = HttpConnector::new(
        &cli.endpoint,
        Duration::from_secs(cli.connect_timeout_secs),
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
    );
    let pool = Arc::new(ConnectionPool::establish(&connector, config.max_workers())?);

    let mut suite = builtin_suite(pool, mode);
    if !cli.workloads.is_empty() {
        suite.select(&cli.workloads)?;
    }

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(JsonLinesSink::new(io::stdout()))];
    if let Some(path) = &cli.output {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file {}", path.display()))?;
        sinks.push(Box::new(JsonLinesSink::new(file)));
    }

    tracing::info!(
        endpoint = %cli.endpoint,
        levels = ?config.levels,
        seconds = cli.seconds,
        namespace_mode = ?mode,
        workloads = suite.len(),
        "Starting suite"
    );

    let observer = LoggingObserver::default();
    let mut failed = 0;
    for summary in suite.run(&config, &observer)? {
        if !summary.is_complete() {
            failed += 1;
        }
        for sink in sinks.iter_mut() {
            sink.emit(&summary)?;
        }
    }

    tracing::info!(workloads = suite.len(), failed, "Suite finished");
    Ok(())
}
