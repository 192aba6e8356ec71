/// Structured logging and progress reporting for scalebench.
///
/// Diagnostics always go to stderr; stdout carries only result records.
use crate::constants::DEFAULT_LOG_FILTER;
use crate::driver::{ProgressObserver, SuiteEvent};
use colored::Colorize;
use parking_lot::Mutex;
use std::io::{self, Write};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Initialize structured logging with optional JSON output
pub fn init_logging(json_output: bool) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = Registry::default().with(env_filter);

    if json_output {
        // JSON output for log aggregation
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .with_thread_names(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()?;
    }

    Ok(())
}

/// Operator-facing progress: a banner per workload plus tracing events.
///
/// Console lines go to stderr unless another writer is given; stdout stays
/// reserved for result records.
pub struct LoggingObserver {
    console: Option<Mutex<Box<dyn Write + Send>>>,
}

impl LoggingObserver {
    pub fn new(banner: bool) -> Self {
        if banner {
            Self::with_writer(io::stderr())
        } else {
            Self { console: None }
        }
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            console: Some(Mutex::new(Box::new(writer))),
        }
    }

    fn print(&self, line: &str) {
        if let Some(console) = &self.console {
            let mut out = console.lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn banner(name: &str) -> String {
    format!("########## {} ##########", name)
}

impl ProgressObserver for LoggingObserver {
    fn on_event(&self, event: SuiteEvent) {
        match event {
            SuiteEvent::WorkloadStarted { name } => {
                self.print(&banner(&name).bold().to_string());
            }
            SuiteEvent::PhaseChanged { name, phase } => {
                tracing::debug!(workload = %name, phase = ?phase, "Phase changed");
            }
            SuiteEvent::LevelCompleted { .. } => {}
            SuiteEvent::WorkloadFailed { name, error } => {
                self.print(&format!("{} {}: {}", "failed".red().bold(), name, error));
            }
            SuiteEvent::WorkloadFinished {
                name,
                levels_completed,
            } => {
                tracing::info!(workload = %name, levels_completed, "Workload finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::WorkloadPhase;
    use std::sync::Arc;

    #[test]
    fn test_banner_format() {
        assert_eq!(banner("PointLookup"), "########## PointLookup ##########");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn replay(observer: &LoggingObserver) {
        observer.on_event(SuiteEvent::WorkloadStarted {
            name: "PointLookup".to_string(),
        });
        observer.on_event(SuiteEvent::PhaseChanged {
            name: "PointLookup".to_string(),
            phase: WorkloadPhase::Resetting { level: 1 },
        });
        observer.on_event(SuiteEvent::WorkloadFailed {
            name: "PointLookup".to_string(),
            error: "seed rejected".to_string(),
        });
        observer.on_event(SuiteEvent::WorkloadFinished {
            name: "PointLookup".to_string(),
            levels_completed: 0,
        });
    }

    #[test]
    fn test_banner_and_failure_go_to_console_writer() {
        let console = Captured::default();
        let observer = LoggingObserver::with_writer(console.clone());

        replay(&observer);

        let text = console.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(&banner("PointLookup")));
        assert!(lines[1].contains("failed"));
        assert!(lines[1].contains("PointLookup: seed rejected"));
        // result records never pass through the observer
        assert!(!text.contains('{'));
    }

    #[test]
    fn test_quiet_observer_prints_nothing() {
        let observer = LoggingObserver::new(false);
        replay(&observer);
        assert!(observer.console.is_none());
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let _ = init_logging(false);
        assert!(init_logging(false).is_err());
    }
}
