/// Result aggregation and structured reporting for scaling runs
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::fanout::LevelTally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::time::Duration;

/// Measurement of one concurrency level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    /// Carried as the key of the `results` map
    #[serde(skip)]
    pub concurrency: usize,
    #[serde(rename = "time")]
    pub elapsed_secs: f64,
    #[serde(rename = "ops")]
    pub total_iterations: u64,
    pub ops_per_sec: f64,
    /// Throughput relative to the baseline level; absent when the baseline measured nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speedup: Option<f64>,
    #[serde(default)]
    pub failed_workers: usize,
}

/// Everything measured for one workload, emitted as one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub ran_at: DateTime<Utc>,
    pub duration_secs: f64,
    #[serde(default)]
    pub baseline_level: Option<usize>,
    #[serde(with = "level_map")]
    pub results: Vec<LevelResult>,
    /// Why the workload stopped before its last level, if it did
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkloadSummary {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn level(&self, concurrency: usize) -> Option<&LevelResult> {
        self.results.iter().find(|r| r.concurrency == concurrency)
    }

    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Collects level results for one workload and computes speedup against the
/// first measured level.
#[derive(Debug)]
pub struct ResultAggregator {
    name: String,
    label: Option<String>,
    ran_at: DateTime<Utc>,
    duration: Duration,
    baseline: Option<(usize, f64)>,
    results: Vec<LevelResult>,
}

impl ResultAggregator {
    pub fn new(name: &str, config: &BenchConfig) -> Self {
        Self {
            name: name.to_string(),
            label: config.label.clone(),
            ran_at: Utc::now(),
            duration: config.duration,
            baseline: None,
            results: Vec::with_capacity(config.levels.len()),
        }
    }

    pub fn record(
        &mut self,
        concurrency: usize,
        elapsed: Duration,
        tally: LevelTally,
    ) -> &LevelResult {
        let elapsed_secs = elapsed.as_secs_f64();
        let ops_per_sec = if elapsed_secs > 0.0 {
            tally.total_iterations as f64 / elapsed_secs
        } else {
            0.0
        };

        let (_, baseline_ops) = *self.baseline.get_or_insert((concurrency, ops_per_sec));
        let speedup = if baseline_ops > 0.0 {
            Some(ops_per_sec / baseline_ops)
        } else {
            None
        };

        self.results.push(LevelResult {
            concurrency,
            elapsed_secs,
            total_iterations: tally.total_iterations,
            ops_per_sec,
            speedup,
            failed_workers: tally.failed_workers,
        });

        &self.results[self.results.len() - 1]
    }

    pub fn finish(self, error: Option<&BenchError>) -> WorkloadSummary {
        WorkloadSummary {
            name: self.name,
            label: self.label,
            ran_at: self.ran_at,
            duration_secs: self.duration.as_secs_f64(),
            baseline_level: self.baseline.map(|(level, _)| level),
            results: self.results,
            error: error.map(|e| e.to_string()),
        }
    }
}

/// Destination for finished workload summaries
pub trait ReportSink {
    fn emit(&mut self, summary: &WorkloadSummary) -> Result<()>;
}

/// Writes one self-contained JSON record per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, summary: &WorkloadSummary) -> Result<()> {
        serde_json::to_writer(&mut self.writer, summary)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Parse a JSON-lines stream of summaries. Blank lines and lines that are not
/// JSON objects (stray diagnostics captured with the output) are skipped.
pub fn read_summaries<R: BufRead>(reader: R) -> Result<Vec<WorkloadSummary>> {
    let mut summaries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        let summary = serde_json::from_str(trimmed).map_err(BenchError::Report)?;
        summaries.push(summary);
    }

    Ok(summaries)
}

mod level_map {
    use super::LevelResult;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        levels: &[LevelResult],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(levels.len()))?;
        for level in levels {
            map.serialize_entry(&level.concurrency.to_string(), level)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<LevelResult>, D::Error> {
        deserializer.deserialize_map(LevelMapVisitor)
    }

    struct LevelMapVisitor;

    impl<'de> Visitor<'de> for LevelMapVisitor {
        type Value = Vec<LevelResult>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "a map from concurrency level to level result")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut levels = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((label, mut level)) = access.next_entry::<String, LevelResult>()? {
                level.concurrency = label.parse().map_err(|_| {
                    de::Error::custom(format!("invalid concurrency level label {:?}", label))
                })?;
                levels.push(level);
            }
            Ok(levels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(total_iterations: u64) -> LevelTally {
        LevelTally {
            total_iterations,
            failed_workers: 0,
        }
    }

    #[test]
    fn test_baseline_speedup_is_exactly_one() {
        let config = BenchConfig::new(vec![1, 4], Duration::from_secs(2));
        let mut agg = ResultAggregator::new("CountToN", &config);

        let first = agg.record(1, Duration::from_millis(2003), tally(1234)).clone();
        assert_eq!(first.speedup, Some(1.0));

        let second = agg.record(4, Duration::from_millis(2001), tally(4900)).clone();
        let speedup = second.speedup.unwrap();
        assert!(speedup > 3.9 && speedup < 4.0);

        let summary = agg.finish(None);
        assert_eq!(summary.baseline_level, Some(1));
        assert!(summary.is_complete());
        assert_eq!(summary.duration_secs, 2.0);
    }

    #[test]
    fn test_relative_baseline_when_first_level_is_not_one() {
        let config = BenchConfig::new(vec![10, 50], Duration::from_secs(1));
        let mut agg = ResultAggregator::new("Relative", &config);
        agg.record(10, Duration::from_secs(1), tally(1000));
        agg.record(50, Duration::from_secs(1), tally(2500));

        let summary = agg.finish(None);
        assert_eq!(summary.baseline_level, Some(10));
        assert_eq!(summary.level(50).unwrap().speedup, Some(2.5));
    }

    #[test]
    fn test_zero_baseline_omits_speedup() {
        let config = BenchConfig::new(vec![1, 2], Duration::from_secs(1));
        let mut agg = ResultAggregator::new("Idle", &config);
        agg.record(1, Duration::from_secs(1), tally(0));
        agg.record(2, Duration::from_secs(1), tally(10));

        let summary = agg.finish(None);
        assert!(summary.results.iter().all(|r| r.speedup.is_none()));

        let json = summary.to_json_line().unwrap();
        assert!(!json.contains("speedup"));
    }

    #[test]
    fn test_record_layout_uses_level_labels() {
        let config = BenchConfig::new(vec![10, 2], Duration::from_secs(1)).with_label("nightly");
        let mut agg = ResultAggregator::new("Layout", &config);
        agg.record(10, Duration::from_secs(1), tally(100));
        agg.record(2, Duration::from_secs(1), tally(30));

        let value: serde_json::Value =
            serde_json::from_str(&agg.finish(None).to_json_line().unwrap()).unwrap();

        assert_eq!(value["name"], "Layout");
        assert_eq!(value["label"], "nightly");
        assert_eq!(value["results"]["10"]["ops"], 100);
        assert_eq!(value["results"]["2"]["time"], 1.0);
        assert!(value["results"]["2"]["ops_per_sec"].is_number());
    }

    #[test]
    fn test_error_is_recorded() {
        let config = BenchConfig::new(vec![1], Duration::from_secs(1));
        let agg = ResultAggregator::new("Broken", &config);
        let err = BenchError::setup("Broken", &anyhow::anyhow!("seed failed"));

        let summary = agg.finish(Some(&err));
        assert!(!summary.is_complete());
        assert!(summary.results.is_empty());
        assert!(summary.error.unwrap().contains("seed failed"));
    }

    #[test]
    fn test_rejects_non_numeric_label() {
        let line = r#"{"name":"x","ran_at":"2026-01-01T00:00:00Z","duration_secs":1.0,"results":{"ten":{"time":1.0,"ops":1,"ops_per_sec":1.0}}}"#;
        let err = serde_json::from_str::<WorkloadSummary>(line).unwrap_err();
        assert!(err.to_string().contains("invalid concurrency level label"));
    }
}
