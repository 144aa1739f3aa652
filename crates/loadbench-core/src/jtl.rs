//! JMeter sample log (JTL, CSV flavour) analysis.

use crate::error::{CoreError, CoreResult};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// One sample row. Columns not listed here are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    /// Epoch milliseconds at which the sample started.
    #[serde(rename = "timeStamp")]
    pub timestamp_ms: i64,

    /// Elapsed time in milliseconds.
    pub elapsed: u64,

    pub label: String,

    #[serde(rename = "responseCode", default)]
    pub response_code: String,

    #[serde(deserialize_with = "deserialize_bool")]
    pub success: bool,

    #[serde(default)]
    pub bytes: Option<u64>,
}

fn deserialize_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}

/// Read every sample from a JTL file.
pub fn read_samples(path: &Path) -> CoreResult<Vec<Sample>> {
    if !path.exists() {
        return Err(CoreError::not_found("JTL file", path.display().to_string()));
    }
    let file = std::fs::File::open(path)?;
    parse_samples(file)
}

/// Parse samples from any reader carrying a JTL CSV with a header row.
pub fn parse_samples<R: Read>(reader: R) -> CoreResult<Vec<Sample>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    for required in ["timeStamp", "elapsed", "label", "success"] {
        if !headers.iter().any(|h| h == required) {
            return Err(CoreError::not_found("JTL column", required));
        }
    }

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        samples.push(row?);
    }
    Ok(samples)
}

/// Aggregate figures for a group of samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelStats {
    pub samples: usize,
    pub failures: usize,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p90_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LabelStats {
    fn from_elapsed(mut elapsed: Vec<u64>, failures: usize) -> Self {
        if elapsed.is_empty() {
            return Self::default();
        }
        elapsed.sort_unstable();
        let sum: u64 = elapsed.iter().sum();
        Self {
            samples: elapsed.len(),
            failures,
            mean_ms: sum as f64 / elapsed.len() as f64,
            p50_ms: percentile(&elapsed, 0.50),
            p90_ms: percentile(&elapsed, 0.90),
            p95_ms: percentile(&elapsed, 0.95),
            p99_ms: percentile(&elapsed, 0.99),
            max_ms: *elapsed.last().unwrap_or(&0),
        }
    }

    /// Fraction of failed samples (0.0-1.0).
    pub fn error_rate(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.failures as f64 / self.samples as f64
    }
}

/// Nearest-rank percentile; `sorted` must be ascending and non-empty.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    let rank = ((sorted.len() as f64) * p).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Whole-run statistics plus a per-label breakdown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub overall: LabelStats,
    pub by_label: BTreeMap<String, LabelStats>,

    /// Wall-clock span from the first sample start to the last sample end.
    pub span: Duration,

    /// Response codes of failed samples, with counts.
    pub failure_codes: BTreeMap<String, usize>,
}

impl RunStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let start = samples.iter().map(|s| s.timestamp_ms).min().unwrap_or(0);
        let end = samples
            .iter()
            .map(|s| s.timestamp_ms + s.elapsed as i64)
            .max()
            .unwrap_or(start);

        let mut grouped: BTreeMap<&str, (Vec<u64>, usize)> = BTreeMap::new();
        let mut failure_codes = BTreeMap::new();
        for sample in samples {
            let entry = grouped.entry(sample.label.as_str()).or_default();
            entry.0.push(sample.elapsed);
            if !sample.success {
                entry.1 += 1;
                *failure_codes
                    .entry(sample.response_code.clone())
                    .or_insert(0) += 1;
            }
        }

        let failures = samples.iter().filter(|s| !s.success).count();
        let overall =
            LabelStats::from_elapsed(samples.iter().map(|s| s.elapsed).collect(), failures);
        let by_label = grouped
            .into_iter()
            .map(|(label, (elapsed, failed))| {
                (label.to_string(), LabelStats::from_elapsed(elapsed, failed))
            })
            .collect();

        Self {
            overall,
            by_label,
            span: Duration::from_millis((end - start).max(0) as u64),
            failure_codes,
        }
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        Ok(Self::from_samples(&read_samples(path)?))
    }

    pub fn error_rate(&self) -> f64 {
        self.overall.error_rate()
    }

    /// Successful samples per second over the run's wall-clock span.
    pub fn throughput(&self) -> f64 {
        let secs = self.span.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.overall.samples - self.overall.failures) as f64 / secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JTL: &str = "\
timeStamp,elapsed,label,responseCode,responseMessage,threadName,dataType,success,failureMessage,bytes,sentBytes,grpThreads,allThreads,URL,Latency,IdleTime,Connect
1700000000000,120,GET Authors,200,OK,Thread 1-1,text,true,,512,120,1,1,http://localhost/api/Authors,110,0,5
1700000000500,80,GET Authors,200,OK,Thread 1-2,text,true,,512,120,2,2,http://localhost/api/Authors,70,0,4
1700000001000,300,POST Book,500,Internal Server Error,Thread 1-1,text,false,boom,64,300,2,2,http://localhost/api/Books,290,0,6
1700000001800,200,GET Authors,200,OK,Thread 1-2,text,true,,512,120,2,2,http://localhost/api/Authors,190,0,5
";

    #[test]
    fn test_parse_samples() {
        let samples = parse_samples(JTL.as_bytes()).unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].label, "GET Authors");
        assert!(samples[0].success);
        assert!(!samples[2].success);
        assert_eq!(samples[2].response_code, "500");
        assert_eq!(samples[0].bytes, Some(512));
    }

    #[test]
    fn test_run_stats() {
        let samples = parse_samples(JTL.as_bytes()).unwrap();
        let stats = RunStats::from_samples(&samples);

        assert_eq!(stats.overall.samples, 4);
        assert_eq!(stats.overall.failures, 1);
        assert!((stats.error_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(stats.overall.max_ms, 300);
        assert_eq!(stats.overall.p50_ms, 120);
        assert_eq!(stats.span, Duration::from_millis(2000));
        assert!((stats.throughput() - 1.5).abs() < 1e-9);

        let authors = &stats.by_label["GET Authors"];
        assert_eq!(authors.samples, 3);
        assert_eq!(authors.failures, 0);
        assert!((authors.mean_ms - 133.333).abs() < 0.01);
        assert_eq!(authors.p50_ms, 120);
        assert_eq!(stats.failure_codes.get("500"), Some(&1));
    }

    #[test]
    fn test_percentile_nearest_rank() {
        assert_eq!(percentile(&[80, 120, 200, 300], 0.50), 120);
        assert_eq!(percentile(&[10, 20], 0.50), 10);
        let hundred: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&hundred, 0.95), 95);
        assert_eq!(percentile(&hundred, 0.99), 99);
        assert_eq!(percentile(&[42], 0.99), 42);
    }

    #[test]
    fn test_missing_required_column() {
        let err = parse_samples("label,elapsed\nx,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("timeStamp"));
    }

    #[test]
    fn test_empty_run() {
        let stats = RunStats::from_samples(&[]);
        assert_eq!(stats.overall.samples, 0);
        assert_eq!(stats.throughput(), 0.0);
        assert_eq!(stats.error_rate(), 0.0);
    }
}
