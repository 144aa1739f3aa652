//! Pass/fail evaluation and report generation for a finished JMeter run.

use crate::error::CoreResult;
use crate::jtl::RunStats;
use crate::profiling::PerfSummary;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

/// Thresholds a run has to meet.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SuccessCriteria {
    /// Maximum P95 elapsed time in milliseconds
    pub max_p95_ms: f64,

    /// Maximum error rate (0.0-1.0)
    pub max_error_rate: f64,

    /// Minimum successful samples per second
    pub min_throughput: Option<f64>,

    pub max_p99_ms: Option<f64>,

    /// Maximum average total CPU in percent; only checked when profiling ran.
    pub max_cpu_percent: Option<f64>,
}

impl Default for SuccessCriteria {
    fn default() -> Self {
        Self {
            max_p95_ms: 2000.0,
            max_error_rate: 0.05,
            min_throughput: None,
            max_p99_ms: None,
            max_cpu_percent: None,
        }
    }
}

/// Result writer for one test plan.
pub struct ResultWriter {
    plan_name: String,
    stats: RunStats,
    perf: Option<PerfSummary>,
    criteria: SuccessCriteria,
}

impl ResultWriter {
    pub fn new(
        plan_name: impl Into<String>,
        stats: RunStats,
        perf: Option<PerfSummary>,
        criteria: SuccessCriteria,
    ) -> Self {
        Self {
            plan_name: plan_name.into(),
            stats,
            perf,
            criteria,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn passes(&self) -> bool {
        self.check_criteria().is_empty()
    }

    pub fn failure_summary(&self) -> String {
        let failures = self.check_criteria();
        if failures.is_empty() {
            return "All criteria passed".to_string();
        }
        failures.join("\n")
    }

    fn check_criteria(&self) -> Vec<String> {
        let mut failures = Vec::new();
        let overall = &self.stats.overall;

        if overall.samples == 0 {
            failures.push("No samples recorded".to_string());
            return failures;
        }

        if overall.p95_ms as f64 > self.criteria.max_p95_ms {
            failures.push(format!(
                "P95 {}ms exceeds target {:.0}ms",
                overall.p95_ms, self.criteria.max_p95_ms
            ));
        }

        if self.stats.error_rate() > self.criteria.max_error_rate {
            failures.push(format!(
                "Error rate {:.2}% exceeds target {:.2}%",
                self.stats.error_rate() * 100.0,
                self.criteria.max_error_rate * 100.0
            ));
        }

        if let Some(min) = self.criteria.min_throughput {
            if self.stats.throughput() < min {
                failures.push(format!(
                    "Throughput {:.1}/s below target {:.1}/s",
                    self.stats.throughput(),
                    min
                ));
            }
        }

        if let Some(max_p99) = self.criteria.max_p99_ms {
            if overall.p99_ms as f64 > max_p99 {
                failures.push(format!(
                    "P99 {}ms exceeds target {:.0}ms",
                    overall.p99_ms, max_p99
                ));
            }
        }

        if let (Some(max_cpu), Some(perf)) = (self.criteria.max_cpu_percent, &self.perf) {
            if perf.cpu_total.avg > max_cpu {
                failures.push(format!(
                    "CPU average {:.1}% exceeds target {:.1}%",
                    perf.cpu_total.avg, max_cpu
                ));
            }
        }

        failures
    }

    pub fn write_report(&self, path: impl AsRef<Path>, format: ReportFormat) -> CoreResult<()> {
        let content = match format {
            ReportFormat::Markdown => self.generate_markdown(),
            ReportFormat::Json => serde_json::to_string_pretty(&self.generate_json())?,
        };
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn mark(ok: bool) -> &'static str {
        if ok {
            "✅"
        } else {
            "❌"
        }
    }

    fn generate_markdown(&self) -> String {
        let overall = &self.stats.overall;
        let passed = self.passes();

        let mut labels = String::new();
        for (label, stats) in &self.stats.by_label {
            labels.push_str(&format!(
                "| {} | {} | {} | {:.1} | {} | {} |\n",
                label, stats.samples, stats.failures, stats.mean_ms, stats.p95_ms, stats.max_ms
            ));
        }

        let failures = if self.stats.failure_codes.is_empty() {
            "No failed samples".to_string()
        } else {
            self.stats
                .failure_codes
                .iter()
                .map(|(code, count)| {
                    let code = if code.is_empty() { "(none)" } else { code.as_str() };
                    format!("- `{code}`: {count}")
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let resources = match &self.perf {
            Some(perf) => format!(
                "- **CPU**: avg {:.1}%, peak {:.1}%\n\
                 - **Target process CPU**: avg {:.1}%, peak {:.1}%\n\
                 - **Memory used**: avg {:.1}%, peak {:.1}%\n\
                 - **Target process memory**: avg {:.1} MB, peak {:.1} MB\n\
                 - **Network**: avg {:.0} bytes/sec, peak {:.0} bytes/sec\n\
                 - **Samples**: {}",
                perf.cpu_total.avg,
                perf.cpu_total.peak,
                perf.target_cpu.avg,
                perf.target_cpu.peak,
                perf.memory_used_percent.avg,
                perf.memory_used_percent.peak,
                perf.target_memory_mb.avg,
                perf.target_memory_mb.peak,
                perf.network_bytes_per_sec.avg,
                perf.network_bytes_per_sec.peak,
                perf.samples,
            ),
            None => "Profiling was not enabled for this run".to_string(),
        };

        format!(
            r#"# Load Test Report: {}

**Status**: {} {}

---

## Summary

- **Duration**: {:.1} seconds
- **Samples**: {}
- **Failed**: {}
- **Error Rate**: {:.2}%
- **Throughput**: {:.1}/s

---

## Elapsed

| Percentile | Elapsed |
|------------|---------|
| Mean | {:.1}ms |
| P50 | {}ms |
| P90 | {}ms |
| P95 | {}ms |
| P99 | {}ms |
| Max | {}ms |

## By Label

| Label | Samples | Failed | Mean (ms) | P95 (ms) | Max (ms) |
|-------|---------|--------|-----------|----------|----------|
{}
---

## Resource Utilization

{}

---

## Success Criteria

{}

---

## Failed Response Codes

{}

---

**Report Generated**: {}
"#,
            self.plan_name,
            Self::mark(passed),
            if passed { "PASSED" } else { "FAILED" },
            self.stats.span.as_secs_f64(),
            overall.samples,
            overall.failures,
            self.stats.error_rate() * 100.0,
            self.stats.throughput(),
            overall.mean_ms,
            overall.p50_ms,
            overall.p90_ms,
            overall.p95_ms,
            overall.p99_ms,
            overall.max_ms,
            labels,
            resources,
            if passed {
                "✅ **All criteria passed**".to_string()
            } else {
                format!("❌ **Failed criteria**:\n\n{}", self.failure_summary())
            },
            failures,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    fn generate_json(&self) -> serde_json::Value {
        serde_json::json!({
            "plan": self.plan_name,
            "status": if self.passes() { "passed" } else { "failed" },
            "duration_seconds": self.stats.span.as_secs_f64(),
            "samples": self.stats.overall.samples,
            "failures": self.stats.overall.failures,
            "error_rate": self.stats.error_rate(),
            "throughput_per_sec": self.stats.throughput(),
            "elapsed_ms": {
                "mean": self.stats.overall.mean_ms,
                "p50": self.stats.overall.p50_ms,
                "p90": self.stats.overall.p90_ms,
                "p95": self.stats.overall.p95_ms,
                "p99": self.stats.overall.p99_ms,
                "max": self.stats.overall.max_ms,
            },
            "by_label": self.stats.by_label,
            "failure_codes": self.stats.failure_codes,
            "resources": self.perf,
            "success_criteria": {
                "passed": self.passes(),
                "failures": self.check_criteria(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jtl::parse_samples;
    use tempfile::TempDir;

    fn stats(rows: &[(i64, u64, bool)]) -> RunStats {
        let mut jtl = String::from("timeStamp,elapsed,label,responseCode,success\n");
        for (ts, elapsed, ok) in rows {
            let code = if *ok { 200 } else { 500 };
            jtl.push_str(&format!("{ts},{elapsed},GET Authors,{code},{ok}\n"));
        }
        RunStats::from_samples(&parse_samples(jtl.as_bytes()).unwrap())
    }

    #[test]
    fn test_passes_when_criteria_met() {
        let rows: Vec<_> = (0..100).map(|i| (1_700_000_000_000 + i * 100, 50, true)).collect();
        let writer = ResultWriter::new("authors", stats(&rows), None, SuccessCriteria::default());
        assert!(writer.passes());
        assert_eq!(writer.failure_summary(), "All criteria passed");
    }

    #[test]
    fn test_fails_when_criteria_not_met() {
        let rows: Vec<_> = (0..10)
            .map(|i| (1_700_000_000_000 + i * 100, 3000, i % 2 == 0))
            .collect();
        let criteria = SuccessCriteria {
            min_throughput: Some(100.0),
            ..SuccessCriteria::default()
        };
        let writer = ResultWriter::new("books", stats(&rows), None, criteria);

        assert!(!writer.passes());
        let summary = writer.failure_summary();
        assert!(summary.contains("P95"));
        assert!(summary.contains("Error rate"));
        assert!(summary.contains("Throughput"));
    }

    #[test]
    fn test_empty_run_fails() {
        let writer = ResultWriter::new("empty", RunStats::default(), None, SuccessCriteria::default());
        assert!(!writer.passes());
        assert!(writer.failure_summary().contains("No samples"));
    }

    #[test]
    fn test_write_reports() {
        let dir = TempDir::new().unwrap();
        let rows = [(1_700_000_000_000, 40, true), (1_700_000_000_500, 60, false)];
        let writer = ResultWriter::new("mixed", stats(&rows), None, SuccessCriteria::default());

        let md = dir.path().join("mixed.md");
        writer.write_report(&md, ReportFormat::Markdown).unwrap();
        let markdown = std::fs::read_to_string(&md).unwrap();
        assert!(markdown.starts_with("# Load Test Report: mixed"));
        assert!(markdown.contains("| GET Authors | 2 | 1 |"));
        assert!(markdown.contains("- `500`: 1"));

        let json_path = dir.path().join("nested").join("mixed.json");
        writer.write_report(&json_path, ReportFormat::Json).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["samples"], 2);
        assert!(json["resources"].is_null());
    }
}
