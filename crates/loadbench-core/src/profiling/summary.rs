use super::columns;
use super::sampler::TIMESTAMP_FORMAT;
use crate::error::{CoreError, CoreResult};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Average and peak of one counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Stat {
    pub avg: f64,
    pub peak: f64,
}

impl Stat {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        Self {
            avg: values.iter().sum::<f64>() / values.len() as f64,
            peak: values.iter().copied().fold(f64::MIN, f64::max),
        }
    }
}

/// Disk figures; the unit depends on the counter source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskStats {
    pub reads: Stat,
    pub writes: Stat,
    /// `"ops/sec"` for typeperf, `"bytes/sec"` for the sysinfo sampler.
    pub unit: &'static str,
}

/// Summary of a cleaned counter CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfSummary {
    pub samples: usize,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration_secs: Option<f64>,
    pub cpu_total: Stat,
    pub target_cpu: Stat,
    pub memory_used_percent: Stat,
    pub memory_available_mb: Stat,
    pub target_memory_mb: Stat,
    pub disk: Option<DiskStats>,
    /// Sum over all network interface columns.
    pub network_bytes_per_sec: Stat,
}

/// Lenient numeric parse: blanks, quotes and garbage count as zero.
fn number(field: &str) -> f64 {
    field.trim().trim_matches('"').trim().parse().unwrap_or(0.0)
}

fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    let trimmed = field.trim().trim_matches('"');
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%m/%d/%Y %H:%M:%S"))
        .ok()
}

impl PerfSummary {
    pub fn from_csv(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::not_found("counter file", path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers = reader.headers()?.clone();
        let index = |name: &str| headers.iter().position(|h| h == name);

        let ts_idx = index(columns::TIMESTAMP);
        let network_idx: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| columns::is_network(h))
            .map(|(i, _)| i)
            .collect();
        let (disk_read_idx, disk_write_idx, disk_unit) =
            match (index(columns::DISK_READS), index(columns::DISK_WRITES)) {
                (Some(r), Some(w)) => (Some(r), Some(w), "ops/sec"),
                _ => (
                    index(columns::DISK_READ_BYTES),
                    index(columns::DISK_WRITE_BYTES),
                    "bytes/sec",
                ),
            };

        let wanted = [
            index(columns::CPU_TOTAL),
            index(columns::TARGET_CPU),
            index(columns::MEMORY_USED_PERCENT),
            index(columns::MEMORY_AVAILABLE_MB),
            index(columns::TARGET_MEMORY_BYTES),
            disk_read_idx,
            disk_write_idx,
        ];
        let mut series: Vec<Vec<f64>> = vec![Vec::new(); wanted.len()];
        let mut network = Vec::new();
        let mut first_ts = None;
        let mut last_ts = None;
        let mut samples = 0;

        for record in reader.records() {
            let record = record?;
            samples += 1;
            for (slot, idx) in wanted.iter().enumerate() {
                let value = idx.and_then(|i| record.get(i)).map(number).unwrap_or(0.0);
                series[slot].push(value);
            }
            network.push(
                network_idx
                    .iter()
                    .filter_map(|i| record.get(*i))
                    .map(number)
                    .sum(),
            );
            if let Some(ts) = ts_idx.and_then(|i| record.get(i)).and_then(parse_timestamp) {
                first_ts.get_or_insert(ts);
                last_ts = Some(ts);
            }
        }

        let target_memory_mb: Vec<f64> = series[4].iter().map(|b| b / 1_048_576.0).collect();
        let disk = disk_read_idx.zip(disk_write_idx).map(|_| DiskStats {
            reads: Stat::of(&series[5]),
            writes: Stat::of(&series[6]),
            unit: disk_unit,
        });

        Ok(Self {
            samples,
            start: first_ts.map(|t| t.to_string()),
            end: last_ts.map(|t| t.to_string()),
            duration_secs: first_ts
                .zip(last_ts)
                .map(|(a, b)| (b - a).num_milliseconds() as f64 / 1000.0),
            cpu_total: Stat::of(&series[0]),
            target_cpu: Stat::of(&series[1]),
            memory_used_percent: Stat::of(&series[2]),
            memory_available_mb: Stat::of(&series[3]),
            target_memory_mb: Stat::of(&target_memory_mb),
            disk,
            network_bytes_per_sec: Stat::of(&network),
        })
    }

    /// Plain-text report, one section per resource.
    pub fn render_text(&self) -> String {
        let rule = "-".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "PERFORMANCE SUMMARY");
        let _ = writeln!(out, "{}\n", "=".repeat(60));
        match self.duration_secs {
            Some(d) => {
                let _ = writeln!(out, "Test Duration: {d:.1} seconds");
            }
            None => {
                let _ = writeln!(out, "Test Duration: unknown");
            }
        }
        let _ = writeln!(out, "Start Time: {}", self.start.as_deref().unwrap_or("-"));
        let _ = writeln!(out, "End Time: {}", self.end.as_deref().unwrap_or("-"));
        let _ = writeln!(out, "Data Points: {}\n", self.samples);

        let _ = writeln!(out, "CPU USAGE\n{rule}");
        let _ = writeln!(out, "Total CPU Average:    {:.2}%", self.cpu_total.avg);
        let _ = writeln!(out, "Total CPU Peak:       {:.2}%", self.cpu_total.peak);
        let _ = writeln!(out, "Target CPU Average:   {:.2}%", self.target_cpu.avg);
        let _ = writeln!(out, "Target CPU Peak:      {:.2}%\n", self.target_cpu.peak);

        let _ = writeln!(out, "MEMORY USAGE\n{rule}");
        let _ = writeln!(out, "System Memory Avg:    {:.2}%", self.memory_used_percent.avg);
        let _ = writeln!(out, "System Memory Peak:   {:.2}%", self.memory_used_percent.peak);
        let _ = writeln!(out, "Available Memory Avg: {:.2} MB", self.memory_available_mb.avg);
        let _ = writeln!(out, "Target Memory Avg:    {:.2} MB", self.target_memory_mb.avg);
        let _ = writeln!(out, "Target Memory Peak:   {:.2} MB\n", self.target_memory_mb.peak);

        if let Some(disk) = &self.disk {
            let _ = writeln!(out, "DISK I/O\n{rule}");
            let _ = writeln!(out, "Disk Reads Average:   {:.2} {}", disk.reads.avg, disk.unit);
            let _ = writeln!(out, "Disk Reads Peak:      {:.2} {}", disk.reads.peak, disk.unit);
            let _ = writeln!(out, "Disk Writes Average:  {:.2} {}", disk.writes.avg, disk.unit);
            let _ = writeln!(out, "Disk Writes Peak:     {:.2} {}\n", disk.writes.peak, disk.unit);
        }

        let _ = writeln!(out, "NETWORK\n{rule}");
        let _ = writeln!(out, "Network Average:      {:.2} bytes/sec", self.network_bytes_per_sec.avg);
        let _ = writeln!(out, "Network Peak:         {:.2} bytes/sec", self.network_bytes_per_sec.peak);
        out
    }

    pub fn write_text(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render_text())?;
        Ok(())
    }
}
