use super::columns;
use crate::config::ProfilingSettings;
use crate::error::{CoreError, CoreResult};
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use sysinfo::{CpuExt, NetworkExt, NetworksExt, ProcessExt, System, SystemExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Timestamp layout used by `typeperf`; kept identical so both sources parse the same way.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S%.3f";

/// One row of the sampler CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CPU_Total_Percent")]
    pub cpu_total_percent: f64,
    #[serde(rename = "Memory_Available_MB")]
    pub memory_available_mb: f64,
    #[serde(rename = "Memory_Used_Percent")]
    pub memory_used_percent: f64,
    #[serde(rename = "Disk_Read_Bytes_PerSec")]
    pub disk_read_bytes_per_sec: f64,
    #[serde(rename = "Disk_Write_Bytes_PerSec")]
    pub disk_write_bytes_per_sec: f64,
    #[serde(rename = "Network1_Bytes_PerSec")]
    pub network_bytes_per_sec: f64,
    #[serde(rename = "Target_CPU_Percent")]
    pub target_cpu_percent: f64,
    #[serde(rename = "Target_Memory_Bytes")]
    pub target_memory_bytes: u64,
}

impl CounterRow {
    /// Header row matching the serialized field order.
    pub fn header() -> [String; 9] {
        [
            columns::TIMESTAMP.to_string(),
            columns::CPU_TOTAL.to_string(),
            columns::MEMORY_AVAILABLE_MB.to_string(),
            columns::MEMORY_USED_PERCENT.to_string(),
            columns::DISK_READ_BYTES.to_string(),
            columns::DISK_WRITE_BYTES.to_string(),
            columns::network(1),
            columns::TARGET_CPU.to_string(),
            columns::TARGET_MEMORY_BYTES.to_string(),
        ]
    }
}

/// Per-second rate of a counter delta; zero when no time has passed.
fn per_sec(delta: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        delta as f64 / secs
    } else {
        0.0
    }
}

/// Process names match with or without a Windows `.exe` suffix.
fn is_target(process_name: &str, target: &str) -> bool {
    let name = process_name.strip_suffix(".exe").unwrap_or(process_name);
    name.eq_ignore_ascii_case(target)
}

/// Samples system-wide and target-process counters through `sysinfo`.
pub struct Sampler {
    system: System,
    interval: Duration,
    target_process: String,
    last_refresh: Instant,
}

impl Sampler {
    pub fn new(settings: &ProfilingSettings) -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system,
            interval: Duration::from_millis(settings.sample_interval_ms),
            target_process: settings.target_process.clone(),
            last_refresh: Instant::now(),
        }
    }

    /// Refresh counters and build a row from the deltas since the previous refresh.
    pub fn sample(&mut self) -> CounterRow {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_networks();
        self.system.refresh_processes();
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refresh);
        self.last_refresh = now;

        let total = self.system.total_memory();
        let available = self.system.available_memory();
        let used_percent = if total > 0 {
            (total - available.min(total)) as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let network_bytes: u64 = self
            .system
            .networks()
            .iter()
            .map(|(_, data)| data.received() + data.transmitted())
            .sum();

        let mut disk_read = 0_u64;
        let mut disk_write = 0_u64;
        let mut target_cpu = 0.0_f64;
        let mut target_memory = 0_u64;
        for process in self.system.processes().values() {
            let usage = process.disk_usage();
            disk_read += usage.read_bytes;
            disk_write += usage.written_bytes;
            if is_target(process.name(), &self.target_process) {
                target_cpu += f64::from(process.cpu_usage());
                target_memory += process.memory();
            }
        }

        CounterRow {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            cpu_total_percent: f64::from(self.system.global_cpu_info().cpu_usage()),
            memory_available_mb: available as f64 / 1_048_576.0,
            memory_used_percent: used_percent,
            disk_read_bytes_per_sec: per_sec(disk_read, elapsed),
            disk_write_bytes_per_sec: per_sec(disk_write, elapsed),
            network_bytes_per_sec: per_sec(network_bytes, elapsed),
            target_cpu_percent: target_cpu,
            target_memory_bytes: target_memory,
        }
    }

    /// Spawn the sampling task writing to `output`. Rows are flushed as they are written.
    ///
    /// The first row is taken one interval after start, so CPU usage has a baseline.
    /// sysinfo refreshes block, so each sample runs on the blocking pool.
    pub fn start(self, output: &Path) -> CoreResult<SamplerHandle> {
        let mut writer = csv::Writer::from_path(output)?;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sampler = self;
            let mut rows = 0_usize;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let (returned, row) = tokio::task::spawn_blocking(move || {
                            let row = sampler.sample();
                            (sampler, row)
                        })
                        .await
                        .map_err(|e| CoreError::tool("sampler", e.to_string()))?;
                        sampler = returned;
                        debug!(cpu = row.cpu_total_percent, "sample");
                        if let Err(err) = writer.serialize(&row).and_then(|_| writer.flush().map_err(csv::Error::from)) {
                            warn!("failed to write counter sample: {err}");
                            continue;
                        }
                        rows += 1;
                    }
                }
            }
            writer.flush()?;
            Ok::<usize, CoreError>(rows)
        });

        Ok(SamplerHandle {
            stop_tx: Some(stop_tx),
            task,
            output: output.to_path_buf(),
        })
    }
}

/// Handle to a running sampler task.
pub struct SamplerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<CoreResult<usize>>,
    output: PathBuf,
}

impl SamplerHandle {
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Signal the task to stop and wait for it; returns the number of rows written.
    pub async fn stop(mut self) -> CoreResult<usize> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| CoreError::tool("sampler", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_per_sec() {
        assert_eq!(per_sec(2048, Duration::from_secs(2)), 1024.0);
        assert_eq!(per_sec(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_is_target() {
        assert!(is_target("dotnet", "dotnet"));
        assert!(is_target("dotnet.exe", "dotnet"));
        assert!(is_target("Java", "java"));
        assert!(!is_target("dotnet-watch", "dotnet"));
    }

    #[tokio::test]
    async fn test_sampler_writes_rows_until_stopped() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("performance.csv");
        let settings = ProfilingSettings {
            sample_interval_ms: 20,
            ..ProfilingSettings::default()
        };

        let handle = Sampler::new(&settings).start(&output).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let rows = handle.stop().await.unwrap();
        assert!(rows >= 2, "expected several samples, got {rows}");

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, CounterRow::header().to_vec());
        assert_eq!(reader.records().count(), rows);
    }

    #[tokio::test]
    async fn test_sampler_waits_one_interval_before_first_row() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("performance.csv");
        let settings = ProfilingSettings {
            sample_interval_ms: 2000,
            ..ProfilingSettings::default()
        };

        let handle = Sampler::new(&settings).start(&output).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.stop().await.unwrap(), 0);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        assert_eq!(reader.records().count(), 0);
    }
}
