//! OS performance-counter sampling alongside a load test.
//!
//! A profiler is started before JMeter, left running for the whole test and
//! stopped afterwards. Every source writes one CSV row per interval; the
//! `typeperf` output is rewritten to the canonical column names by
//! [`clean_counter_csv`] so that [`PerfSummary`] can read either.

mod counters;
mod sampler;
mod summary;

pub use counters::{clean_counter_csv, decode_text, typeperf_command, CsvLayout};
pub use sampler::{CounterRow, Sampler, SamplerHandle};
pub use summary::{PerfSummary, Stat};

use crate::config::ProfilingSettings;
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Canonical column names shared by every counter source.
pub mod columns {
    pub const TIMESTAMP: &str = "Timestamp";
    pub const CPU_TOTAL: &str = "CPU_Total_Percent";
    pub const MEMORY_AVAILABLE_MB: &str = "Memory_Available_MB";
    pub const MEMORY_USED_PERCENT: &str = "Memory_Used_Percent";
    pub const DISK_READS: &str = "Disk_Reads_PerSec";
    pub const DISK_WRITES: &str = "Disk_Writes_PerSec";
    pub const DISK_READ_BYTES: &str = "Disk_Read_Bytes_PerSec";
    pub const DISK_WRITE_BYTES: &str = "Disk_Write_Bytes_PerSec";
    pub const TARGET_CPU: &str = "Target_CPU_Percent";
    pub const TARGET_MEMORY_BYTES: &str = "Target_Memory_Bytes";

    /// Name of the `n`th (1-based) network interface column.
    pub fn network(n: usize) -> String {
        format!("Network{n}_Bytes_PerSec")
    }

    pub fn is_network(name: &str) -> bool {
        name.starts_with("Network") && name.ends_with("_Bytes_PerSec")
    }
}

/// Where counter samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterSource {
    /// In-process sampling through `sysinfo`.
    Sysinfo,
    /// The Windows `typeperf` tool, run as a subprocess.
    Typeperf,
}

impl CounterSource {
    pub fn default_for_platform() -> Self {
        if cfg!(windows) {
            Self::Typeperf
        } else {
            Self::Sysinfo
        }
    }
}

/// A running profiler of either source.
pub enum Profiler {
    Sampler(SamplerHandle),
    Typeperf { child: Child, output: PathBuf },
}

impl Profiler {
    /// Start sampling into `output` (raw CSV, before cleaning).
    pub async fn start(
        source: CounterSource,
        output: &Path,
        settings: &ProfilingSettings,
    ) -> CoreResult<Self> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match source {
            CounterSource::Sysinfo => {
                let handle = Sampler::new(settings).start(output)?;
                info!(output = %output.display(), "started sysinfo sampler");
                Ok(Self::Sampler(handle))
            }
            CounterSource::Typeperf => {
                let (program, args) = typeperf_command(
                    &settings.target_process,
                    Duration::from_millis(settings.sample_interval_ms),
                    output,
                );
                let child = Command::new(program)
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| CoreError::tool("typeperf", e.to_string()))?;
                info!(output = %output.display(), "started typeperf");
                Ok(Self::Typeperf {
                    child,
                    output: output.to_path_buf(),
                })
            }
        }
    }

    /// Stop sampling and return the raw output path.
    pub async fn stop(self) -> CoreResult<PathBuf> {
        match self {
            Self::Sampler(handle) => {
                let output = handle.output().to_path_buf();
                let rows = handle.stop().await?;
                info!("sampler stopped after {rows} samples");
                Ok(output)
            }
            Self::Typeperf { mut child, output } => {
                if let Err(err) = child.kill().await {
                    warn!("could not stop typeperf: {err}");
                }
                Ok(output)
            }
        }
    }
}
