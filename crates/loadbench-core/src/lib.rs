//! Core building blocks for loadbench: configuration, JMeter invocation,
//! result analysis and OS-counter profiling.

pub mod config;
pub mod error;
pub mod jmeter;
pub mod jtl;
pub mod profiling;
pub mod report;

pub use config::{
    load_environment, ApiConfigFile, ApiEnvironment, DbEnvironment, EndpointConfig,
    EnvironmentFile, ProfilingSettings, Settings,
};
pub use error::{CoreError, CoreResult};
pub use jmeter::{Artifacts, JmeterRun, RunOutcome};
pub use jtl::{LabelStats, RunStats, Sample};
pub use profiling::{CounterSource, PerfSummary, Profiler, Stat};
pub use report::{ReportFormat, ResultWriter, SuccessCriteria};
