//! Configuration management for loadbench
//!
//! Two kinds of configuration live here:
//! - environment files (`db_config.json`, `api_config.json`): named sets of
//!   connection parameters, one of which is selected with `--env`
//! - tool [`Settings`]: defaults, an optional settings file, then
//!   `LOADBENCH__*` environment variable overrides

use crate::error::{CoreError, CoreResult};
use crate::report::SuccessCriteria;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Postgres port used when an environment omits one.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Root of an environment file: `{ "environments": { "<name>": { .. } } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentFile<T> {
    pub environments: BTreeMap<String, T>,
}

impl<T: DeserializeOwned> EnvironmentFile<T> {
    /// Read and deserialize an environment file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::not_found(
                "configuration file",
                path.display().to_string(),
            ));
        }

        let file: Self = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json))
            .build()?
            .try_deserialize()?;
        Ok(file)
    }

    /// Names of all environments in the file, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }

    /// Select one environment by name.
    pub fn select(mut self, name: &str) -> CoreResult<T> {
        let key = self
            .environments
            .keys()
            .find(|k| k.as_str() == name)
            .or_else(|| {
                self.environments
                    .keys()
                    .find(|k| k.eq_ignore_ascii_case(name))
            })
            .cloned();

        match key.and_then(|k| self.environments.remove(&k)) {
            Some(env) => Ok(env),
            None => Err(CoreError::not_found(
                "environment",
                format!("{name} (available: {})", self.names().join(", ")),
            )),
        }
    }
}

/// Load a single named environment from a JSON environment file.
pub fn load_environment<T: DeserializeOwned>(path: impl AsRef<Path>, name: &str) -> CoreResult<T> {
    EnvironmentFile::<T>::from_file(path)?.select(name)
}

/// Database connection parameters for one environment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DbEnvironment {
    /// Host name. Either `host` or `server` must be set.
    #[serde(default)]
    pub host: Option<String>,

    /// SQL-Server style server, optionally `host,port`.
    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    pub database: String,

    #[serde(default, alias = "user")]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Schema holding the application tables (`public` when omitted).
    #[serde(default)]
    pub schema: Option<String>,
}

impl DbEnvironment {
    /// Host name with any `,port` suffix removed.
    pub fn host(&self) -> &str {
        let raw = self
            .host
            .as_deref()
            .or(self.server.as_deref())
            .unwrap_or("localhost");
        raw.split(',').next().unwrap_or(raw).trim()
    }

    /// Explicit port, else the one embedded in `server`, else 5432.
    pub fn port(&self) -> u16 {
        if let Some(port) = self.port {
            return port;
        }
        self.server
            .as_deref()
            .and_then(|s| s.split_once(','))
            .and_then(|(_, p)| p.trim().parse().ok())
            .unwrap_or(DEFAULT_DB_PORT)
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }

    /// `host:port/database`, for banners and logs. Never includes credentials.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host(), self.port(), self.database)
    }
}

/// REST API parameters for one environment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ApiEnvironment {
    pub base_url: String,

    /// Host passed to JMeter as `BASE_URL`.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub protocol: Option<String>,

    #[serde(default)]
    pub api_prefix: Option<String>,

    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub verify_ssl: bool,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,

    #[serde(default)]
    pub description: Option<String>,
}

impl ApiEnvironment {
    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn api_prefix(&self) -> &str {
        self.api_prefix.as_deref().unwrap_or("/api")
    }

    /// Configured headers, or JSON accept/content-type.
    pub fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone().unwrap_or_else(|| {
            BTreeMap::from([
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ])
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.filter(|t| *t > 0.0).unwrap_or(10.0))
    }

    pub fn jmeter_host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    pub fn jmeter_port(&self) -> u16 {
        self.port.unwrap_or(80)
    }

    pub fn jmeter_protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or("http")
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("N/A")
    }
}

/// One entry under the top-level `endpoints` key of `api_config.json`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    #[serde(default)]
    pub path: Option<String>,
}

/// The full API config file, including the optional `endpoints` map.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfigFile {
    pub environments: BTreeMap<String, ApiEnvironment>,

    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl ApiConfigFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::not_found(
                "configuration file",
                path.display().to_string(),
            ));
        }
        let file: Self = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json))
            .build()?
            .try_deserialize()?;
        Ok(file)
    }

    /// Select one environment by name, keeping the endpoint map alongside it.
    pub fn select(self, name: &str) -> CoreResult<(ApiEnvironment, BTreeMap<String, EndpointConfig>)> {
        let endpoints = self.endpoints;
        let env = EnvironmentFile {
            environments: self.environments,
        }
        .select(name)?;
        Ok((env, endpoints))
    }

    /// Resource name and collection path for each known resource.
    ///
    /// Falls back to the book-store resources when the file lists none.
    pub fn resource_paths(
        endpoints: &BTreeMap<String, EndpointConfig>,
        api_prefix: &str,
    ) -> Vec<(String, String)> {
        if endpoints.is_empty() {
            return vec![
                ("Authors".to_string(), "/api/Authors".to_string()),
                ("Books".to_string(), "/api/Books".to_string()),
            ];
        }

        endpoints
            .iter()
            .map(|(resource, cfg)| {
                let name = capitalize(resource);
                let path = cfg
                    .path
                    .clone()
                    .unwrap_or_else(|| format!("{api_prefix}/{name}"));
                (name, path)
            })
            .collect()
    }
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Tool settings shared by every subcommand.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// JMeter executable (`jmeter`, or `jmeter.bat` on Windows).
    pub jmeter_bin: String,

    /// Directory that receives JTL files, logs, HTML reports and profiling data.
    pub results_dir: PathBuf,

    /// Seconds before JMeter is killed; 0 waits indefinitely.
    pub jmeter_timeout_secs: u64,

    pub profiling: ProfilingSettings,

    /// Pass/fail thresholds applied to every run report.
    #[serde(default)]
    pub criteria: SuccessCriteria,
}

/// Performance-counter sampling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfilingSettings {
    pub sample_interval_ms: u64,

    /// Delay after starting the sampler, before the load tool starts.
    pub warmup_secs: u64,

    /// Delay after the load tool exits, before the sampler stops.
    pub cooldown_secs: u64,

    /// Process whose CPU and memory are tracked separately (the API under test).
    pub target_process: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jmeter_bin: default_jmeter_bin().to_string(),
            results_dir: PathBuf::from("results"),
            jmeter_timeout_secs: 0,
            profiling: ProfilingSettings::default(),
            criteria: SuccessCriteria::default(),
        }
    }
}

impl Default for ProfilingSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            warmup_secs: 2,
            cooldown_secs: 2,
            target_process: "dotnet".to_string(),
        }
    }
}

fn default_jmeter_bin() -> &'static str {
    if cfg!(windows) {
        "jmeter.bat"
    } else {
        "jmeter"
    }
}

impl Settings {
    /// Load settings with precedence:
    /// 1. Environment variables (`LOADBENCH__PROFILING__TARGET_PROCESS=java`)
    /// 2. File named by `LOADBENCH_CONFIG`
    /// 3. `./loadbench.{json,yaml,toml}`
    /// 4. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        if let Ok(config_path) = std::env::var("LOADBENCH_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./loadbench").required(false))
            .add_source(
                Environment::with_prefix("LOADBENCH")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("jmeter_bin", default_jmeter_bin())?
            .set_default("results_dir", "results")?
            .set_default("jmeter_timeout_secs", 0)?
            .set_default("profiling.sample_interval_ms", 1000)?
            .set_default("profiling.warmup_secs", 2)?
            .set_default("profiling.cooldown_secs", 2)?
            .set_default("profiling.target_process", "dotnet")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jmeter_bin.trim().is_empty() {
            return Err(ConfigError::Message("jmeter_bin must not be empty".to_string()));
        }
        if self.profiling.sample_interval_ms == 0 {
            return Err(ConfigError::Message(
                "profiling.sample_interval_ms must be > 0".to_string(),
            ));
        }
        if self.profiling.target_process.trim().is_empty() {
            return Err(ConfigError::Message(
                "profiling.target_process must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn jmeter_timeout(&self) -> Option<Duration> {
        (self.jmeter_timeout_secs > 0).then(|| Duration::from_secs(self.jmeter_timeout_secs))
    }

    pub fn profiling_dir(&self) -> PathBuf {
        self.results_dir.join("profiling")
    }
}
