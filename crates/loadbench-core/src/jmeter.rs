//! JMeter invocation in non-GUI mode.

use crate::config::{ApiEnvironment, DbEnvironment};
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};

/// Find every `*.jmx` plan in `dir`, sorted by file name.
pub fn discover_plans(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut plans = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_plan = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jmx"))
            .unwrap_or(false);
        if path.is_file() && is_plan {
            plans.push(path);
        }
    }

    if plans.is_empty() {
        return Err(CoreError::not_found(
            "JMeter test plan",
            format!("*.jmx in {}", dir.display()),
        ));
    }

    plans.sort();
    Ok(plans)
}

/// `-J` properties that point an API test plan at an environment.
pub fn api_properties(env: &ApiEnvironment) -> Vec<(String, String)> {
    vec![
        ("BASE_URL".to_string(), env.jmeter_host().to_string()),
        ("PORT".to_string(), env.jmeter_port().to_string()),
        ("PROTOCOL".to_string(), env.jmeter_protocol().to_string()),
    ]
}

/// `-J` properties for plans that drive the database through a JDBC sampler.
pub fn db_properties(env: &DbEnvironment) -> Vec<(String, String)> {
    vec![
        ("DB_SERVER".to_string(), env.host().to_string()),
        ("DB_PORT".to_string(), env.port().to_string()),
        ("DB_NAME".to_string(), env.database.clone()),
        ("DB_USER".to_string(), env.username().to_string()),
        ("DB_PASSWORD".to_string(), env.password().to_string()),
    ]
}

/// Output files produced by one plan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub results: PathBuf,
    pub log: PathBuf,
    pub report_dir: PathBuf,
}

impl Artifacts {
    /// Artifact paths for `plan` under `results_dir`, named after the plan stem.
    pub fn for_plan(plan: &Path, results_dir: &Path) -> Self {
        let stem = plan
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("test");
        Self {
            results: results_dir.join(format!("{stem}_results.jtl")),
            log: results_dir.join(format!("{stem}_jmeter.log")),
            report_dir: results_dir.join(format!("{stem}_report")),
        }
    }

    /// Remove leftovers from a previous run. JMeter refuses a non-empty `-o` directory.
    pub fn clear(&self) -> CoreResult<()> {
        for file in [&self.results, &self.log] {
            if file.exists() {
                std::fs::remove_file(file)?;
            }
        }
        if self.report_dir.exists() {
            std::fs::remove_dir_all(&self.report_dir)?;
        }
        Ok(())
    }

    /// Presence of each expected output, labelled for the final report.
    pub fn verify(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("JMeter Results", self.results.exists()),
            ("JMeter Log", self.log.exists()),
            ("HTML Report", self.report_dir.join("index.html").exists()),
        ]
    }
}

/// A single non-GUI JMeter run.
#[derive(Debug, Clone)]
pub struct JmeterRun {
    binary: String,
    plan: PathBuf,
    artifacts: Artifacts,
    properties: Vec<(String, String)>,
    html_report: bool,
    timeout: Option<Duration>,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code; `None` when the process was killed or terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub timed_out: bool,
    pub artifacts: Artifacts,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

impl JmeterRun {
    pub fn new(binary: impl Into<String>, plan: impl Into<PathBuf>, results_dir: &Path) -> Self {
        let plan = plan.into();
        let artifacts = Artifacts::for_plan(&plan, results_dir);
        Self {
            binary: binary.into(),
            plan,
            artifacts,
            properties: Vec::new(),
            html_report: true,
            timeout: None,
        }
    }

    pub fn properties(mut self, props: impl IntoIterator<Item = (String, String)>) -> Self {
        self.properties.extend(props);
        self
    }

    pub fn html_report(mut self, enabled: bool) -> Self {
        self.html_report = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    /// Command-line arguments, without the binary.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            "-t".to_string(),
            self.plan.display().to_string(),
        ];
        for (key, value) in &self.properties {
            args.push(format!("-J{key}={value}"));
        }
        args.push("-l".to_string());
        args.push(self.artifacts.results.display().to_string());
        args.push("-j".to_string());
        args.push(self.artifacts.log.display().to_string());
        if self.html_report {
            args.push("-e".to_string());
            args.push("-o".to_string());
            args.push(self.artifacts.report_dir.display().to_string());
        }
        args
    }

    /// Clear stale artifacts, spawn JMeter and wait for it to exit.
    pub async fn run(&self) -> CoreResult<RunOutcome> {
        if !self.plan.exists() {
            return Err(CoreError::not_found(
                "JMeter test plan",
                self.plan.display().to_string(),
            ));
        }
        if let Some(parent) = self.artifacts.results.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.artifacts.clear()?;

        info!(plan = %self.plan.display(), "starting JMeter");
        let start = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CoreError::tool("jmeter", format!("failed to start {}: {e}", self.binary)))?;

        let (status, timed_out) = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => (Some(status?), false),
                    Err(_) => {
                        warn!("JMeter exceeded {:.1}s; killing process", limit.as_secs_f64());
                        child.kill().await?;
                        (None, true)
                    }
                }
            }
            None => (Some(child.wait().await?), false),
        };

        let outcome = RunOutcome {
            exit_code: status.and_then(|s| s.code()),
            duration: start.elapsed(),
            timed_out,
            artifacts: self.artifacts.clone(),
        };

        if outcome.success() {
            info!("JMeter finished in {:.2}s", outcome.duration.as_secs_f64());
        } else {
            warn!(
                "JMeter exited with {:?} after {:.2}s",
                outcome.exit_code,
                outcome.duration.as_secs_f64()
            );
        }
        Ok(outcome)
    }
}

/// Check that the JMeter binary is on `PATH`.
pub async fn check_installed(binary: &str) -> CoreResult<String> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| CoreError::tool("jmeter", format!("{binary} not found: {e}")))?;

    if !output.status.success() {
        return Err(CoreError::tool(
            "jmeter",
            format!("{binary} --version exited with {}", output.status),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .find(|line| line.contains('.'))
        .unwrap_or("unknown version")
        .trim()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn api_env() -> ApiEnvironment {
        ApiEnvironment {
            base_url: "https://books.example.com".to_string(),
            host: Some("books.example.com".to_string()),
            port: Some(443),
            protocol: Some("https".to_string()),
            api_prefix: None,
            headers: None,
            verify_ssl: false,
            timeout: None,
            description: None,
        }
    }

    #[test]
    fn test_args_for_api_plan() {
        let run = JmeterRun::new("jmeter", "plans/01_Authors_GET_All.jmx", Path::new("results"))
            .properties(api_properties(&api_env()));

        let args = run.args();
        assert_eq!(&args[..3], &["-n", "-t", "plans/01_Authors_GET_All.jmx"]);
        assert!(args.contains(&"-JBASE_URL=books.example.com".to_string()));
        assert!(args.contains(&"-JPORT=443".to_string()));
        assert!(args.contains(&"-JPROTOCOL=https".to_string()));

        let l = args.iter().position(|a| a == "-l").unwrap();
        assert!(args[l + 1].ends_with("01_Authors_GET_All_results.jtl"));
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert!(args[o + 1].ends_with("01_Authors_GET_All_report"));
    }

    #[test]
    fn test_args_without_html_report() {
        let run = JmeterRun::new("jmeter", "db.jmx", Path::new("out")).html_report(false);
        let args = run.args();
        assert!(!args.contains(&"-e".to_string()));
        assert!(!args.contains(&"-o".to_string()));
    }

    #[test]
    fn test_db_properties() {
        let env = DbEnvironment {
            host: None,
            server: Some("sql.internal,1433".to_string()),
            port: None,
            database: "BookService".to_string(),
            username: Some("sa".to_string()),
            password: None,
            schema: None,
        };
        let props = db_properties(&env);
        assert_eq!(props[0], ("DB_SERVER".to_string(), "sql.internal".to_string()));
        assert_eq!(props[1], ("DB_PORT".to_string(), "1433".to_string()));
        assert_eq!(props[4], ("DB_PASSWORD".to_string(), String::new()));
    }

    #[test]
    fn test_discover_plans_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["06_Books_GET_All.jmx", "01_Authors_GET_All.jmx", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let plans = discover_plans(dir.path()).unwrap();
        let names: Vec<_> = plans
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["01_Authors_GET_All.jmx", "06_Books_GET_All.jmx"]);
    }

    #[test]
    fn test_discover_plans_empty_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(discover_plans(dir.path()).is_err());
    }

    #[test]
    fn test_clear_and_verify_artifacts() {
        let dir = TempDir::new().unwrap();
        let artifacts = Artifacts::for_plan(Path::new("smoke.jmx"), dir.path());
        std::fs::write(&artifacts.results, "stale").unwrap();
        std::fs::create_dir_all(&artifacts.report_dir).unwrap();
        std::fs::write(artifacts.report_dir.join("index.html"), "").unwrap();

        let before = artifacts.verify();
        assert_eq!(before[0], ("JMeter Results", true));
        assert_eq!(before[2], ("HTML Report", true));

        artifacts.clear().unwrap();
        assert!(artifacts.verify().iter().all(|(_, exists)| !exists));
    }

    #[tokio::test]
    async fn test_run_missing_plan_fails_before_spawn() {
        let dir = TempDir::new().unwrap();
        let run = JmeterRun::new("jmeter", dir.path().join("missing.jmx"), dir.path());
        let err = run.run().await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[cfg(unix)]
    fn fake_jmeter(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-jmeter.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_kills_process_after_timeout() {
        let dir = TempDir::new().unwrap();
        let plan = dir.path().join("slow.jmx");
        std::fs::write(&plan, "<jmeterTestPlan/>").unwrap();
        let binary = fake_jmeter(dir.path(), "sleep 5");

        let outcome = JmeterRun::new(binary, &plan, &dir.path().join("results"))
            .timeout(Some(Duration::from_millis(100)))
            .run()
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert!(!outcome.success());
        assert!(outcome.duration < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_within_timeout_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        let plan = dir.path().join("quick.jmx");
        std::fs::write(&plan, "<jmeterTestPlan/>").unwrap();
        let binary = fake_jmeter(dir.path(), "exit 0");

        let outcome = JmeterRun::new(binary, &plan, &dir.path().join("results"))
            .timeout(Some(Duration::from_secs(30)))
            .run()
            .await
            .unwrap();

        assert!(!outcome.timed_out);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.success());
    }
}
