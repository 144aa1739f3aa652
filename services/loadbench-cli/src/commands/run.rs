//! JMeter plan execution with optional counter sampling and reporting.

use super::db::{print_export, reseed};
use super::{banner, Target};
use anyhow::{bail, Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use loadbench_core::jmeter::{api_properties, check_installed, db_properties, discover_plans};
use loadbench_core::profiling::clean_counter_csv;
use loadbench_core::{
    CounterSource, JmeterRun, PerfSummary, Profiler, ReportFormat, ResultWriter, RunOutcome, RunStats, Settings,
};
use loadbench_db::export_ids;
use loadbench_http::reset_via_api;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub profile: bool,
    pub db_plan: bool,
    pub reset_via_api: bool,
    pub seed: Option<usize>,
    pub strict: bool,
}

/// What one plan run produced.
#[derive(Debug)]
pub struct PlanResult {
    pub name: String,
    pub outcome: RunOutcome,
    pub criteria_passed: bool,
    pub report: PathBuf,
}

impl PlanResult {
    pub fn passed(&self, strict: bool) -> bool {
        self.outcome.success() && (!strict || self.criteria_passed)
    }
}

fn plan_name(plan: &Path) -> String {
    plan.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string())
}

/// Stop the profiler, clean its CSV and summarize it. Failures only warn.
async fn finish_profiling(profiler: Profiler, settings: &Settings, stamp: &str) -> Option<PerfSummary> {
    tokio::time::sleep(Duration::from_secs(settings.profiling.cooldown_secs)).await;
    let raw = match profiler.stop().await {
        Ok(raw) => raw,
        Err(err) => {
            warn!("could not stop profiler: {err}");
            return None;
        }
    };

    let clean = settings.profiling_dir().join(format!("performance_{stamp}_clean.csv"));
    if let Err(err) = clean_counter_csv(&raw, &clean) {
        warn!("could not clean {}: {err}", raw.display());
        return None;
    }
    println!("  ✓ Performance CSV: {}", clean.display());

    let summary = match PerfSummary::from_csv(&clean) {
        Ok(summary) => summary,
        Err(err) => {
            warn!("could not summarize {}: {err}", clean.display());
            return None;
        }
    };
    let text = settings.profiling_dir().join("graphs").join("performance_summary.txt");
    match summary.write_text(&text) {
        Ok(()) => println!("  ✓ Performance summary: {}", text.display()),
        Err(err) => warn!("could not write {}: {err}", text.display()),
    }
    Some(summary)
}

/// Run one plan with the given `-J` properties and write its reports.
pub async fn execute_plan(
    settings: &Settings,
    plan: &Path,
    properties: Vec<(String, String)>,
    profile: bool,
) -> Result<PlanResult> {
    let name = plan_name(plan);
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let jmeter = JmeterRun::new(&settings.jmeter_bin, plan, &settings.results_dir)
        .properties(properties)
        .html_report(true)
        .timeout(settings.jmeter_timeout());

    let profiler = if profile {
        let raw = settings.profiling_dir().join(format!("performance_{stamp}.csv"));
        let profiler = Profiler::start(CounterSource::default_for_platform(), &raw, &settings.profiling)
            .await
            .context("failed to start performance sampling")?;
        tokio::time::sleep(Duration::from_secs(settings.profiling.warmup_secs)).await;
        Some(profiler)
    } else {
        None
    };

    // the profiler has to stop even when JMeter could not be started
    let outcome = jmeter.run().await;
    let perf = match profiler {
        Some(profiler) => finish_profiling(profiler, settings, &stamp).await,
        None => None,
    };
    let outcome = outcome.with_context(|| format!("failed to run {}", plan.display()))?;

    println!("\nVerifying output files:");
    for (label, exists) in outcome.artifacts.verify() {
        println!("  {} {label}", if exists { "✓" } else { "✗" });
    }

    let stats = match RunStats::from_file(&outcome.artifacts.results) {
        Ok(stats) => stats,
        Err(err) => {
            warn!("no usable results in {}: {err}", outcome.artifacts.results.display());
            RunStats::default()
        }
    };
    let writer = ResultWriter::new(&name, stats, perf, settings.criteria.clone());
    let report = settings.results_dir.join(format!("{name}_summary.{}", ReportFormat::Markdown.extension()));
    writer.write_report(&report, ReportFormat::Markdown)?;
    writer.write_report(report.with_extension(ReportFormat::Json.extension()), ReportFormat::Json)?;

    let overall = &writer.stats().overall;
    println!("\nSamples: {} ({} failed)", overall.samples, overall.failures);
    println!("P95: {}ms  Throughput: {:.1}/s", overall.p95_ms, writer.stats().throughput());
    println!("Criteria: {}", writer.failure_summary());

    Ok(PlanResult {
        name,
        criteria_passed: writer.passes(),
        outcome,
        report,
    })
}

pub async fn run(target: &Target, settings: &Settings, plan: &Path, options: &RunOptions) -> Result<()> {
    banner(&format!("JMETER RUN: {}", plan.display()));
    let version = check_installed(&settings.jmeter_bin).await.context("JMeter is not available")?;
    println!("JMeter: {version}");

    if options.reset_via_api {
        let (client, _) = target.client()?;
        let reset = reset_via_api(&client).await.context("API reset failed")?;
        println!(
            "Reset via API: {} authors and {} books created",
            reset.authors_created.len(),
            reset.books_created.len()
        );
    }

    if let Some(count) = options.seed {
        let (env, pool) = target.pool().await?;
        reseed(&pool, env.schema(), count).await?;
    }

    let properties = if options.db_plan {
        db_properties(&target.db_env()?)
    } else {
        let (env, _) = target.api_env()?;
        println!("Target: {}://{}:{}", env.jmeter_protocol(), env.jmeter_host(), env.jmeter_port());
        api_properties(&env)
    };

    let result = execute_plan(settings, plan, properties, options.profile).await?;

    println!("\nResults:");
    println!("  JTL:    {}", result.outcome.artifacts.results.display());
    println!("  Log:    {}", result.outcome.artifacts.log.display());
    println!("  HTML:   {}", result.outcome.artifacts.report_dir.join("index.html").display());
    println!("  Report: {}", result.report.display());

    if !result.passed(options.strict) {
        if result.outcome.timed_out {
            bail!("{} timed out", result.name);
        }
        bail!("{} failed", result.name);
    }
    println!("\n✓ {} completed in {:.1}s", result.name, result.outcome.duration.as_secs_f64());
    Ok(())
}

pub async fn run_all(target: &Target, settings: &Settings, plans_dir: &Path, count: usize, strict: bool) -> Result<()> {
    banner("RUN ALL JMETER PLANS");
    let started = Local::now();
    let clock = Instant::now();
    println!("Start: {}", started.format("%Y-%m-%d %H:%M:%S"));

    check_installed(&settings.jmeter_bin).await.context("JMeter is not available")?;
    let plans = discover_plans(plans_dir)?;
    println!("Found {} plans in {}", plans.len(), plans_dir.display());

    // one reset for the whole batch; a failure here still lets the plans run
    match target.pool().await {
        Ok((env, pool)) => {
            if let Err(err) = reseed(&pool, env.schema(), count).await {
                warn!("reset failed, continuing with existing data: {err:#}");
            }
            match export_ids(&pool, plans_dir).await {
                Ok(summary) => print_export(plans_dir, &summary),
                Err(err) => warn!("id export failed: {err}"),
            }
        }
        Err(err) => warn!("database unavailable, skipping reset: {err:#}"),
    }

    let (env, _) = target.api_env()?;
    let progress = ProgressBar::new(plans.len() as u64);
    progress.set_style(ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?);

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    for plan in &plans {
        let name = plan_name(plan);
        progress.set_message(name.clone());
        info!("running {name}");
        match execute_plan(settings, plan, api_properties(&env), false).await {
            Ok(result) if result.passed(strict) => passed.push(name),
            Ok(_) => failed.push(name),
            Err(err) => {
                warn!("{name}: {err:#}");
                failed.push(name);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    banner("SUMMARY");
    println!("Start:    {}", started.format("%Y-%m-%d %H:%M:%S"));
    println!("End:      {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Duration: {:.1}s", clock.elapsed().as_secs_f64());
    println!("Passed:   {}", passed.len());
    println!("Failed:   {}", failed.len());
    println!(
        "Pass rate: {:.1}%",
        passed.len() as f64 / plans.len() as f64 * 100.0
    );
    for name in &failed {
        println!("  ✗ {name}");
    }

    if !failed.is_empty() {
        bail!("{} of {} plans failed", failed.len(), plans.len());
    }
    Ok(())
}
