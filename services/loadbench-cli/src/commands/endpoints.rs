//! Direct REST checks, without JMeter.

use super::{banner, Target};
use anyhow::{bail, Context, Result};
use chrono::Local;
use loadbench_http::crud::Outcome;
use loadbench_http::{crud_walkthrough, smoke_test};
use serde_json::Value;
use std::path::Path;

fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("\nResults saved to {}", path.display());
    Ok(())
}

pub async fn smoke(target: &Target, output: Option<&Path>) -> Result<()> {
    banner("ENDPOINT SMOKE TEST");
    let (client, _) = target.client()?;
    let report = smoke_test(&client).await;

    println!();
    for result in &report.results {
        let mark = if result.ok { "✓" } else { "✗" };
        match (&result.status, &result.error) {
            (Some(status), _) => println!(
                "  {mark} {:<20} {status}  {:.3}s  {} bytes",
                result.name, result.elapsed_secs, result.size
            ),
            (None, Some(err)) => println!("  {mark} {:<20} error: {err}", result.name),
            (None, None) => println!("  {mark} {:<20} no response", result.name),
        }
    }
    println!("\n{}/{} endpoints working", report.passed(), report.total());

    if let Some(path) = output {
        write_json(path, &serde_json::to_value(&report)?)?;
    }
    if !report.all_passed() {
        bail!("{} endpoint(s) failed", report.total() - report.passed());
    }
    Ok(())
}

pub async fn crud(target: &Target, output: Option<&Path>) -> Result<()> {
    banner("CRUD ENDPOINT TEST");
    let (client, _) = target.client()?;
    let report = crud_walkthrough(&client).await;

    let mut resource = "";
    for step in &report.steps {
        if step.resource != resource {
            resource = step.resource.as_str();
            println!("\n{resource}:");
        }
        let outcome = match &step.outcome {
            Outcome::Pass => "PASS".to_string(),
            Outcome::Fail(code) => format!("FAIL ({code})"),
            Outcome::Error(err) => format!("ERROR ({err})"),
            Outcome::Skipped => "SKIPPED".to_string(),
        };
        println!("  {:<8} {:<7} {:<30} {outcome}", step.operation, step.method, step.path);
    }
    println!(
        "\n{}/{} steps passed ({:.1}%)",
        report.passed(),
        report.attempted(),
        report.success_rate()
    );

    if let Some(path) = output {
        write_json(path, &serde_json::to_value(&report)?)?;
    }
    if report.passed() < report.steps.len() {
        bail!("{} CRUD step(s) did not pass", report.steps.len() - report.passed());
    }
    Ok(())
}

pub async fn discover(target: &Target, output: Option<&Path>) -> Result<()> {
    banner("API DISCOVERY");
    let (client, endpoints) = target.client()?;
    let discovery = loadbench_http::discover(&client, &endpoints).await;

    println!("\nAvailable:");
    for route in discovery.available.iter().chain(&discovery.extra) {
        println!("  ✓ {} {}", route.method, route.path);
    }
    println!("\nUnavailable:");
    for route in &discovery.unavailable {
        let status = route.status.map(|s| s.to_string()).unwrap_or_else(|| "no response".to_string());
        println!("  ✗ {} {} ({status})", route.method, route.path);
    }
    println!("\nKnown but not probed:");
    for route in &discovery.untested {
        println!("  - {} {}", route.method, route.path);
    }

    if let Some(path) = output {
        let json = discovery.to_json(
            &target.env,
            &client.env().base_url,
            Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        );
        write_json(path, &json)?;
    }
    Ok(())
}
