use super::{banner, Target};
use anyhow::{bail, Context, Result};
use loadbench_db::petclinic::{
    cleanup_test_data, foreign_key_issues, health_counts, refresh_common_last_names, refresh_multi_pet_owners,
    verify_csv_data, Severity, COMMON_LAST_NAMES_CSV, MULTI_PET_OWNERS_CSV,
};
use std::path::Path;

pub async fn refresh_csv(target: &Target, out_dir: &Path) -> Result<()> {
    banner("PET CLINIC CSV DATA REFRESH");
    let (_, pool) = target.pool().await?;

    let owners = refresh_multi_pet_owners(&pool, out_dir)
        .await
        .context("failed to refresh multi-pet owners")?;
    println!("\n{MULTI_PET_OWNERS_CSV}:");
    for owner in &owners {
        println!(
            "  owner {:>5} {:<20} {} pets, {} visits",
            owner.id, owner.last_name, owner.pets, owner.visits
        );
    }

    let names = refresh_common_last_names(&pool, out_dir)
        .await
        .context("failed to refresh common last names")?;
    println!("\n{COMMON_LAST_NAMES_CSV}:");
    for (name, count) in &names {
        println!("  {name:<20} {count} owner(s)");
    }

    println!("\nVerifying CSV data against the database...");
    let verification = verify_csv_data(&pool, out_dir).await?;
    if !verification.passed() {
        let failed = verification.checks.iter().filter(|c| !c.ok).count();
        bail!("{failed} CSV data check(s) failed");
    }
    println!("\n✓ CSV data refreshed and verified");
    Ok(())
}

pub async fn validate(target: &Target, cleanup: bool) -> Result<()> {
    banner("PET CLINIC DATABASE VALIDATION");
    let (_, pool) = target.pool().await?;

    if cleanup {
        let removed = cleanup_test_data(&pool).await.context("cleanup failed")?;
        println!(
            "\nCleanup: {} pets, {} visits, {} owners removed",
            removed.pets, removed.visits, removed.owners
        );
    }

    let counts = health_counts(&pool).await?;
    println!("\nRow counts:");
    for (table, rows) in counts.rows() {
        println!("  {table:<12} {rows:>8}");
    }

    let findings = counts.findings();
    let mut errors = 0;
    for (severity, message) in &findings {
        match severity {
            Severity::Warning => println!("  ⚠ WARNING: {message}"),
            Severity::Error => {
                errors += 1;
                println!("  ✗ ERROR: {message}");
            }
        }
    }

    let issues = foreign_key_issues(&pool).await?;
    println!("\nForeign key consistency:");
    if issues.is_empty() {
        println!("  ✓ no orphaned rows");
    }
    for issue in &issues {
        println!("  ✗ {issue}");
    }

    if errors > 0 || !issues.is_empty() {
        bail!(
            "validation failed: {errors} data error(s), {} foreign key issue(s)",
            issues.len()
        );
    }
    println!("\n✓ Database is ready for performance testing");
    Ok(())
}
