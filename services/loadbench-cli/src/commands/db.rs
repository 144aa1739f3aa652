//! Book-store database commands: seeding, id export and schema inspection.

use super::{banner, Target};
use anyhow::{Context, Result};
use chrono::Local;
use loadbench_db::bookstore::ExportSummary;
use loadbench_db::schema::{columns, foreign_keys, list_tables, primary_keys};
use loadbench_db::{
    deletion_order, export_ids, list_ids, purge_all, server_version, table_summary, PgPool, Populator, Seeded,
};
use std::path::Path;
use tracing::warn;

/// Purge every table, then populate `count` records; 0 leaves the tables empty.
pub async fn reseed(pool: &PgPool, schema: &str, count: usize) -> Result<Seeded> {
    println!("\nDeleting existing data...");
    let purged = purge_all(pool, schema).await.context("failed to purge tables")?;
    for (table, rows) in &purged.deleted {
        println!("  ✓ {table}: {rows} rows deleted");
    }
    for table in &purged.skipped {
        println!("  - {table}: already empty");
    }
    println!("Total deleted: {}", purged.total_deleted());

    if count == 0 {
        println!("\nCount is 0: tables purged, nothing inserted");
        return Ok(Seeded::default());
    }

    println!("\nPopulating {count} authors, {} books, {count} customers...", count * 2);
    let seeded = Populator::new(count, Local::now().naive_local())
        .populate(pool)
        .await
        .context("failed to populate test data")?;
    Ok(seeded)
}

pub fn print_export(dir: &Path, summary: &ExportSummary) {
    println!("\nExported to {}:", dir.display());
    println!("  author_ids.csv         {} rows", summary.authors);
    println!("  book_ids.csv           {} rows", summary.books);
    println!("  book_create_data.csv   {} rows", summary.create_rows);
    println!("  delete_author_ids.csv  {} rows", summary.delete_authors);
    println!("  delete_book_ids.csv    {} rows", summary.delete_books);
}

async fn print_table_summary(pool: &PgPool, schema: &str) -> Result<()> {
    let counts = table_summary(pool, schema).await?;
    println!("\nTable summary:");
    for count in &counts {
        println!("  {:<40} {:>8}", count.table, count.rows);
    }
    println!("  {:<40} {:>8}", "TOTAL", counts.iter().map(|c| c.rows).sum::<i64>());
    Ok(())
}

pub async fn seed(target: &Target, count: usize, export: Option<&Path>) -> Result<()> {
    banner("DATABASE POPULATION");
    let (env, pool) = target.pool().await?;
    println!("Server: {}", server_version(&pool).await?);

    let seeded = reseed(&pool, env.schema(), count).await?;
    if count > 0 {
        println!(
            "\n✓ Created {} authors, {} books, {} customers",
            seeded.authors.len(),
            seeded.books.len(),
            seeded.customers.len()
        );
    }
    print_table_summary(&pool, env.schema()).await?;

    if let Some(dir) = export {
        match export_ids(&pool, dir).await {
            Ok(summary) => print_export(dir, &summary),
            Err(err) => warn!("seeded, but exporting ids failed: {err}"),
        }
    }
    Ok(())
}

pub async fn export(target: &Target, out_dir: &Path) -> Result<()> {
    banner("EXPORT IDS");
    let (_, pool) = target.pool().await?;
    let summary = export_ids(&pool, out_dir)
        .await
        .with_context(|| format!("failed to export ids to {}", out_dir.display()))?;
    print_export(out_dir, &summary);
    Ok(())
}

pub async fn list(target: &Target) -> Result<()> {
    let (_, pool) = target.pool().await?;
    let (authors, books) = list_ids(&pool).await?;

    banner(&format!("AUTHORS ({})", authors.len()));
    for author in &authors {
        println!("  {:>6}  {}", author.id, author.name);
    }

    banner(&format!("BOOKS ({})", books.len()));
    for book in &books {
        let author = book.author_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        println!("  {:>6}  author {:>6}  {}", book.id, author, book.title);
    }
    Ok(())
}

pub async fn schema(target: &Target, only: &[String]) -> Result<()> {
    let (env, pool) = target.pool().await?;
    let schema = env.schema();
    println!("Server: {}", server_version(&pool).await?);

    let tables = list_tables(&pool, schema).await?;
    banner(&format!("TABLES IN {schema} ({})", tables.len()));
    for table in &tables {
        println!("  {:<40} {:>3} columns", table.name, table.column_count);
    }

    for table in tables.iter().filter(|t| only.is_empty() || only.contains(&t.name)) {
        let keys = primary_keys(&pool, schema, &table.name).await?;
        banner(&format!("{}.{}", table.schema, table.name));
        for column in columns(&pool, schema, &table.name).await? {
            let length = column.max_length.map(|n| format!("({n})")).unwrap_or_default();
            println!(
                "  {:<30} {:<28} {:<9}{}",
                column.name,
                format!("{}{length}", column.data_type),
                if column.nullable { "NULL" } else { "NOT NULL" },
                if keys.contains(&column.name) { "  PK" } else { "" }
            );
        }
    }

    let fks = foreign_keys(&pool, schema).await?;
    banner("FOREIGN KEYS");
    for fk in &fks {
        println!("  {}.{} -> {}.{}", fk.table, fk.column, fk.referenced_table, fk.referenced_column);
    }

    let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
    banner("DELETION ORDER");
    for (i, table) in deletion_order(&names, &fks).iter().enumerate() {
        println!("  {:>2}. {table}", i + 1);
    }

    print_table_summary(&pool, schema).await
}
