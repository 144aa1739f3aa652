//! Round trips against a live Postgres holding the book-store schema.
//!
//! Connection parameters come from `LOADBENCH_TEST_DB_*` variables; run with
//! `cargo test -p loadbench-db -- --ignored`.

use chrono::Local;
use loadbench_core::DbEnvironment;
use loadbench_db::{connect, export_ids, list_ids, purge_all, table_summary, Populator};
use sqlx::PgPool;
use tempfile::TempDir;

fn test_env() -> DbEnvironment {
    let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
    DbEnvironment {
        host: Some(var("LOADBENCH_TEST_DB_HOST", "localhost")),
        server: None,
        port: var("LOADBENCH_TEST_DB_PORT", "5432").parse().ok(),
        database: var("LOADBENCH_TEST_DB_NAME", "bookstore"),
        username: Some(var("LOADBENCH_TEST_DB_USER", "postgres")),
        password: Some(var("LOADBENCH_TEST_DB_PASSWORD", "postgres")),
        schema: None,
    }
}

async fn bookstore_pool() -> PgPool {
    let pool = connect(&test_env()).await.unwrap();
    for ddl in [
        r#"CREATE TABLE IF NOT EXISTS "Authors" ("Id" SERIAL PRIMARY KEY, "Name" TEXT NOT NULL)"#,
        r#"CREATE TABLE IF NOT EXISTS "Books" (
            "Id" SERIAL PRIMARY KEY, "Title" TEXT NOT NULL, "Year" INT NOT NULL,
            "Price" NUMERIC(10, 2) NOT NULL, "Genre" TEXT,
            "AuthorId" INT NOT NULL REFERENCES "Authors" ("Id"))"#,
        r#"CREATE TABLE IF NOT EXISTS "Customers" (
            "Id" SERIAL PRIMARY KEY, "FirstName" TEXT NOT NULL, "LastName" TEXT NOT NULL,
            "Email" TEXT, "Country" TEXT)"#,
    ] {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }
    pool
}

#[tokio::test]
#[ignore] // Requires PostgreSQL to be running
async fn test_purge_seed_export_cycle() {
    let pool = bookstore_pool().await;

    purge_all(&pool, "public").await.unwrap();
    let seeded = Populator::new(6, Local::now().naive_local())
        .populate(&pool)
        .await
        .unwrap();
    assert_eq!(seeded.authors.len(), 6);
    assert_eq!(seeded.books.len(), 12);
    assert_eq!(seeded.customers.len(), 6);

    let counts = table_summary(&pool, "public").await.unwrap();
    let rows = |t: &str| counts.iter().find(|c| c.table == format!("public.{t}")).map(|c| c.rows);
    assert_eq!(rows("Books"), Some(12));

    let dir = TempDir::new().unwrap();
    let summary = export_ids(&pool, dir.path()).await.unwrap();
    assert_eq!(summary.authors, 6);
    assert_eq!(summary.delete_authors, 5);
    assert_eq!(summary.delete_books, 10);
    assert!(dir.path().join("book_create_data.csv").exists());

    let (authors, books) = list_ids(&pool).await.unwrap();
    assert_eq!(authors.len(), 6);
    assert!(books.iter().all(|b| seeded.authors.contains(&b.author_id.unwrap())));

    let report = purge_all(&pool, "public").await.unwrap();
    assert_eq!(report.total_deleted(), 24);
    let books_pos = report.deleted.iter().position(|(t, _)| t == "Books").unwrap();
    let authors_pos = report.deleted.iter().position(|(t, _)| t == "Authors").unwrap();
    assert!(books_pos < authors_pos);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL to be running
async fn test_populate_zero_is_noop() {
    let pool = bookstore_pool().await;
    let seeded = Populator::new(0, Local::now().naive_local())
        .populate(&pool)
        .await
        .unwrap();
    assert!(seeded.authors.is_empty());
}
