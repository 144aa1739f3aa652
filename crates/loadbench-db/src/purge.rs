use crate::error::DbResult;
use crate::pool::qualified;
use crate::schema::{deletion_order, foreign_keys, list_tables};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Tables that had rows, with the number deleted, in deletion order.
    pub deleted: Vec<(String, u64)>,
    pub skipped: Vec<String>,
}

impl PurgeReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}

/// Delete every row of every user table in `schema`, children first, in one transaction.
pub async fn purge_all(pool: &PgPool, schema: &str) -> DbResult<PurgeReport> {
    let tables: Vec<String> = list_tables(pool, schema)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let fks = foreign_keys(pool, schema).await?;
    let order = deletion_order(&tables, &fks);
    info!("purging {} tables in {schema}", order.len());

    let mut report = PurgeReport::default();
    let mut tx = pool.begin().await?;
    for table in order {
        let name = qualified(schema, &table);
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
            .fetch_one(&mut *tx)
            .await?;
        if count == 0 {
            info!("  skipped {table} (already empty)");
            report.skipped.push(table);
            continue;
        }

        match sqlx::query(&format!("DELETE FROM {name}")).execute(&mut *tx).await {
            Ok(result) => {
                info!("  deleted {:>5} rows from {table}", result.rows_affected());
                report.deleted.push((table, result.rows_affected()));
            }
            Err(err) => {
                warn!("  could not delete from {table}: {err}");
                tx.rollback().await?;
                return Err(err.into());
            }
        }
    }
    tx.commit().await?;

    info!("deleted {} rows in total", report.total_deleted());
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Row count of every user table in `schema`, by name.
pub async fn table_summary(pool: &PgPool, schema: &str) -> DbResult<Vec<TableCount>> {
    let mut counts = Vec::new();
    for table in list_tables(pool, schema).await? {
        let rows = crate::schema::row_count(pool, schema, &table.name).await?;
        counts.push(TableCount {
            table: format!("{}.{}", table.schema, table.name),
            rows,
        });
    }
    Ok(counts)
}
