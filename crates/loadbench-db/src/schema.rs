//! Read-only schema introspection through `information_schema`.

use crate::error::DbResult;
use crate::pool::qualified;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeMap, BTreeSet};

/// Migration bookkeeping tables that are never purged or reported.
pub const IGNORED_TABLES: &[&str] = &["__EFMigrationsHistory", "__MigrationHistory", "_sqlx_migrations"];

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub column_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub max_length: Option<i32>,
}

/// One column-level foreign key: `table.column -> referenced_table.referenced_column`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

pub async fn list_tables(pool: &PgPool, schema: &str) -> DbResult<Vec<TableInfo>> {
    let tables: Vec<TableInfo> = sqlx::query_as(
        r#"
        SELECT t.table_schema::text AS schema,
               t.table_name::text AS name,
               (SELECT COUNT(*)
                  FROM information_schema.columns c
                 WHERE c.table_schema = t.table_schema
                   AND c.table_name = t.table_name) AS column_count
          FROM information_schema.tables t
         WHERE t.table_type = 'BASE TABLE'
           AND t.table_schema = $1
         ORDER BY t.table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(tables
        .into_iter()
        .filter(|t| !IGNORED_TABLES.contains(&t.name.as_str()))
        .collect())
}

pub async fn columns(pool: &PgPool, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
    let columns = sqlx::query_as(
        r#"
        SELECT column_name::text AS name,
               data_type::text AS data_type,
               (is_nullable = 'YES') AS nullable,
               character_maximum_length::int4 AS max_length
          FROM information_schema.columns
         WHERE table_schema = $1 AND table_name = $2
         ORDER BY ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(columns)
}

pub async fn primary_keys(pool: &PgPool, schema: &str, table: &str) -> DbResult<Vec<String>> {
    let keys = sqlx::query_scalar(
        r#"
        SELECT kcu.column_name::text
          FROM information_schema.table_constraints tc
          JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
           AND tc.table_schema = kcu.table_schema
         WHERE tc.constraint_type = 'PRIMARY KEY'
           AND tc.table_schema = $1
           AND tc.table_name = $2
         ORDER BY kcu.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(keys)
}

/// Every foreign key in `schema`.
pub async fn foreign_keys(pool: &PgPool, schema: &str) -> DbResult<Vec<ForeignKey>> {
    let keys = sqlx::query_as(
        r#"
        SELECT tc.table_name::text AS "table",
               kcu.column_name::text AS "column",
               ccu.table_name::text AS referenced_table,
               ccu.column_name::text AS referenced_column
          FROM information_schema.table_constraints tc
          JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
           AND tc.table_schema = kcu.table_schema
          JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
           AND ccu.table_schema = tc.table_schema
         WHERE tc.constraint_type = 'FOREIGN KEY'
           AND tc.table_schema = $1
         ORDER BY tc.table_name, kcu.column_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;
    Ok(keys)
}

pub async fn row_count(pool: &PgPool, schema: &str, table: &str) -> DbResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", qualified(schema, table));
    let count = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// Order `tables` so that every table comes before the tables it references.
///
/// Tables that reference each other in a cycle are kept together and emitted
/// as a group, tables with outgoing foreign keys first, then by name. Groups
/// are ordered like single tables, so anything a cycle references still
/// comes after the whole cycle.
pub fn deletion_order(tables: &[String], fks: &[ForeignKey]) -> Vec<String> {
    let known: BTreeSet<&str> = tables.iter().map(String::as_str).collect();
    let edges: BTreeSet<(&str, &str)> = fks
        .iter()
        .filter(|fk| fk.table != fk.referenced_table)
        .filter(|fk| known.contains(fk.table.as_str()) && known.contains(fk.referenced_table.as_str()))
        .map(|fk| (fk.table.as_str(), fk.referenced_table.as_str()))
        .collect();

    let reach: BTreeMap<&str, BTreeSet<&str>> =
        known.iter().map(|t| (*t, reachable(t, &edges))).collect();
    let reaches = |from: &str, to: &str| reach.get(from).is_some_and(|r| r.contains(to));

    // strongly connected components, keyed by their first member by name
    let mut component_of: BTreeMap<&str, &str> = BTreeMap::new();
    let mut members: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for &table in &known {
        let key = known
            .iter()
            .copied()
            .find(|other| *other == table || (reaches(table, other) && reaches(other, table)))
            .unwrap_or(table);
        component_of.insert(table, key);
        members.entry(key).or_default().push(table);
    }
    let component_edges: BTreeSet<(&str, &str)> = edges
        .iter()
        .map(|&(child, parent)| {
            (
                component_of.get(child).copied().unwrap_or(child),
                component_of.get(parent).copied().unwrap_or(parent),
            )
        })
        .filter(|(child, parent)| child != parent)
        .collect();

    // referenced component -> number of components still pointing at it
    let mut pending_children: BTreeMap<&str, usize> = members.keys().map(|k| (*k, 0)).collect();
    for (_, parent) in &component_edges {
        if let Some(n) = pending_children.get_mut(parent) {
            *n += 1;
        }
    }

    let mut ready: BTreeSet<&str> = pending_children
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut order = Vec::with_capacity(known.len());

    while let Some(key) = ready.pop_first() {
        let mut group = members.remove(key).unwrap_or_default();
        group.sort_by_key(|t| (!edges.iter().any(|(child, _)| child == t), *t));
        order.extend(group.into_iter().map(str::to_string));

        for (_, parent) in component_edges.iter().filter(|(child, _)| *child == key) {
            if let Some(n) = pending_children.get_mut(parent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert(*parent);
                }
            }
        }
    }
    order
}

/// Every table reachable from `start` by following references.
fn reachable<'a>(start: &'a str, edges: &BTreeSet<(&'a str, &'a str)>) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(table) = stack.pop() {
        for (_, parent) in edges.iter().filter(|(child, _)| *child == table) {
            if seen.insert(*parent) {
                stack.push(*parent);
            }
        }
    }
    seen
}
