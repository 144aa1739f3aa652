use crate::error::{DbError, DbResult};
use loadbench_core::DbEnvironment;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Connect to the environment's database.
///
/// A non-default schema is put on the `search_path` so unqualified table
/// names resolve the way the application sees them.
pub async fn connect(env: &DbEnvironment) -> DbResult<PgPool> {
    let mut options = PgConnectOptions::new()
        .host(env.host())
        .port(env.port())
        .database(&env.database)
        .username(env.username())
        .password(env.password())
        .application_name("loadbench");

    if env.schema() != "public" {
        options = options.options([("search_path", format!("{},public", env.schema()))]);
    }

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
        .map_err(|source| DbError::Connect {
            target: env.display_target(),
            source,
        })?;

    info!("connected to {}", env.display_target());
    Ok(pool)
}

/// `SELECT version()`, truncated to the first 100 characters.
pub async fn server_version(pool: &PgPool) -> DbResult<String> {
    let version: String = sqlx::query_scalar("SELECT version()")
        .fetch_one(pool)
        .await?;
    Ok(version.chars().take(100).collect())
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."table"`
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Authors"), "\"Authors\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified("public", "Books"), "\"public\".\"Books\"");
    }
}
