use anyhow::{Context, Result};
use loadbench_core::{load_environment, ApiConfigFile, ApiEnvironment, DbEnvironment, EndpointConfig};
use loadbench_db::{connect, PgPool};
use loadbench_http::ApiClient;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

pub mod db;
pub mod endpoints;
pub mod petclinic;
pub mod run;

/// Which environment to use and where its config files live.
#[derive(Debug, Clone)]
pub struct Target {
    pub env: String,
    pub db_config: PathBuf,
    pub api_config: PathBuf,
}

impl Target {
    pub fn db_env(&self) -> Result<DbEnvironment> {
        load_environment(&self.db_config, &self.env)
            .with_context(|| format!("failed to load database environment from {}", self.db_config.display()))
    }

    pub fn api_env(&self) -> Result<(ApiEnvironment, BTreeMap<String, EndpointConfig>)> {
        ApiConfigFile::from_file(&self.api_config)
            .and_then(|file| file.select(&self.env))
            .with_context(|| format!("failed to load API environment from {}", self.api_config.display()))
    }

    /// Connect to the selected database environment.
    pub async fn pool(&self) -> Result<(DbEnvironment, PgPool)> {
        let env = self.db_env()?;
        println!("Environment: {}", self.env);
        println!("Target: {}", env.display_target());
        let pool = connect(&env).await.context("database connection failed")?;
        info!("connected to {}", env.display_target());
        Ok((env, pool))
    }

    pub fn client(&self) -> Result<(ApiClient, BTreeMap<String, EndpointConfig>)> {
        let (env, endpoints) = self.api_env()?;
        println!("Environment: {} ({})", self.env, env.description());
        println!("Base URL: {}", env.base_url);
        let client = ApiClient::new(env).context("failed to build HTTP client")?;
        Ok((client, endpoints))
    }
}

pub fn banner(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
}
