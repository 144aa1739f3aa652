use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use loadbench_core::Settings;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::run::RunOptions;
use commands::Target;

#[derive(Parser, Debug)]
#[command(name = "loadbench")]
#[command(about = "Performance-test orchestration for the book-store and pet-clinic APIs", long_about = None)]
#[command(version)]
struct Cli {
    /// Environment name inside the config files
    #[arg(long = "env", global = true, env = "LOADBENCH_ENV", default_value = "target")]
    env: String,

    /// Database environments file
    #[arg(long, global = true, env = "LOADBENCH_DB_CONFIG", default_value = "../db_config.json")]
    db_config: PathBuf,

    /// API environments file
    #[arg(long, global = true, env = "LOADBENCH_API_CONFIG", default_value = "../api_config.json")]
    api_config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Purge every book-store table and insert fresh authors, books and customers
    Seed {
        /// Authors and customers to create (books get twice as many); 0 only purges
        #[arg(long, default_value = "10")]
        count: usize,

        /// Also export the seeded ids as JMeter CSV files into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Write the book-store id CSV files used by the JMeter plans
    ExportIds {
        #[arg(long, default_value = "performance_tests")]
        out_dir: PathBuf,
    },

    /// Print author and book ids currently in the database
    ListIds,

    /// Describe tables, keys and row counts of the configured schema
    Schema {
        /// Only show columns for these tables
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },

    /// Regenerate the pet-clinic CSV data files from the database and verify them
    RefreshCsv {
        #[arg(long, default_value = "performance_tests")]
        out_dir: PathBuf,
    },

    /// Check pet-clinic data health and foreign-key consistency
    Validate {
        /// Remove rows left behind by earlier delete scenarios first
        #[arg(long)]
        cleanup: bool,
    },

    /// Exercise the REST endpoints directly
    Endpoints {
        #[arg(long, value_enum, default_value = "smoke")]
        mode: EndpointMode,

        /// Write the results as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run one JMeter plan, optionally sampling performance counters
    Run {
        /// JMeter plan (.jmx)
        plan: PathBuf,

        /// Sample OS performance counters while JMeter runs
        #[arg(long)]
        profile: bool,

        /// Pass the database environment to the plan instead of the API one
        #[arg(long)]
        db_plan: bool,

        /// Reset the book-store through its REST API before the run
        #[arg(long)]
        reset_via_api: bool,

        /// Purge and seed the database with this many records before the run
        #[arg(long)]
        seed: Option<usize>,

        /// Treat unmet success criteria as a failed run
        #[arg(long)]
        strict: bool,
    },

    /// Seed once, then run every JMeter plan in a directory
    RunAll {
        #[arg(long, default_value = "performance_tests")]
        plans_dir: PathBuf,

        /// Records to seed before the runs
        #[arg(long, default_value = "10")]
        count: usize,

        #[arg(long)]
        strict: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EndpointMode {
    /// Four GET probes
    Smoke,
    /// Create, read, update and delete authors and books
    Crud,
    /// Find which resource routes and auxiliary endpoints respond
    Discover,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let target = Target {
        env: cli.env,
        db_config: cli.db_config,
        api_config: cli.api_config,
    };

    match cli.command {
        Commands::Seed { count, export } => commands::db::seed(&target, count, export.as_deref()).await,
        Commands::ExportIds { out_dir } => commands::db::export(&target, &out_dir).await,
        Commands::ListIds => commands::db::list(&target).await,
        Commands::Schema { tables } => commands::db::schema(&target, &tables).await,
        Commands::RefreshCsv { out_dir } => commands::petclinic::refresh_csv(&target, &out_dir).await,
        Commands::Validate { cleanup } => commands::petclinic::validate(&target, cleanup).await,
        Commands::Endpoints { mode, output } => match mode {
            EndpointMode::Smoke => commands::endpoints::smoke(&target, output.as_deref()).await,
            EndpointMode::Crud => commands::endpoints::crud(&target, output.as_deref()).await,
            EndpointMode::Discover => commands::endpoints::discover(&target, output.as_deref()).await,
        },
        Commands::Run {
            plan,
            profile,
            db_plan,
            reset_via_api,
            seed,
            strict,
        } => {
            let settings = load_settings()?;
            let options = RunOptions {
                profile,
                db_plan,
                reset_via_api,
                seed,
                strict,
            };
            commands::run::run(&target, &settings, &plan, &options).await
        }
        Commands::RunAll {
            plans_dir,
            count,
            strict,
        } => {
            let settings = load_settings()?;
            commands::run::run_all(&target, &settings, &plans_dir, count, strict).await
        }
    }
}

fn load_settings() -> Result<Settings> {
    Settings::load().context("failed to load loadbench settings")
}

/// Initialize logging
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["loadbench", "seed"]).unwrap();
        assert_eq!(cli.env, "target");
        assert_eq!(cli.db_config, PathBuf::from("../db_config.json"));
        assert!(matches!(cli.command, Commands::Seed { count: 10, export: None }));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "loadbench",
            "run",
            "Authors.jmx",
            "--profile",
            "--reset-via-api",
            "--env",
            "local",
        ])
        .unwrap();
        assert_eq!(cli.env, "local");
        match cli.command {
            Commands::Run {
                plan,
                profile,
                db_plan,
                reset_via_api,
                seed,
                ..
            } => {
                assert_eq!(plan, PathBuf::from("Authors.jmx"));
                assert!(profile && reset_via_api && !db_plan);
                assert_eq!(seed, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_modes() {
        let cli = Cli::try_parse_from(["loadbench", "endpoints", "--mode", "discover", "--output", "apis.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Endpoints {
                mode: EndpointMode::Discover,
                output: Some(_)
            }
        ));
        assert!(Cli::try_parse_from(["loadbench", "endpoints", "--mode", "load"]).is_err());
    }
}
