//! Command line entry points
//!
//! - `serve`: HTTP server exposing `POST /deploy`
//! - `deploy`: one deployment for a single tenant, printed as JSON
//! - `migrate`: apply or inspect the PostgreSQL schema

pub mod deploy;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Pipeline Provisioner - per-tenant workflow deployment for the automation engine
#[derive(Parser)]
#[command(name = "pipeline-provisioner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,

    /// Deploy one tenant's pipeline and exit
    Deploy(deploy::DeployArgs),

    /// Manage the storage schema
    Migrate(migrate::MigrateArgs),
}

/// Loads `.env`, then the layered configuration
pub(crate) fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();
    Ok(AppConfig::load()?)
}

/// Plain log output for one-shot commands
pub(crate) fn init_cli_logging(config: &AppConfig) {
    logging::init_logging(&config.logging);
}
