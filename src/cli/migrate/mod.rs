//! Migrate command - applies, inspects or reverts the storage schema

use clap::Args;
use tracing::info;

use crate::infrastructure::storage::{
    connect_pool, revert_last_storage_migration, run_storage_migrations, PostgresMigrator,
};

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Print applied versions without changing anything
    #[arg(long, conflicts_with = "revert_last")]
    pub status: bool,

    /// Revert the most recently applied migration
    #[arg(long)]
    pub revert_last: bool,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    super::init_cli_logging(&config);

    let pool = connect_pool(&config.storage.postgres()).await?;

    if args.status {
        let applied = PostgresMigrator::new(pool).applied_versions().await?;
        if applied.is_empty() {
            println!("No migrations applied");
        }
        for version in applied {
            println!("{}", version);
        }
        return Ok(());
    }

    if args.revert_last {
        match revert_last_storage_migration(&pool).await? {
            Some(version) => info!(version, "Reverted migration"),
            None => info!("Nothing to revert"),
        }
        return Ok(());
    }

    let version = run_storage_migrations(&pool).await?;
    info!(version = ?version, "Storage schema up to date");

    Ok(())
}
