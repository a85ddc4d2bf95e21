use clap::Parser;
use pipeline_provisioner::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Deploy(args) => cli::deploy::run(args).await,
        Command::Migrate(args) => cli::migrate::run(args).await,
    }
}
