//! Deploy command - runs one deployment outside the HTTP server

use clap::Args;

use crate::api::deploy::DeployResponse;
use crate::domain::tenant::EmailProvider;
use crate::infrastructure::services::DeploymentRequest;

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Tenant whose pipeline is deployed
    #[arg(long)]
    pub tenant_id: String,

    /// Overrides the tenant's mailbox provider (`gmail` or `outlook`)
    #[arg(long)]
    pub provider: Option<String>,
}

pub async fn run(args: DeployArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    super::init_cli_logging(&config);

    let mut request = DeploymentRequest::new(args.tenant_id);
    if let Some(provider) = args.provider.as_deref() {
        request = request.with_email_provider(EmailProvider::parse(provider)?);
    }

    let state = crate::create_app_state(&config).await?;
    let result = state.deployments.deploy(request).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&DeployResponse::from(result))?
    );

    Ok(())
}
