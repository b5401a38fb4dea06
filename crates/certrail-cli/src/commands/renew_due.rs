use clap::Args;
use tracing::info;

use super::context::{build_context, ConnectionArgs};

#[derive(Args)]
pub struct RenewDueCommand {
    /// Print the renewal report as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl RenewDueCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let context = build_context(self.connection.settings()).await?;
            let report = context.service.renew_due().await?;

            if self.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for failure in &report.failed {
                    info!("{}: {}", failure.domain, failure.error);
                }
            }

            if report.failed.is_empty() {
                Ok(())
            } else {
                anyhow::bail!("{} certificate(s) failed to renew", report.failed.len())
            }
        })
    }
}
