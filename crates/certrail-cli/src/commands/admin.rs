use clap::Args;
use tracing::info;

use super::context::{build_context, ConnectionArgs};

#[derive(Args)]
pub struct MarkBrokenCommand {
    /// Primary domain of the certificate
    pub domain: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl MarkBrokenCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let context = build_context(self.connection.settings()).await?;
            let certificate = context.service.mark_broken(&self.domain).await?;
            info!("{} is now {}", certificate.domain, certificate.status());
            Ok(())
        })
    }
}

#[derive(Args)]
pub struct ResetCommand {
    /// Primary domain of the certificate
    pub domain: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl ResetCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let context = build_context(self.connection.settings()).await?;
            let certificate = context.service.reset(&self.domain).await?;
            info!("{} is now {}", certificate.domain, certificate.status());
            Ok(())
        })
    }
}
