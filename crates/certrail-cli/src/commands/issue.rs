use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::context::{build_context, ConnectionArgs};

#[derive(Args)]
pub struct IssueCommand {
    /// Primary domain (certificate subject)
    #[arg(long)]
    pub domain: String,

    /// Additional DNS names, repeatable
    #[arg(long = "alt")]
    pub alternative_names: Vec<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl IssueCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let context = build_context(self.connection.settings()).await?;
        let service = context.service;

        match service.find(&self.domain).await? {
            Some(existing) => {
                if existing.alternative_names != self.alternative_names {
                    warn!(
                        "{} is already registered with names {:?}; keeping them",
                        existing.domain, existing.alternative_names
                    );
                }
            }
            None => {
                service
                    .create(&self.domain, self.alternative_names.clone())
                    .await?;
            }
        }

        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, abandoning verification");
                ctrl_c.cancel();
            }
        });

        if service.get_with_cancellation(&self.domain, &cancel).await? {
            info!("Certificate for {} issued", self.domain);
            Ok(())
        } else {
            error!("Certificate for {} was not issued", self.domain);
            anyhow::bail!("certificate for {} was not issued", self.domain)
        }
    }
}
