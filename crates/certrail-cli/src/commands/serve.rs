use certrail_certificates::{configure_routes, create_challenge_app_state, RenewalScheduler};
use clap::Args;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::context::{build_context, ConnectionArgs};

#[derive(Args)]
pub struct ServeCommand {
    /// Address for the HTTP-01 challenge endpoint
    #[arg(long, env = "CERTRAIL_LISTEN_ADDRESS")]
    pub address: Option<String>,

    /// Seconds between renewal sweeps
    #[arg(long, env = "CERTRAIL_RENEWAL_INTERVAL")]
    pub renewal_interval: Option<u64>,

    /// Serve challenges only, without renewing
    #[arg(long)]
    pub no_renewal: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let mut settings = self.connection.settings();
        if let Some(address) = &self.address {
            settings.server.listen_address = address.clone();
        }
        if let Some(secs) = self.renewal_interval {
            settings.server.renewal_interval_secs = secs;
        }

        let context = build_context(settings).await?;
        let shutdown = CancellationToken::new();

        let scheduler = if self.no_renewal {
            None
        } else {
            let scheduler = RenewalScheduler::new(context.service.clone()).with_interval(
                Duration::from_secs(context.settings.server.renewal_interval_secs),
            );
            Some(tokio::spawn(scheduler.run(shutdown.clone())))
        };

        let app = configure_routes().with_state(create_challenge_app_state(context.challenge_store));
        let listener = tokio::net::TcpListener::bind(&context.settings.server.listen_address).await?;
        info!(
            "Serving ACME challenges on {}",
            context.settings.server.listen_address
        );

        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down");
                signal.cancel();
            })
            .await?;

        shutdown.cancel();
        if let Some(handle) = scheduler {
            handle.await?;
        }
        Ok(())
    }
}
