//! certrail CLI - challenge endpoint, renewal sweep and certificate administration

mod commands;

use clap::{Parser, Subcommand};
use commands::{IssueCommand, MarkBrokenCommand, RenewDueCommand, ResetCommand, ServeCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CERTRAIL_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "CERTRAIL_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve HTTP-01 challenges and renew certificates periodically
    Serve(ServeCommand),
    /// Register a domain if needed, then verify and issue its certificate
    Issue(IssueCommand),
    /// Renew every certificate past its renewal point
    RenewDue(RenewDueCommand),
    /// Mark a certificate as broken
    MarkBroken(MarkBrokenCommand),
    /// Move a certificate back to unverified
    Reset(ResetCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();

    // RUST_LOG wins when set
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) if std::env::var("RUST_LOG").is_ok() => filter,
        _ => tracing_subscriber::EnvFilter::new(format!(
            "certrail={level},\
             certrail_cli={level},\
             certrail_core={level},\
             certrail_certificates={level},\
             certrail_kv={level},\
             certrail_database={level},\
             certrail_migrations={level},\
             sqlx=warn,\
             sea_orm=warn,\
             h2=warn,\
             tower=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = log_level
        )),
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve(cmd) => cmd.execute(),
        Commands::Issue(cmd) => cmd.execute(),
        Commands::RenewDue(cmd) => cmd.execute(),
        Commands::MarkBroken(cmd) => cmd.execute(),
        Commands::Reset(cmd) => cmd.execute(),
    }
}
