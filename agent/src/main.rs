//! tablesync - keeps a local SQLite database in sync with a remote table store.

use clap::Parser;
use tablesync_agent::{Config, Reconciler, RemoteClient, Runner, SqliteStore, SyncOptions};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line flags. Everything else comes from the environment.
#[derive(Debug, Parser)]
#[command(name = "tablesync", version, about)]
struct Args {
    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Print the pass report as JSON (single pass only)
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablesync_agent=info,tablesync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    config.once |= args.once;

    tracing::info!(
        "Syncing {} with {} ({})",
        config.db_path.display(),
        config.remote_url,
        config.policy
    );

    let local = SqliteStore::open(&config.db_path).await?;
    let remote = RemoteClient::new(config.remote_url.clone(), config.request_timeout)?;
    let reconciler = Reconciler::new(local, remote, SyncOptions::from(&config));
    let runner = Runner::new(reconciler, config.interval);

    if config.once {
        let report = runner.run_once().await?;
        println!("{}", report);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Ok(());
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping after the current pass");
                let _ = tx.send(true);
            }
            Err(e) => {
                tracing::warn!("Cannot listen for interrupts: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    runner.run_continuous(rx).await;
    Ok(())
}
