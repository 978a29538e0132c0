//! edge-failover binary entry point.

use clap::Parser;
use edge_failover::{telemetry, Config, FailoverService};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keeps DNS in sync with the public IP and fails over to the cloud when the ISP link drops.
#[derive(Parser, Debug)]
#[command(name = "edge-failover")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML or YAML).
    #[arg(short, long, env = "EDGE_FAILOVER_CONFIG", default_value = "edge-failover.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("EDGE_FAILOVER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        region = %config.aws.region,
        "Starting edge-failover"
    );

    let service = FailoverService::new(config).inspect_err(|e| {
        error!("Could not start edge-failover: {}", e);
    })?;

    // Setup graceful shutdown
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let result = service.run(cancel).await;

    if let Err(e) = result {
        error!("edge-failover error: {}", e);
        return Err(e.into());
    }

    info!("edge-failover shutdown complete");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}
