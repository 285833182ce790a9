//! ospfip-dns binary entry point.

use clap::Parser;
use ospfip_dns::{telemetry, Config, DnsServer, OpenStackClient};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Authoritative DNS server for tagged OpenStack floating IPs.
#[derive(Parser, Debug)]
#[command(name = "ospfip-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "ospfip-dns.toml")]
    config: PathBuf,
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("OSPFIP_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    config.validate()?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        auth_url = %config.openstack.auth_url,
        "Starting ospfip-dns"
    );

    let inventory = Arc::new(OpenStackClient::new(config.openstack)?);

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    let server = DnsServer::new(config.dns, inventory);
    let result = server.run(token).await;

    telemetry::shutdown();

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("ospfip-dns shutdown complete");
    Ok(())
}
