//! Payment Alerts relay server
//!
//! Receives Stripe payment-failure webhooks and fans them out to Airtable
//! and email.

use std::net::IpAddr;
use std::sync::Arc;

use clap::Parser;
use payment_alerts::config::DEFAULT_PORT;
use payment_alerts::{server, AppConfig};
use tracing_subscriber::EnvFilter;

/// Payment Alerts relay server
#[derive(Parser, Debug)]
#[command(name = "payment-alerts")]
#[command(version)]
#[command(about = "Relays Stripe payment failures to Airtable and email")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_filter = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        "Payment Alerts {} starting on {}:{}",
        payment_alerts::VERSION,
        args.host,
        args.port
    );

    let mut config = AppConfig::from_env()?;
    config.server.host = args.host;
    config.server.port = args.port;
    config.log_summary();

    let state = Arc::new(server::AppState::from_config(config)?);
    server::serve(state).await?;

    Ok(())
}
