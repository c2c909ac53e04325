//! Crosstalk server binary.
//!
//! # Usage
//!
//! ```bash
//! # TCP relay on the default port
//! crosstalk-server --bind 0.0.0.0:8080
//!
//! # UDP relay
//! crosstalk-server --bind 0.0.0.0:8080 --transport udp
//! ```

use std::time::Duration;

use clap::{Parser, ValueEnum};
use crosstalk_server::{Server, ServerConfig, ShutdownSignal, Transport};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crosstalk chat relay server
#[derive(Parser, Debug)]
#[command(name = "crosstalk-server")]
#[command(about = "Multi-client chat relay server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Transport to serve
    #[arg(short, long, value_enum, default_value = "tcp")]
    transport: TransportArg,

    /// Shutdown poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Tcp,
    Udp,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Tcp => Transport::Tcp,
            TransportArg::Udp => Transport::Udp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ServerConfig {
        bind_address: args.bind,
        transport: args.transport.into(),
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        ..ServerConfig::default()
    };

    let shutdown = ShutdownSignal::new();
    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                signal.trigger();
            },
            Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
        }
    });

    server.run(shutdown).await?;

    tracing::info!("Server stopped");

    Ok(())
}
